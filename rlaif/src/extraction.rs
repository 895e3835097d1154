//! Extraction engine: turns raw submitted text into profile evidence.
//!
//! Two entry points share one algorithm: `process_next` consumes the oldest
//! unprocessed stored entry (batch mode), `converse` handles an interactive
//! turn. Both build a bounded context from the current profile and notepad,
//! make one reasoning call, and persist what came back.
//!
//! Failure semantics differ by mode. Batch mode propagates reasoning and
//! store errors so the entry stays unprocessed and is retried next cycle.
//! Conversational mode degrades instead: a human is waiting, so transport
//! failures produce a canned reply and the turn is never left pending.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use constitution::SectionDelta;
use persona_agent::{QualityTier, ReasoningService, Structured};

use crate::config::ExtractionConfig;
use crate::manager::ConstitutionManager;
use crate::notepad::Notepad;
use crate::prompts;
use crate::store::PersonaStore;
use crate::types::{
    Entry, Note, NoteCategory, NoteKind, NotePriority, PairSource, ProcessingOutcome, Result,
    TrainingPair,
};

/// A note as emitted by the reasoning model.
///
/// Enum-valued fields come back as raw strings so off-schema values degrade
/// to defaults instead of failing the parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteSpec {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub critical: bool,
}

impl NoteSpec {
    /// Convert to a stored note; blank content yields nothing.
    pub(crate) fn into_note(self, owner_id: &str) -> Option<Note> {
        let content = self.content.trim();
        if content.is_empty() {
            return None;
        }

        let kind = match self.kind.as_str() {
            "gap" => NoteKind::Gap,
            "mental_model" => NoteKind::MentalModel,
            "question" => NoteKind::Question,
            _ => NoteKind::Observation,
        };
        let priority = match self.priority.as_str() {
            "high" => NotePriority::High,
            "low" => NotePriority::Low,
            _ => NotePriority::Medium,
        };
        let category = if self.critical {
            NoteCategory::Critical
        } else {
            NoteCategory::NonCritical
        };

        let mut note = Note::new(owner_id, kind, content)
            .with_priority(priority)
            .with_category(category);
        if let Some(topic) = self.topic {
            note = note.with_topic(topic);
        }
        Some(note)
    }
}

fn default_pair_quality() -> f32 {
    0.7
}

/// A (user, assistant) example as emitted by the reasoning model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSpec {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub assistant: String,
    #[serde(default = "default_pair_quality")]
    pub quality: f32,
}

impl Default for PairSpec {
    fn default() -> Self {
        Self {
            user: String::new(),
            assistant: String::new(),
            quality: default_pair_quality(),
        }
    }
}

/// Structured result of one extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    #[serde(default)]
    pub deltas: Vec<SectionDelta>,
    #[serde(default)]
    pub training_pairs: Vec<PairSpec>,
    #[serde(default)]
    pub notes: Vec<NoteSpec>,
    #[serde(default)]
    pub scratchpad: String,
    #[serde(default)]
    pub ready_for_training: Option<bool>,
}

/// Structured result of one conversational turn: a reply plus the same
/// extraction payload as batch mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverseOutput {
    #[serde(default)]
    pub reply: String,
    #[serde(flatten)]
    pub extraction: ExtractionOutput,
}

/// What a conversational turn hands back to the caller.
#[derive(Debug, Clone)]
pub struct ConverseReply {
    pub reply: String,
    pub new_version: Option<u32>,
    pub notes: usize,
}

/// The extraction engine.
#[derive(Clone)]
pub struct ExtractionEngine {
    store: Arc<dyn PersonaStore>,
    service: Arc<ReasoningService>,
    manager: ConstitutionManager,
    notepad: Notepad,
    config: ExtractionConfig,
}

impl ExtractionEngine {
    pub fn new(
        store: Arc<dyn PersonaStore>,
        service: Arc<ReasoningService>,
        manager: ConstitutionManager,
        notepad: Notepad,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            store,
            service,
            manager,
            notepad,
            config,
        }
    }

    /// Store a submitted entry for later processing.
    pub async fn enqueue(
        &self,
        owner_id: &str,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<String> {
        let entry = Entry::new(owner_id, content, source);
        let entry_id = entry.id.clone();
        self.store.insert_entry(entry).await?;
        info!(owner_id, entry_id, "Entry enqueued");
        Ok(entry_id)
    }

    /// Process the oldest unprocessed entry for an owner, if any.
    ///
    /// The entry is marked processed only after every write for it
    /// succeeded; any failure before that leaves it unprocessed for the
    /// next cycle to retry.
    pub async fn process_next(&self, owner_id: &str) -> Result<ProcessingOutcome> {
        let Some(entry) = self.store.oldest_unprocessed_entry(owner_id).await? else {
            return Ok(ProcessingOutcome::NoWork);
        };

        let summary = self
            .manager
            .summary(owner_id, self.config.summary_items_per_field)
            .await?;
        let notepad_summary = self.notepad.summary(owner_id, self.config.context_notes).await?;
        let view = self.notepad.get(owner_id).await?;

        let user_prompt = prompts::extraction_user(
            excerpt(&entry.content, self.config.entry_excerpt_chars),
            summary.as_deref(),
            &notepad_summary,
            &view.scratchpad,
        );
        let structured = self
            .service
            .generate::<ExtractionOutput>(
                QualityTier::Quality,
                &prompts::extraction_system(),
                &user_prompt,
            )
            .await?;

        let fallback = structured.is_fallback();
        let mut output = structured.into_inner();
        if fallback {
            // Total parse failure: leave one follow-up note so the entry's
            // content is not silently lost to the pipeline
            warn!(owner_id, entry_id = entry.id, "Extraction output unusable, recording follow-up note");
            output.notes.push(NoteSpec {
                kind: "question".to_string(),
                content: format!(
                    "Revisit an entry that could not be analyzed: {}",
                    excerpt(&entry.content, 200)
                ),
                ..Default::default()
            });
        }
        let persisted = self.persist(owner_id, summary.as_deref(), output).await?;
        self.store.mark_entry_processed(&entry.id).await?;

        info!(
            owner_id,
            entry_id = entry.id,
            new_version = persisted.new_version,
            training_pairs = persisted.pairs,
            notes = persisted.notes,
            "Entry processed"
        );
        Ok(ProcessingOutcome::Processed {
            entry_id: entry.id,
            new_version: persisted.new_version,
            training_pairs: persisted.pairs,
            notes: persisted.notes,
        })
    }

    /// Handle one interactive turn: store the message as an entry, extract
    /// from it, and return a reply.
    pub async fn converse(&self, owner_id: &str, message: &str) -> Result<ConverseReply> {
        let entry = Entry::new(owner_id, message, "chat");
        let entry_id = entry.id.clone();
        self.store.insert_entry(entry).await?;

        let summary = self
            .manager
            .summary(owner_id, self.config.summary_items_per_field)
            .await
            .unwrap_or(None);
        let notepad_summary = self
            .notepad
            .summary(owner_id, self.config.context_notes)
            .await
            .unwrap_or_default();
        let recent: Vec<String> = self
            .store
            .recent_entries(owner_id, self.config.context_entries)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.id != entry_id)
            .map(|e| excerpt(&e.content, 400).to_string())
            .collect();

        let user_prompt = prompts::converse_user(
            excerpt(message, self.config.entry_excerpt_chars),
            &recent,
            summary.as_deref(),
            &notepad_summary,
        );

        let output = match self
            .service
            .generate::<ConverseOutput>(QualityTier::Quality, &prompts::converse_system(), &user_prompt)
            .await
        {
            Ok(Structured::Fallback(_)) => {
                // Total parse failure: canned reply plus one follow-up note
                warn!(owner_id, "Conversational extraction unparseable, using canned reply");
                self.degraded_turn(owner_id, message)
            }
            Ok(structured) => structured.into_inner(),
            Err(e) => {
                warn!(owner_id, error = %e, "Reasoning call failed, degrading conversational turn");
                self.degraded_turn(owner_id, message)
            }
        };

        let mut reply = output.reply;
        if reply.trim().is_empty() {
            reply = canned_reply(message);
        }

        let persisted = match self.persist(owner_id, summary.as_deref(), output.extraction).await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(owner_id, error = %e, "Persist failed mid-turn, reply still returned");
                Persisted::default()
            }
        };

        // A human got their reply; never leave the turn pending
        if let Err(e) = self.store.mark_entry_processed(&entry_id).await {
            warn!(owner_id, entry_id, error = %e, "Could not mark conversational entry processed");
        }

        Ok(ConverseReply {
            reply,
            new_version: persisted.new_version,
            notes: persisted.notes,
        })
    }

    fn degraded_turn(&self, owner_id: &str, message: &str) -> ConverseOutput {
        ConverseOutput {
            reply: canned_reply(message),
            extraction: ExtractionOutput {
                notes: vec![NoteSpec {
                    kind: "question".to_string(),
                    content: format!(
                        "Follow up on an unprocessed message from {owner_id}: {}",
                        excerpt(message, 200)
                    ),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    /// Persist one extraction result, in order: training pairs, notepad
    /// updates, then the profile delta. Deltas only apply once a profile
    /// exists; bootstrap evidence accumulates in the notepad and pair store.
    async fn persist(
        &self,
        owner_id: &str,
        summary: Option<&str>,
        output: ExtractionOutput,
    ) -> Result<Persisted> {
        let system_prompt = prompts::persona_system_prompt(summary);

        let mut pairs = 0;
        for spec in output.training_pairs {
            if spec.assistant.trim().is_empty() || spec.user.trim().is_empty() {
                continue;
            }
            self.store
                .insert_training_pair(TrainingPair::new(
                    owner_id,
                    system_prompt.clone(),
                    spec.user,
                    spec.assistant,
                    spec.quality,
                    PairSource::Extraction,
                ))
                .await?;
            pairs += 1;
        }

        let mut notes: Vec<Note> = output
            .notes
            .into_iter()
            .filter_map(|spec| spec.into_note(owner_id))
            .collect();
        if output.ready_for_training == Some(true) {
            notes.push(
                Note::new(
                    owner_id,
                    NoteKind::Observation,
                    "Extraction suggests the profile may be ready for a training run",
                )
                .with_topic("training_readiness")
                .with_priority(NotePriority::High),
            );
        }
        let note_count = notes.len();
        self.notepad.append_notes(notes).await?;
        if !output.scratchpad.trim().is_empty() {
            self.notepad
                .append_scratchpad(owner_id, &output.scratchpad)
                .await?;
        }

        let mut new_version = None;
        if !output.deltas.is_empty() && self.manager.current(owner_id).await?.is_some() {
            new_version = self
                .manager
                .apply_delta(owner_id, &output.deltas)
                .await?
                .map(|doc| doc.version);
        }

        Ok(Persisted {
            new_version,
            pairs,
            notes: note_count,
        })
    }
}

#[derive(Default)]
struct Persisted {
    new_version: Option<u32>,
    pairs: usize,
    notes: usize,
}

fn canned_reply(message: &str) -> String {
    format!(
        "Thanks for sharing that. I've noted it down: \"{}\". \
         What felt most significant to you about it?",
        excerpt(message, 200)
    )
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
