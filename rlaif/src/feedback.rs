//! Feedback ingestor: folds explicit human judgments back into the loop.
//!
//! Two paths in: free-form feedback on any model response, and validation of
//! a queued synthetic rating. Positive feedback becomes a training pair;
//! every piece of feedback is mined for notepad updates; validations close
//! out the review item and refresh gap and maturity scores.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use persona_agent::{QualityTier, ReasoningService};

use crate::config::RlaifConfig;
use crate::extraction::NoteSpec;
use crate::manager::ConstitutionManager;
use crate::maturity::MaturityScorer;
use crate::notepad::Notepad;
use crate::prompts;
use crate::store::{PersonaStore, StoreError};
use crate::types::{
    Note, NoteCategory, NoteKind, NotePriority, PairSource, RatingStatus, RatingValue, Result,
    RlaifError, TrainingPair,
};

/// An explicit human judgment of one model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: RatingValue,
    pub comment: Option<String>,
    pub prompt: String,
    pub response: String,
}

/// Notepad updates mined from one piece of feedback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeedbackNotes {
    #[serde(default)]
    notes: Vec<NoteSpec>,
}

/// The feedback ingestor.
#[derive(Clone)]
pub struct FeedbackIngestor {
    store: Arc<dyn PersonaStore>,
    service: Arc<ReasoningService>,
    manager: ConstitutionManager,
    notepad: Notepad,
    maturity: MaturityScorer,
    config: RlaifConfig,
}

impl FeedbackIngestor {
    pub fn new(
        store: Arc<dyn PersonaStore>,
        service: Arc<ReasoningService>,
        manager: ConstitutionManager,
        notepad: Notepad,
        maturity: MaturityScorer,
        config: RlaifConfig,
    ) -> Self {
        Self {
            store,
            service,
            manager,
            notepad,
            maturity,
            config,
        }
    }

    /// Ingest one piece of explicit feedback.
    ///
    /// A good rating stores the pair as a training example; a bad rating
    /// never does. Either way the feedback is mined for notepad updates,
    /// best-effort.
    pub async fn learn_from_feedback(&self, owner_id: &str, feedback: Feedback) -> Result<()> {
        if feedback.rating == RatingValue::Good {
            let summary = self
                .manager
                .summary(owner_id, self.config.extraction.summary_items_per_field)
                .await?;
            self.store
                .insert_training_pair(TrainingPair::new(
                    owner_id,
                    prompts::persona_system_prompt(summary.as_deref()),
                    feedback.prompt.clone(),
                    feedback.response.clone(),
                    self.config.evaluation.feedback_quality,
                    PairSource::Feedback,
                ))
                .await?;
        }

        self.mine_notes(owner_id, &feedback).await;

        info!(
            owner_id,
            rating = ?feedback.rating,
            "Feedback ingested"
        );
        Ok(())
    }

    /// Extract what the feedback confirms or contradicts into notes.
    async fn mine_notes(&self, owner_id: &str, feedback: &Feedback) {
        let user_prompt = format!(
            "A person rated a response written in their voice as {:?}.{}\n\n\
             # Prompt\n\n{}\n\n# Rated response\n\n{}\n\n\
             What does this rating confirm or contradict about who they are? \
             Respond with JSON: {{\"notes\": [{{\"kind\": \
             \"observation|gap|mental_model|question\", \"content\": \"...\", \
             \"topic\": \"...\", \"priority\": \"high|medium|low\", \
             \"critical\": false}}]}}",
            feedback.rating,
            feedback
                .comment
                .as_deref()
                .map(|c| format!(" Their comment: \"{c}\"."))
                .unwrap_or_default(),
            feedback.prompt,
            feedback.response,
        );

        let mined = match self
            .service
            .generate::<FeedbackNotes>(
                QualityTier::Quality,
                "You analyze human feedback on a persona model and extract durable \
                 personality evidence as typed notes.",
                &user_prompt,
            )
            .await
        {
            Ok(structured) => structured.into_inner().notes,
            Err(e) => {
                warn!(owner_id, error = %e, "Feedback note mining failed, skipping notes");
                return;
            }
        };

        let notes: Vec<Note> = mined
            .into_iter()
            .filter_map(|spec| spec.into_note(owner_id))
            .collect();
        self.notepad.append_notes_best_effort(owner_id, notes).await;
    }

    /// Let a human close the loop on a queued synthetic rating.
    ///
    /// Disagreement files a high-priority calibration note. Agreement or
    /// disagreement both finalize the rating exactly once and refresh gap
    /// and maturity scores. A second validation attempt fails.
    pub async fn validate_synthetic_rating(
        &self,
        rating_id: &str,
        agreed: bool,
        comment: Option<&str>,
    ) -> Result<()> {
        let rating = match self.store.rating(rating_id).await {
            Ok(rating) => rating,
            Err(StoreError::NotFound(what)) => return Err(RlaifError::NotFound(what)),
            Err(e) => return Err(e.into()),
        };

        match self
            .store
            .finalize_rating(rating_id, RatingStatus::AuthorValidated)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Immutable(_)) => {
                return Err(RlaifError::AlreadyValidated(rating_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(note_id) = &rating.review_note_id {
            if let Err(e) = self.store.resolve_note(note_id).await {
                warn!(rating_id, note_id, error = %e, "Could not resolve review note");
            }
        }

        if !agreed {
            let note = Note::new(
                &rating.owner_id,
                NoteKind::Observation,
                format!(
                    "Evaluator miscalibration: author disagreed with a {:?} rating.{} Probe: {}",
                    rating.rating,
                    comment
                        .map(|c| format!(" Comment: \"{c}\"."))
                        .unwrap_or_default(),
                    rating.prompt,
                ),
            )
            .with_topic("evaluator_calibration")
            .with_priority(NotePriority::High)
            .with_category(NoteCategory::Critical);
            self.notepad
                .append_notes_best_effort(&rating.owner_id, vec![note])
                .await;
        }

        self.manager.recompute_gap_scores(&rating.owner_id).await?;
        self.maturity.recompute(&rating.owner_id).await?;

        info!(
            rating_id,
            owner_id = rating.owner_id,
            agreed,
            "Synthetic rating validated"
        );
        Ok(())
    }
}
