//! Notepad: persistent scratch state bridging processing cycles.
//!
//! Two halves: a free-text scratchpad (append-only with timestamped
//! separators, windowed to a trailing cap) and typed notes that accumulate
//! until a human resolves them. Stats are derived on read, never stored.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::NotepadConfig;
use crate::store::PersonaStore;
use crate::types::{Note, NoteCategory, NoteKind, NotePriority, NoteStatus, Result};

/// Derived notepad statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotepadStats {
    pub total_notes: usize,
    pub pending_questions: usize,
    pub critical_pending: usize,
}

/// Snapshot of an owner's notepad.
#[derive(Debug, Clone)]
pub struct NotepadView {
    pub scratchpad: String,
    pub notes_by_kind: HashMap<NoteKind, Vec<Note>>,
    pub stats: NotepadStats,
}

/// The notepad component.
#[derive(Clone)]
pub struct Notepad {
    store: Arc<dyn PersonaStore>,
    config: NotepadConfig,
}

impl Notepad {
    pub fn new(store: Arc<dyn PersonaStore>, config: NotepadConfig) -> Self {
        Self { store, config }
    }

    /// Full notepad snapshot with derived stats.
    pub async fn get(&self, owner_id: &str) -> Result<NotepadView> {
        let scratchpad = self.store.scratchpad(owner_id).await?;
        let notes = self.store.notes(owner_id).await?;

        let stats = NotepadStats {
            total_notes: notes.len(),
            pending_questions: notes
                .iter()
                .filter(|n| n.kind == NoteKind::Question && n.status == NoteStatus::Pending)
                .count(),
            critical_pending: notes
                .iter()
                .filter(|n| n.category == NoteCategory::Critical && n.status == NoteStatus::Pending)
                .count(),
        };

        let mut notes_by_kind: HashMap<NoteKind, Vec<Note>> = HashMap::new();
        for note in notes {
            notes_by_kind.entry(note.kind).or_default().push(note);
        }

        Ok(NotepadView {
            scratchpad,
            notes_by_kind,
            stats,
        })
    }

    /// Append notes. New notes accumulate; nothing is overwritten.
    pub async fn append_notes(&self, notes: Vec<Note>) -> Result<()> {
        if notes.is_empty() {
            return Ok(());
        }
        self.store.insert_notes(notes).await?;
        Ok(())
    }

    /// Append to the scratchpad with a timestamped separator, then trim to
    /// the trailing window so context size stays bounded.
    pub async fn append_scratchpad(&self, owner_id: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let mut blob = self.store.scratchpad(owner_id).await?;
        if !blob.is_empty() {
            blob.push_str("\n\n");
        }
        blob.push_str(&format!(
            "--- {} ---\n{}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
            text
        ));

        let window = self.config.scratchpad_window_chars;
        if blob.len() > window {
            // Trim on a char boundary at the window edge
            let cut = blob.len() - window;
            let cut = (cut..blob.len())
                .find(|i| blob.is_char_boundary(*i))
                .unwrap_or(blob.len());
            blob = blob[cut..].to_string();
        }

        self.store.put_scratchpad(owner_id, blob).await?;
        Ok(())
    }

    /// Bounded summary of the most important pending items for prompt
    /// context: critical and high-priority first, then most recent.
    pub async fn summary(&self, owner_id: &str, max_notes: usize) -> Result<String> {
        let notes = self.store.notes(owner_id).await?;
        let mut pending: Vec<&Note> = notes
            .iter()
            .filter(|n| n.status == NoteStatus::Pending)
            .collect();

        pending.sort_by_key(|n| {
            let category_rank = match n.category {
                NoteCategory::Critical => 0,
                NoteCategory::NonCritical => 1,
            };
            let priority_rank = match n.priority {
                NotePriority::High => 0,
                NotePriority::Medium => 1,
                NotePriority::Low => 2,
            };
            (category_rank, priority_rank, std::cmp::Reverse(n.created_at))
        });

        let mut out = String::new();
        for note in pending.into_iter().take(max_notes) {
            out.push_str(&format!(
                "- [{kind:?}/{priority:?}] {content}\n",
                kind = note.kind,
                priority = note.priority,
                content = note.content
            ));
        }
        Ok(out)
    }

    /// Best-effort variant of [`append_notes`](Self::append_notes) for
    /// non-critical pipeline writes: failures are logged and swallowed.
    pub async fn append_notes_best_effort(&self, owner_id: &str, notes: Vec<Note>) {
        if let Err(e) = self.append_notes(notes).await {
            warn!(owner_id, error = %e, "Notepad insert failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn notepad() -> Notepad {
        Notepad::new(Arc::new(MemoryStore::new()), NotepadConfig::default())
    }

    #[tokio::test]
    async fn test_stats_are_derived() {
        let notepad = notepad();
        notepad
            .append_notes(vec![
                Note::new("owner-1", NoteKind::Question, "open question"),
                Note::new("owner-1", NoteKind::Observation, "critical observation")
                    .with_category(NoteCategory::Critical),
            ])
            .await
            .unwrap();

        let view = notepad.get("owner-1").await.unwrap();
        assert_eq!(view.stats.total_notes, 2);
        assert_eq!(view.stats.pending_questions, 1);
        assert_eq!(view.stats.critical_pending, 1);
    }

    #[tokio::test]
    async fn test_scratchpad_appends_with_separator() {
        let notepad = notepad();
        notepad.append_scratchpad("owner-1", "first thought").await.unwrap();
        notepad.append_scratchpad("owner-1", "second thought").await.unwrap();

        let view = notepad.get("owner-1").await.unwrap();
        assert!(view.scratchpad.contains("first thought"));
        assert!(view.scratchpad.contains("second thought"));
        assert_eq!(view.scratchpad.matches("--- ").count(), 2);
    }

    #[tokio::test]
    async fn test_scratchpad_window_bounded() {
        let store = Arc::new(MemoryStore::new());
        let notepad = Notepad::new(
            store,
            NotepadConfig {
                scratchpad_window_chars: 200,
            },
        );

        for i in 0..10 {
            notepad
                .append_scratchpad("owner-1", &format!("entry {i}: {}", "x".repeat(60)))
                .await
                .unwrap();
        }

        let view = notepad.get("owner-1").await.unwrap();
        assert!(view.scratchpad.len() <= 200);
        // Oldest content trimmed, newest kept
        assert!(view.scratchpad.contains("entry 9"));
        assert!(!view.scratchpad.contains("entry 0"));
    }

    #[tokio::test]
    async fn test_summary_orders_critical_first() {
        let notepad = notepad();
        notepad
            .append_notes(vec![
                Note::new("owner-1", NoteKind::Observation, "minor detail")
                    .with_priority(NotePriority::Low),
                Note::new("owner-1", NoteKind::Gap, "core values unknown")
                    .with_category(NoteCategory::Critical)
                    .with_priority(NotePriority::High),
            ])
            .await
            .unwrap();

        let summary = notepad.summary("owner-1", 1).await.unwrap();
        assert!(summary.contains("core values unknown"));
        assert!(!summary.contains("minor detail"));
    }
}
