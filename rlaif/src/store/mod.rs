//! Persistent storage contract for the pipeline.
//!
//! The store is an external collaborator consumed through one narrow trait:
//! append-mostly writes, point reads by owner, and the compare-and-set on
//! the current constitution version that safe versioning needs. An
//! in-memory implementation ships for tests and single-process deployments;
//! a relational implementation satisfies the same contract.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use constitution::{ConstitutionDocument, GapScore};

use crate::types::{
    Entry, MaturityScore, Note, RatingStatus, RlaifEvaluation, SyntheticRating, TrainingPair,
};

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Current constitution version moved underneath a writer
    #[error("Version conflict: expected current {expected:?}, found {actual:?}")]
    VersionConflict {
        expected: Option<u32>,
        actual: Option<u32>,
    },

    /// A record that may be mutated only once was mutated twice
    #[error("Immutable record: {0}")]
    Immutable(String),

    /// Backend failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A queued constitution update suggestion, inert until reviewed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConstitutionProposal {
    pub id: String,
    pub owner_id: String,
    pub candidate: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Storage contract for all pipeline records, keyed by owner id.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    // --- Entries ---

    /// Append a submitted entry.
    async fn insert_entry(&self, entry: Entry) -> Result<(), StoreError>;

    /// Oldest unprocessed entry for an owner, if any.
    async fn oldest_unprocessed_entry(&self, owner_id: &str) -> Result<Option<Entry>, StoreError>;

    /// Flip the processed flag; the single mutation an entry ever sees.
    async fn mark_entry_processed(&self, entry_id: &str) -> Result<(), StoreError>;

    /// Most recent entries for an owner, newest first.
    async fn recent_entries(&self, owner_id: &str, limit: usize) -> Result<Vec<Entry>, StoreError>;

    // --- Notes & scratchpad ---

    /// Append notes; notes are never overwritten.
    async fn insert_notes(&self, notes: Vec<Note>) -> Result<(), StoreError>;

    /// All notes for an owner, oldest first.
    async fn notes(&self, owner_id: &str) -> Result<Vec<Note>, StoreError>;

    /// Mark a note resolved (human review action).
    async fn resolve_note(&self, note_id: &str) -> Result<(), StoreError>;

    /// The scratchpad blob for an owner (empty string if none).
    async fn scratchpad(&self, owner_id: &str) -> Result<String, StoreError>;

    /// Replace the scratchpad blob (the notepad component owns windowing).
    async fn put_scratchpad(&self, owner_id: &str, content: String) -> Result<(), StoreError>;

    // --- Constitution ---

    /// Current constitution version, if one exists yet.
    async fn current_constitution(
        &self,
        owner_id: &str,
    ) -> Result<Option<ConstitutionDocument>, StoreError>;

    /// Persist a new version and advance the current pointer.
    ///
    /// `expected_current` is the version number the writer merged from
    /// (`None` for bootstrap). The write fails with `VersionConflict` if the
    /// current pointer has moved.
    async fn insert_constitution_version(
        &self,
        doc: ConstitutionDocument,
        expected_current: Option<u32>,
    ) -> Result<(), StoreError>;

    /// Queue an update suggestion without touching the current version.
    async fn insert_proposal(&self, proposal: ConstitutionProposal) -> Result<(), StoreError>;

    /// Pending proposals for an owner.
    async fn proposals(&self, owner_id: &str) -> Result<Vec<ConstitutionProposal>, StoreError>;

    // --- Training pairs ---

    async fn insert_training_pair(&self, pair: TrainingPair) -> Result<(), StoreError>;

    async fn training_pairs(&self, owner_id: &str) -> Result<Vec<TrainingPair>, StoreError>;

    // --- Evaluations & ratings ---

    /// Append an immutable evaluation audit record.
    async fn insert_evaluation(&self, evaluation: RlaifEvaluation) -> Result<(), StoreError>;

    async fn evaluations(&self, owner_id: &str) -> Result<Vec<RlaifEvaluation>, StoreError>;

    async fn insert_rating(&self, rating: SyntheticRating) -> Result<(), StoreError>;

    async fn rating(&self, rating_id: &str) -> Result<SyntheticRating, StoreError>;

    /// All synthetic ratings for an owner.
    async fn ratings(&self, owner_id: &str) -> Result<Vec<SyntheticRating>, StoreError>;

    /// Finalize a queued rating. Fails with `Immutable` if it was already
    /// validated; ratings are mutated exactly once.
    async fn finalize_rating(
        &self,
        rating_id: &str,
        status: RatingStatus,
    ) -> Result<(), StoreError>;

    // --- Scores ---

    async fn put_gap_scores(&self, owner_id: &str, scores: Vec<GapScore>)
        -> Result<(), StoreError>;

    async fn gap_scores(&self, owner_id: &str) -> Result<Vec<GapScore>, StoreError>;

    async fn put_maturity(&self, score: MaturityScore) -> Result<(), StoreError>;

    async fn maturity(&self, owner_id: &str) -> Result<Option<MaturityScore>, StoreError>;
}
