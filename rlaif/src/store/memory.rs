//! In-memory store backed by dashmap.
//!
//! Collections are keyed by owner id; entries, notes and ratings also get a
//! global id index for point lookups. The constitution map guards the
//! current-pointer compare-and-set through dashmap's entry-level locking.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use constitution::{ConstitutionDocument, GapScore};

use super::{ConstitutionProposal, PersonaStore, StoreError};
use crate::types::{
    Entry, MaturityScore, Note, NoteStatus, RatingStatus, RlaifEvaluation, SyntheticRating,
    TrainingPair,
};

/// In-memory implementation of [`PersonaStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<Entry>>,
    notes: DashMap<String, Vec<Note>>,
    scratchpads: DashMap<String, String>,
    /// Owner -> full version chain, current last
    constitutions: DashMap<String, Vec<ConstitutionDocument>>,
    proposals: DashMap<String, Vec<ConstitutionProposal>>,
    training_pairs: DashMap<String, Vec<TrainingPair>>,
    evaluations: DashMap<String, Vec<RlaifEvaluation>>,
    ratings: DashMap<String, Vec<SyntheticRating>>,
    gap_scores: DashMap<String, Vec<GapScore>>,
    maturity: DashMap<String, MaturityScore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersonaStore for MemoryStore {
    async fn insert_entry(&self, entry: Entry) -> Result<(), StoreError> {
        self.entries
            .entry(entry.owner_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn oldest_unprocessed_entry(&self, owner_id: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.entries.get(owner_id).and_then(|entries| {
            entries
                .iter()
                .filter(|e| !e.processed)
                .min_by_key(|e| e.created_at)
                .cloned()
        }))
    }

    async fn mark_entry_processed(&self, entry_id: &str) -> Result<(), StoreError> {
        for mut owner_entries in self.entries.iter_mut() {
            if let Some(entry) = owner_entries.iter_mut().find(|e| e.id == entry_id) {
                entry.processed = true;
                entry.processed_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("entry {entry_id}")))
    }

    async fn recent_entries(&self, owner_id: &str, limit: usize) -> Result<Vec<Entry>, StoreError> {
        let mut entries = self
            .entries
            .get(owner_id)
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn insert_notes(&self, notes: Vec<Note>) -> Result<(), StoreError> {
        for note in notes {
            self.notes
                .entry(note.owner_id.clone())
                .or_default()
                .push(note);
        }
        Ok(())
    }

    async fn notes(&self, owner_id: &str) -> Result<Vec<Note>, StoreError> {
        Ok(self
            .notes
            .get(owner_id)
            .map(|n| n.clone())
            .unwrap_or_default())
    }

    async fn resolve_note(&self, note_id: &str) -> Result<(), StoreError> {
        for mut owner_notes in self.notes.iter_mut() {
            if let Some(note) = owner_notes.iter_mut().find(|n| n.id == note_id) {
                note.status = NoteStatus::Resolved;
                note.resolved_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("note {note_id}")))
    }

    async fn scratchpad(&self, owner_id: &str) -> Result<String, StoreError> {
        Ok(self
            .scratchpads
            .get(owner_id)
            .map(|s| s.clone())
            .unwrap_or_default())
    }

    async fn put_scratchpad(&self, owner_id: &str, content: String) -> Result<(), StoreError> {
        self.scratchpads.insert(owner_id.to_string(), content);
        Ok(())
    }

    async fn current_constitution(
        &self,
        owner_id: &str,
    ) -> Result<Option<ConstitutionDocument>, StoreError> {
        Ok(self
            .constitutions
            .get(owner_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn insert_constitution_version(
        &self,
        doc: ConstitutionDocument,
        expected_current: Option<u32>,
    ) -> Result<(), StoreError> {
        // The entry guard holds the shard lock for this owner, making the
        // compare-and-set atomic.
        let mut chain = self.constitutions.entry(doc.owner_id.clone()).or_default();
        let actual = chain.last().map(|d| d.version);

        if actual != expected_current {
            return Err(StoreError::VersionConflict {
                expected: expected_current,
                actual,
            });
        }
        chain.push(doc);
        Ok(())
    }

    async fn insert_proposal(&self, proposal: ConstitutionProposal) -> Result<(), StoreError> {
        self.proposals
            .entry(proposal.owner_id.clone())
            .or_default()
            .push(proposal);
        Ok(())
    }

    async fn proposals(&self, owner_id: &str) -> Result<Vec<ConstitutionProposal>, StoreError> {
        Ok(self
            .proposals
            .get(owner_id)
            .map(|p| p.clone())
            .unwrap_or_default())
    }

    async fn insert_training_pair(&self, pair: TrainingPair) -> Result<(), StoreError> {
        self.training_pairs
            .entry(pair.owner_id.clone())
            .or_default()
            .push(pair);
        Ok(())
    }

    async fn training_pairs(&self, owner_id: &str) -> Result<Vec<TrainingPair>, StoreError> {
        Ok(self
            .training_pairs
            .get(owner_id)
            .map(|p| p.clone())
            .unwrap_or_default())
    }

    async fn insert_evaluation(&self, evaluation: RlaifEvaluation) -> Result<(), StoreError> {
        self.evaluations
            .entry(evaluation.owner_id.clone())
            .or_default()
            .push(evaluation);
        Ok(())
    }

    async fn evaluations(&self, owner_id: &str) -> Result<Vec<RlaifEvaluation>, StoreError> {
        Ok(self
            .evaluations
            .get(owner_id)
            .map(|e| e.clone())
            .unwrap_or_default())
    }

    async fn insert_rating(&self, rating: SyntheticRating) -> Result<(), StoreError> {
        self.ratings
            .entry(rating.owner_id.clone())
            .or_default()
            .push(rating);
        Ok(())
    }

    async fn rating(&self, rating_id: &str) -> Result<SyntheticRating, StoreError> {
        for owner_ratings in self.ratings.iter() {
            if let Some(rating) = owner_ratings.iter().find(|r| r.id == rating_id) {
                return Ok(rating.clone());
            }
        }
        Err(StoreError::NotFound(format!("rating {rating_id}")))
    }

    async fn ratings(&self, owner_id: &str) -> Result<Vec<SyntheticRating>, StoreError> {
        Ok(self
            .ratings
            .get(owner_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn finalize_rating(
        &self,
        rating_id: &str,
        status: RatingStatus,
    ) -> Result<(), StoreError> {
        for mut owner_ratings in self.ratings.iter_mut() {
            if let Some(rating) = owner_ratings.iter_mut().find(|r| r.id == rating_id) {
                if rating.status == RatingStatus::AuthorValidated {
                    return Err(StoreError::Immutable(format!(
                        "rating {rating_id} already validated"
                    )));
                }
                rating.status = status;
                rating.validated_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("rating {rating_id}")))
    }

    async fn put_gap_scores(
        &self,
        owner_id: &str,
        scores: Vec<GapScore>,
    ) -> Result<(), StoreError> {
        self.gap_scores.insert(owner_id.to_string(), scores);
        Ok(())
    }

    async fn gap_scores(&self, owner_id: &str) -> Result<Vec<GapScore>, StoreError> {
        Ok(self
            .gap_scores
            .get(owner_id)
            .map(|g| g.clone())
            .unwrap_or_default())
    }

    async fn put_maturity(&self, score: MaturityScore) -> Result<(), StoreError> {
        self.maturity.insert(score.owner_id.clone(), score);
        Ok(())
    }

    async fn maturity(&self, owner_id: &str) -> Result<Option<MaturityScore>, StoreError> {
        Ok(self.maturity.get(owner_id).map(|m| m.clone()))
    }
}
