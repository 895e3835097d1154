//! Constitution lifecycle: reads, delta application, proposals.
//!
//! All mutation of an owner's profile funnels through [`ConstitutionManager`]
//! so the versioning rules hold: versions are immutable, the current pointer
//! only moves forward, and a new version exists only when a merge actually
//! changed content. Writers for the same owner are serialized with an
//! in-process lock; the store-level compare-and-set backstops writers that
//! bypass this process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use constitution::{
    merge_sections, ConstitutionDocument, ConstitutionRenderer, ConstitutionSection,
    ConstitutionSections, GapScore, SectionDelta,
};

use crate::store::{ConstitutionProposal, PersonaStore};
use crate::types::{Result, Routing};

/// Per-owner async mutexes, created on first use.
///
/// Held across an owner's read-merge-write cycle and across gap recomputes,
/// so concurrent work for the same owner serializes instead of conflicting.
#[derive(Default)]
pub struct OwnerLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for one owner.
    pub fn lock_for(&self, owner_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Manages the versioned constitution for each owner.
#[derive(Clone)]
pub struct ConstitutionManager {
    store: Arc<dyn PersonaStore>,
    locks: Arc<OwnerLocks>,
}

impl ConstitutionManager {
    pub fn new(store: Arc<dyn PersonaStore>, locks: Arc<OwnerLocks>) -> Self {
        Self { store, locks }
    }

    /// Current version of an owner's constitution, if one exists.
    pub async fn current(&self, owner_id: &str) -> Result<Option<ConstitutionDocument>> {
        Ok(self.store.current_constitution(owner_id).await?)
    }

    /// Apply section deltas, creating a new version if content changed.
    ///
    /// With no prior profile an empty base is merged into, producing version
    /// 1. Returns `None` when the merge was a no-op; no version is created
    /// for no-op merges.
    pub async fn apply_delta(
        &self,
        owner_id: &str,
        deltas: &[SectionDelta],
    ) -> Result<Option<ConstitutionDocument>> {
        let lock = self.locks.lock_for(owner_id);
        let _guard = lock.lock().await;

        let current = self.store.current_constitution(owner_id).await?;
        let (base, expected) = match &current {
            Some(doc) => (doc.sections.clone(), Some(doc.version)),
            None => (ConstitutionSections::default(), None),
        };

        let (merged, changed) = merge_sections(&base, deltas);
        if !changed {
            debug!(owner_id, "Delta produced no content change, skipping version");
            return Ok(None);
        }

        let version = expected.map_or(1, |v| v + 1);
        let doc = ConstitutionDocument::new(owner_id, version, merged);
        self.store
            .insert_constitution_version(doc.clone(), expected)
            .await?;

        info!(owner_id, version, "Constitution version created");
        Ok(Some(doc))
    }

    /// Queue an update suggestion for human review without touching the
    /// current version.
    pub async fn propose_update(
        &self,
        owner_id: &str,
        candidate: serde_json::Value,
    ) -> Result<String> {
        let proposal = ConstitutionProposal {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            candidate,
            created_at: chrono::Utc::now(),
        };
        let id = proposal.id.clone();
        self.store.insert_proposal(proposal).await?;
        Ok(id)
    }

    /// Render the current constitution as markdown, or `None` pre-bootstrap.
    pub async fn render_markdown(&self, owner_id: &str) -> Result<Option<String>> {
        Ok(self
            .current(owner_id)
            .await?
            .map(|doc| ConstitutionRenderer::render_markdown(&doc)))
    }

    /// Bounded summary of the current constitution for prompt context.
    pub async fn summary(&self, owner_id: &str, items_per_field: usize) -> Result<Option<String>> {
        Ok(self
            .current(owner_id)
            .await?
            .map(|doc| ConstitutionRenderer::render_summary(&doc, items_per_field)))
    }

    /// Recompute all five gap scores from stored evaluation outcomes.
    ///
    /// Full recompute each time, under the owner lock so it never interleaves
    /// with a profile mutation. An evaluation counts as unfavorable unless it
    /// auto-approved; a section with no evaluations sits at the maximal gap.
    pub async fn recompute_gap_scores(&self, owner_id: &str) -> Result<Vec<GapScore>> {
        let lock = self.locks.lock_for(owner_id);
        let _guard = lock.lock().await;

        let evaluations = self.store.evaluations(owner_id).await?;
        let scores: Vec<GapScore> = ConstitutionSection::all()
            .iter()
            .map(|&section| {
                let total = evaluations.iter().filter(|e| e.section == section).count();
                let unfavorable = evaluations
                    .iter()
                    .filter(|e| e.section == section && e.routing != Routing::AutoApproved)
                    .count();
                GapScore::from_counts(owner_id, section, unfavorable, total)
            })
            .collect();

        self.store.put_gap_scores(owner_id, scores.clone()).await?;
        debug!(owner_id, sections = scores.len(), "Gap scores recomputed");
        Ok(scores)
    }

    /// Latest stored gap scores (one per section once recomputed).
    pub async fn gap_scores(&self, owner_id: &str) -> Result<Vec<GapScore>> {
        Ok(self.store.gap_scores(owner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use constitution::ConstitutionSection;

    fn manager() -> ConstitutionManager {
        ConstitutionManager::new(Arc::new(MemoryStore::new()), Arc::new(OwnerLocks::new()))
    }

    fn values_delta(item: &str) -> SectionDelta {
        SectionDelta::for_section(ConstitutionSection::Values)
            .with_items("values", vec![item.to_string()])
    }

    #[tokio::test]
    async fn test_first_delta_bootstraps_v1() {
        let manager = manager();
        assert!(manager.current("owner-1").await.unwrap().is_none());

        let doc = manager
            .apply_delta("owner-1", &[values_delta("honesty")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, 1);

        let current = manager.current("owner-1").await.unwrap().unwrap();
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_versions_increment_monotonically() {
        let manager = manager();
        for (i, item) in ["honesty", "curiosity", "rigor"].iter().enumerate() {
            let doc = manager
                .apply_delta("owner-1", &[values_delta(item)])
                .await
                .unwrap()
                .unwrap();
            assert_eq!(doc.version, i as u32 + 1);
        }
    }

    #[tokio::test]
    async fn test_noop_delta_creates_no_version() {
        let manager = manager();
        manager
            .apply_delta("owner-1", &[values_delta("honesty")])
            .await
            .unwrap();

        // Same item again dedupes away; empty delta changes nothing
        assert!(manager
            .apply_delta("owner-1", &[values_delta("honesty")])
            .await
            .unwrap()
            .is_none());
        assert!(manager.apply_delta("owner-1", &[]).await.unwrap().is_none());

        let current = manager.current("owner-1").await.unwrap().unwrap();
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_concurrent_deltas_serialize() {
        let manager = manager();
        let mut handles = Vec::new();
        for i in 0..8 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move {
                m.apply_delta("owner-1", &[values_delta(&format!("value-{i}"))])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let current = manager.current("owner-1").await.unwrap().unwrap();
        assert_eq!(current.version, 8);
        assert_eq!(
            current
                .sections
                .section(ConstitutionSection::Values)
                .values
                .len(),
            8
        );
    }

    #[tokio::test]
    async fn test_propose_update_leaves_current_untouched() {
        let store = Arc::new(MemoryStore::new());
        let manager = ConstitutionManager::new(store.clone(), Arc::new(OwnerLocks::new()));
        manager
            .apply_delta("owner-1", &[values_delta("honesty")])
            .await
            .unwrap();

        let proposal_id = manager
            .propose_update("owner-1", serde_json::json!({"values": ["ambition"]}))
            .await
            .unwrap();

        let proposals = store.proposals("owner-1").await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, proposal_id);
        // The suggestion is inert: no new version, no content change
        let current = manager.current("owner-1").await.unwrap().unwrap();
        assert_eq!(current.version, 1);
        assert!(!current
            .sections
            .section(ConstitutionSection::Values)
            .values
            .contains(&"ambition".to_string()));
    }

    #[tokio::test]
    async fn test_gap_recompute_covers_all_sections() {
        let store = Arc::new(MemoryStore::new());
        let manager = ConstitutionManager::new(store.clone(), Arc::new(OwnerLocks::new()));

        for routing in [Routing::AutoApproved, Routing::Flagged] {
            store
                .insert_evaluation(crate::types::RlaifEvaluation {
                    id: uuid::Uuid::new_v4().to_string(),
                    owner_id: "owner-1".to_string(),
                    prompt: "p".to_string(),
                    response: "r".to_string(),
                    section: ConstitutionSection::Values,
                    scores: Default::default(),
                    overall_confidence: 0.5,
                    rating: crate::types::RatingValue::Good,
                    routing,
                    reasoning: String::new(),
                    created_at: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }

        let scores = manager.recompute_gap_scores("owner-1").await.unwrap();
        assert_eq!(scores.len(), 5);

        let values = scores
            .iter()
            .find(|g| g.section == ConstitutionSection::Values)
            .unwrap();
        assert_eq!(values.score, 0.5);
        // Sections with no evaluations carry the maximal gap
        assert!(scores
            .iter()
            .filter(|g| g.section != ConstitutionSection::Values)
            .all(|g| g.score == 1.0));
    }

    #[tokio::test]
    async fn test_render_before_bootstrap() {
        let manager = manager();
        assert!(manager.render_markdown("owner-1").await.unwrap().is_none());

        manager
            .apply_delta("owner-1", &[values_delta("honesty")])
            .await
            .unwrap();
        let markdown = manager.render_markdown("owner-1").await.unwrap().unwrap();
        assert!(markdown.contains("honesty"));
    }
}
