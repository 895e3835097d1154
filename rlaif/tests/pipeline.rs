//! End-to-end pipeline tests over the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use constitution::{ConstitutionDocument, ConstitutionSection, GapScore, SectionDelta};
use persona_agent::{MockBackend, MockCandidate, ReasoningService};
use rlaif::{
    route_evaluation, ConstitutionProposal, Entry, EvalScores, MaturityScore, MemoryStore, Note,
    PairSource, PersonaContext, PersonaStore, ProcessingOutcome, RatingStatus, RatingValue,
    RlaifConfig, RlaifEvaluation, RoutingConfig, Routing, StoreError, SyntheticRating,
    TrainingPair,
};

const PROBE_OUTPUT: &str = r#"{"prompts": [
    "What principle do you protect most fiercely?",
    "How do you decide when a risk is worth it?",
    "What do you believe shapes how the world works?",
    "How would you describe yourself to a new colleague?"
]}"#;

const GOOD_VERDICT: &str = r#"{
    "values_alignment": 0.95, "model_usage": 0.9,
    "heuristic_adherence": 0.9, "style_match": 0.92,
    "rating": "good", "reasoning": "Sounds exactly like them."
}"#;

const BAD_VERDICT: &str = r#"{
    "values_alignment": 0.2, "model_usage": 0.5,
    "heuristic_adherence": 0.5, "style_match": 0.5,
    "rating": "bad", "reasoning": "Contradicts their stated boundaries."
}"#;

const EXTRACTION_OUTPUT: &str = r#"{
    "deltas": [{"section": "values", "additions": {"values": ["candor"]}}],
    "training_pairs": [{"user": "How direct are you?", "assistant": "Fully.", "quality": 0.7}],
    "notes": [{"kind": "observation", "content": "Direct communicator"}],
    "scratchpad": "candor keeps coming up"
}"#;

fn context_with(backend: MockBackend, candidate: MockCandidate) -> PersonaContext {
    PersonaContext::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ReasoningService::single(Arc::new(backend))),
        Arc::new(candidate),
        RlaifConfig::default(),
    )
}

async fn bootstrap_profile(context: &PersonaContext, owner_id: &str) {
    context
        .manager
        .apply_delta(
            owner_id,
            &[SectionDelta::for_section(ConstitutionSection::Values)
                .with_items("values", vec!["honesty".to_string()])],
        )
        .await
        .unwrap();
}

// --- Routing (spec'd decision table) ---

#[test]
fn routing_examples() {
    let config = RoutingConfig::default();
    let scores = |values: f32| EvalScores {
        values_alignment: values,
        ..Default::default()
    };

    assert_eq!(
        route_evaluation(&scores(0.9), 0.9, RatingValue::Good, &config),
        Routing::AutoApproved
    );
    // Values floor overrides even near-perfect confidence
    assert_eq!(
        route_evaluation(&scores(0.2), 0.95, RatingValue::Good, &config),
        Routing::Flagged
    );
    assert_eq!(
        route_evaluation(&scores(0.6), 0.5, RatingValue::Good, &config),
        Routing::AuthorReview
    );
}

// --- Entry processing & versioning ---

#[tokio::test]
async fn processed_entries_advance_versions() {
    let backend = MockBackend::default().with_response(EXTRACTION_OUTPUT);
    let context = context_with(backend, MockCandidate::new("unused"));
    bootstrap_profile(&context, "owner-1").await;

    context
        .extraction
        .enqueue("owner-1", "I say what I mean.", "journal")
        .await
        .unwrap();

    let outcome = context.extraction.process_next("owner-1").await.unwrap();
    match outcome {
        ProcessingOutcome::Processed {
            new_version,
            training_pairs,
            notes,
            ..
        } => {
            assert_eq!(new_version, Some(2));
            assert_eq!(training_pairs, 1);
            assert_eq!(notes, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let current = context.manager.current("owner-1").await.unwrap().unwrap();
    assert_eq!(current.version, 2);
    let values = &current.sections.section(ConstitutionSection::Values).values;
    assert!(values.contains(&"candor".to_string()));

    // Queue drained for this owner
    assert!(matches!(
        context.extraction.process_next("owner-1").await.unwrap(),
        ProcessingOutcome::NoWork
    ));
}

// --- Evaluation batches ---

#[tokio::test]
async fn batch_all_good_auto_approves() {
    let backend = MockBackend::default()
        .with_queued(PROBE_OUTPUT)
        .with_response(GOOD_VERDICT);
    let context = context_with(backend, MockCandidate::new("As myself, honestly."));
    bootstrap_profile(&context, "owner-1").await;

    let report = context.evaluation.run_batch("owner-1").await.unwrap();
    assert_eq!(report.probes, 8);
    assert_eq!(report.auto_approved, 8);
    assert_eq!(report.skipped, 0);

    let pairs = context.store.training_pairs("owner-1").await.unwrap();
    assert_eq!(pairs.len(), 8);
    assert!(pairs.iter().all(|p| p.source == PairSource::Rlaif));
    // Quality clamped into the approved band
    assert!(pairs.iter().all(|p| (0.65..=0.92).contains(&p.quality)));

    // Audit records and ratings for every probe
    assert_eq!(context.store.evaluations("owner-1").await.unwrap().len(), 8);
    let ratings = context.store.ratings("owner-1").await.unwrap();
    assert!(ratings.iter().all(|r| r.status == RatingStatus::AutoApproved));

    // Gap and maturity refreshed once for the batch
    let gaps = context.store.gap_scores("owner-1").await.unwrap();
    assert_eq!(gaps.len(), 5);
    assert!(gaps.iter().any(|g| g.score == 0.0));
    let maturity = context.maturity.current("owner-1").await.unwrap().unwrap();
    assert!(maturity.score > 0.0);
    assert_eq!(maturity.reliability, 1.0);
}

#[tokio::test]
async fn batch_flagged_probe_writes_negative_pair_and_review_note() {
    let backend = MockBackend::default()
        .with_queued(PROBE_OUTPUT)
        .with_response(BAD_VERDICT);
    let context = context_with(backend, MockCandidate::new("Whatever you want to hear."));
    bootstrap_profile(&context, "owner-1").await;

    let report = context.evaluation.run_batch("owner-1").await.unwrap();
    assert_eq!(report.flagged, 8);
    assert_eq!(report.auto_approved, 0);

    let pairs = context.store.training_pairs("owner-1").await.unwrap();
    assert_eq!(pairs.len(), 8);
    for pair in &pairs {
        assert_eq!(pair.source, PairSource::RlaifNegative);
        assert_eq!(pair.quality, 0.2);
        assert!(pair.assistant_content.starts_with("[Response to avoid]"));
    }

    let ratings = context.store.ratings("owner-1").await.unwrap();
    assert!(ratings.iter().all(|r| r.status == RatingStatus::QueuedReview));
    assert!(ratings.iter().all(|r| r.review_note_id.is_some()));

    // A review note per probe, all still pending
    let notes = context.store.notes("owner-1").await.unwrap();
    assert_eq!(notes.len(), 8);

    // All-unfavorable evaluations never lower a gap below its prior value
    let gaps = context.store.gap_scores("owner-1").await.unwrap();
    assert!(gaps.iter().all(|g| g.score == 1.0));
}

#[tokio::test]
async fn batch_skips_failing_probes_without_aborting() {
    let backend = MockBackend::default()
        .with_queued(PROBE_OUTPUT)
        .with_response(GOOD_VERDICT);
    // Fails on the first seed prompt only
    let candidate = MockCandidate::new("fine").failing_on("being kind and being honest");
    let context = context_with(backend, candidate);
    bootstrap_profile(&context, "owner-1").await;

    let report = context.evaluation.run_batch("owner-1").await.unwrap();
    assert_eq!(report.probes, 8);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.auto_approved, 7);
}

#[tokio::test]
async fn batch_without_profile_is_a_noop() {
    let context = context_with(MockBackend::default(), MockCandidate::new("x"));
    let report = context.evaluation.run_batch("owner-1").await.unwrap();
    assert_eq!(report.probes, 0);
    assert!(context.store.evaluations("owner-1").await.unwrap().is_empty());
}

// --- Feedback ---

#[tokio::test]
async fn feedback_pair_rules_hold_through_context() {
    let backend = MockBackend::default().with_response(r#"{"notes": []}"#);
    let context = context_with(backend, MockCandidate::new("x"));

    context
        .feedback
        .learn_from_feedback(
            "owner-1",
            rlaif::Feedback {
                rating: RatingValue::Good,
                comment: None,
                prompt: "p".to_string(),
                response: "r".to_string(),
            },
        )
        .await
        .unwrap();
    context
        .feedback
        .learn_from_feedback(
            "owner-1",
            rlaif::Feedback {
                rating: RatingValue::Bad,
                comment: None,
                prompt: "p2".to_string(),
                response: "r2".to_string(),
            },
        )
        .await
        .unwrap();

    let pairs = context.store.training_pairs("owner-1").await.unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].user_content, "p");
}

// --- Partial-failure tolerance ---

/// Store wrapper that can be told to fail the constitution version write.
struct FailingStore {
    inner: MemoryStore,
    fail_version_insert: AtomicBool,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_version_insert: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PersonaStore for FailingStore {
    async fn insert_entry(&self, entry: Entry) -> Result<(), StoreError> {
        self.inner.insert_entry(entry).await
    }
    async fn oldest_unprocessed_entry(&self, owner_id: &str) -> Result<Option<Entry>, StoreError> {
        self.inner.oldest_unprocessed_entry(owner_id).await
    }
    async fn mark_entry_processed(&self, entry_id: &str) -> Result<(), StoreError> {
        self.inner.mark_entry_processed(entry_id).await
    }
    async fn recent_entries(&self, owner_id: &str, limit: usize) -> Result<Vec<Entry>, StoreError> {
        self.inner.recent_entries(owner_id, limit).await
    }
    async fn insert_notes(&self, notes: Vec<Note>) -> Result<(), StoreError> {
        self.inner.insert_notes(notes).await
    }
    async fn notes(&self, owner_id: &str) -> Result<Vec<Note>, StoreError> {
        self.inner.notes(owner_id).await
    }
    async fn resolve_note(&self, note_id: &str) -> Result<(), StoreError> {
        self.inner.resolve_note(note_id).await
    }
    async fn scratchpad(&self, owner_id: &str) -> Result<String, StoreError> {
        self.inner.scratchpad(owner_id).await
    }
    async fn put_scratchpad(&self, owner_id: &str, content: String) -> Result<(), StoreError> {
        self.inner.put_scratchpad(owner_id, content).await
    }
    async fn current_constitution(
        &self,
        owner_id: &str,
    ) -> Result<Option<ConstitutionDocument>, StoreError> {
        self.inner.current_constitution(owner_id).await
    }
    async fn insert_constitution_version(
        &self,
        doc: ConstitutionDocument,
        expected_current: Option<u32>,
    ) -> Result<(), StoreError> {
        if self.fail_version_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected version write failure".to_string()));
        }
        self.inner
            .insert_constitution_version(doc, expected_current)
            .await
    }
    async fn insert_proposal(&self, proposal: ConstitutionProposal) -> Result<(), StoreError> {
        self.inner.insert_proposal(proposal).await
    }
    async fn proposals(&self, owner_id: &str) -> Result<Vec<ConstitutionProposal>, StoreError> {
        self.inner.proposals(owner_id).await
    }
    async fn insert_training_pair(&self, pair: TrainingPair) -> Result<(), StoreError> {
        self.inner.insert_training_pair(pair).await
    }
    async fn training_pairs(&self, owner_id: &str) -> Result<Vec<TrainingPair>, StoreError> {
        self.inner.training_pairs(owner_id).await
    }
    async fn insert_evaluation(&self, evaluation: RlaifEvaluation) -> Result<(), StoreError> {
        self.inner.insert_evaluation(evaluation).await
    }
    async fn evaluations(&self, owner_id: &str) -> Result<Vec<RlaifEvaluation>, StoreError> {
        self.inner.evaluations(owner_id).await
    }
    async fn insert_rating(&self, rating: SyntheticRating) -> Result<(), StoreError> {
        self.inner.insert_rating(rating).await
    }
    async fn rating(&self, rating_id: &str) -> Result<SyntheticRating, StoreError> {
        self.inner.rating(rating_id).await
    }
    async fn ratings(&self, owner_id: &str) -> Result<Vec<SyntheticRating>, StoreError> {
        self.inner.ratings(owner_id).await
    }
    async fn finalize_rating(
        &self,
        rating_id: &str,
        status: RatingStatus,
    ) -> Result<(), StoreError> {
        self.inner.finalize_rating(rating_id, status).await
    }
    async fn put_gap_scores(
        &self,
        owner_id: &str,
        scores: Vec<GapScore>,
    ) -> Result<(), StoreError> {
        self.inner.put_gap_scores(owner_id, scores).await
    }
    async fn gap_scores(&self, owner_id: &str) -> Result<Vec<GapScore>, StoreError> {
        self.inner.gap_scores(owner_id).await
    }
    async fn put_maturity(&self, score: MaturityScore) -> Result<(), StoreError> {
        self.inner.put_maturity(score).await
    }
    async fn maturity(&self, owner_id: &str) -> Result<Option<MaturityScore>, StoreError> {
        self.inner.maturity(owner_id).await
    }
}

#[tokio::test]
async fn version_write_failure_leaves_entry_unprocessed_for_retry() {
    let store = Arc::new(FailingStore::new());
    let backend = MockBackend::default().with_response(EXTRACTION_OUTPUT);
    let context = PersonaContext::new(
        store.clone(),
        Arc::new(ReasoningService::single(Arc::new(backend))),
        Arc::new(MockCandidate::new("unused")),
        RlaifConfig::default(),
    );
    bootstrap_profile(&context, "owner-1").await;

    context
        .extraction
        .enqueue("owner-1", "I say what I mean.", "journal")
        .await
        .unwrap();

    store.fail_version_insert.store(true, Ordering::SeqCst);
    assert!(context.extraction.process_next("owner-1").await.is_err());
    // The entry survives for the next cycle
    assert!(store
        .oldest_unprocessed_entry("owner-1")
        .await
        .unwrap()
        .is_some());

    // Re-driving the same entry succeeds once the store recovers
    store.fail_version_insert.store(false, Ordering::SeqCst);
    let outcome = context.extraction.process_next("owner-1").await.unwrap();
    assert!(matches!(
        outcome,
        ProcessingOutcome::Processed {
            new_version: Some(2),
            ..
        }
    ));
    assert!(store
        .oldest_unprocessed_entry("owner-1")
        .await
        .unwrap()
        .is_none());
}
