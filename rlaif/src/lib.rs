//! Stateful core of the persona pipeline.
//!
//! Raw text an owner submits becomes structured updates to their versioned
//! constitution, notepad state, and quality-scored training pairs; a
//! self-evaluation loop then probes the candidate model against the profile
//! and routes each result by confidence.
//!
//! # Key Components
//!
//! - [`PersonaContext`]: one explicit dependency-injection struct per
//!   process; no ambient global state
//! - [`ExtractionEngine`]: entry intake, batch processing, conversational turns
//! - [`ConstitutionManager`]: per-owner serialized versioning and gap scores
//! - [`EvaluationLoop`]: synthetic probes, four-dimension scoring, routing
//! - [`FeedbackIngestor`]: folds human judgments back into the loop
//! - [`PersonaStore`]: narrow persistence contract, [`MemoryStore`] included
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use persona_agent::{MockBackend, MockCandidate, ReasoningService};
//! use rlaif::{MemoryStore, PersonaContext, RlaifConfig};
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MockBackend::default().with_response("{}"));
//! let context = PersonaContext::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ReasoningService::single(backend)),
//!     Arc::new(MockCandidate::new("as myself, I would say...")),
//!     RlaifConfig::default(),
//! );
//!
//! let entry_id = context
//!     .extraction
//!     .enqueue("owner-1", "I never cut corners.", "journal")
//!     .await
//!     .unwrap();
//! assert!(!entry_id.is_empty());
//! # });
//! ```

pub mod config;
pub mod evaluation;
pub mod extraction;
pub mod feedback;
pub mod manager;
pub mod maturity;
pub mod notepad;
pub mod prompts;
pub mod store;
pub mod types;

// Re-export main types
pub use config::{ConfidenceWeights, EvaluationConfig, ExtractionConfig, NotepadConfig, RlaifConfig, RoutingConfig};
pub use evaluation::{route_evaluation, EvaluationLoop, EvaluatorOutput};
pub use extraction::{ConverseReply, ExtractionEngine, ExtractionOutput};
pub use feedback::{Feedback, FeedbackIngestor};
pub use manager::{ConstitutionManager, OwnerLocks};
pub use maturity::{compute_maturity, MaturityScorer};
pub use notepad::{Notepad, NotepadStats, NotepadView};
pub use store::{ConstitutionProposal, MemoryStore, PersonaStore, StoreError};
pub use types::{
    BatchReport, Entry, EvalScores, MaturityScore, Note, NoteCategory, NoteKind, NotePriority,
    NoteStatus, PairSource, ProcessingOutcome, RatingStatus, RatingValue, Result, RlaifError,
    RlaifEvaluation, Routing, SectionMaturity, SyntheticRating, TrainingPair,
};

use std::sync::Arc;

use constitution::{KeywordClassifier, SectionClassifier};
use persona_agent::{CandidateModel, ReasoningService};

/// Everything one process needs, constructed once and passed around.
///
/// Components share the store, the reasoning service, and the per-owner lock
/// registry; there is no module-level singleton state anywhere in the crate.
pub struct PersonaContext {
    pub config: RlaifConfig,
    pub store: Arc<dyn PersonaStore>,
    pub service: Arc<ReasoningService>,
    pub candidate: Arc<dyn CandidateModel>,
    pub notepad: Notepad,
    pub manager: ConstitutionManager,
    pub extraction: ExtractionEngine,
    pub evaluation: EvaluationLoop,
    pub feedback: FeedbackIngestor,
    pub maturity: MaturityScorer,
}

impl PersonaContext {
    /// Build a context with the default keyword section classifier.
    pub fn new(
        store: Arc<dyn PersonaStore>,
        service: Arc<ReasoningService>,
        candidate: Arc<dyn CandidateModel>,
        config: RlaifConfig,
    ) -> Self {
        Self::with_classifier(store, service, candidate, Arc::new(KeywordClassifier::new()), config)
    }

    /// Build a context with a custom section classifier.
    pub fn with_classifier(
        store: Arc<dyn PersonaStore>,
        service: Arc<ReasoningService>,
        candidate: Arc<dyn CandidateModel>,
        classifier: Arc<dyn SectionClassifier>,
        config: RlaifConfig,
    ) -> Self {
        let locks = Arc::new(OwnerLocks::new());
        let manager = ConstitutionManager::new(store.clone(), locks);
        let notepad = Notepad::new(store.clone(), config.notepad.clone());
        let maturity = MaturityScorer::new(store.clone());

        let extraction = ExtractionEngine::new(
            store.clone(),
            service.clone(),
            manager.clone(),
            notepad.clone(),
            config.extraction.clone(),
        );
        let evaluation = EvaluationLoop::new(
            store.clone(),
            service.clone(),
            candidate.clone(),
            classifier,
            manager.clone(),
            notepad.clone(),
            maturity.clone(),
            config.clone(),
        );
        let feedback = FeedbackIngestor::new(
            store.clone(),
            service.clone(),
            manager.clone(),
            notepad.clone(),
            maturity.clone(),
            config.clone(),
        );

        Self {
            config,
            store,
            service,
            candidate,
            notepad,
            manager,
            extraction,
            evaluation,
            feedback,
            maturity,
        }
    }
}
