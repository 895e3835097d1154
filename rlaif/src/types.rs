//! Core types for the persona pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use constitution::ConstitutionSection;

/// A raw text chunk submitted by the owner.
///
/// Content is immutable; the only mutation an entry ever sees is the
/// processed flag flipping to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Unique entry ID
    pub id: String,
    /// Owner who submitted the text
    pub owner_id: String,
    /// Raw submitted text, never truncated in storage
    pub content: String,
    /// Where the text came from (journal, chat, import, ...)
    pub source: String,
    /// Whether the extraction engine has consumed this entry
    pub processed: bool,
    /// When the entry was submitted
    pub created_at: DateTime<Utc>,
    /// When processing completed
    pub processed_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Create a new unprocessed entry.
    pub fn new(
        owner_id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            content: content.into(),
            source: source.into(),
            processed: false,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// Kind of a notepad note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Something observed about the owner
    Observation,
    /// Missing evidence worth chasing
    Gap,
    /// A mental model hypothesis
    MentalModel,
    /// An open question to ask the owner
    Question,
}

/// Priority of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePriority {
    High,
    Medium,
    Low,
}

/// Criticality of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Critical,
    NonCritical,
}

/// Lifecycle status of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Pending,
    Resolved,
}

/// A typed note on the owner's notepad.
///
/// Notes accumulate; they are never overwritten, only marked resolved by a
/// human review action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub kind: NoteKind,
    pub content: String,
    pub topic: Option<String>,
    pub priority: NotePriority,
    pub category: NoteCategory,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Create a pending note.
    pub fn new(owner_id: impl Into<String>, kind: NoteKind, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            kind,
            content: content.into(),
            topic: None,
            priority: NotePriority::Medium,
            category: NoteCategory::NonCritical,
            status: NoteStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_priority(mut self, priority: NotePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: NoteCategory) -> Self {
        self.category = category;
        self
    }
}

/// Where a training pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSource {
    /// Extracted from a submitted entry
    Extraction,
    /// Auto-approved synthetic probe
    Rlaif,
    /// Negative example from a flagged probe
    RlaifNegative,
    /// Explicit positive human feedback
    Feedback,
}

/// A quality-scored (prompt, response) training example.
///
/// Append-only: corrections are added as new pairs, never as updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPair {
    pub id: String,
    pub owner_id: String,
    pub system_prompt: String,
    pub user_content: String,
    pub assistant_content: String,
    /// Quality score in [0, 1]
    pub quality: f32,
    pub source: PairSource,
    pub created_at: DateTime<Utc>,
}

impl TrainingPair {
    pub fn new(
        owner_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
        assistant_content: impl Into<String>,
        quality: f32,
        source: PairSource,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
            assistant_content: assistant_content.into(),
            quality: quality.clamp(0.0, 1.0),
            source,
            created_at: Utc::now(),
        }
    }
}

/// The four evaluation dimensions, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvalScores {
    pub values_alignment: f32,
    pub model_usage: f32,
    pub heuristic_adherence: f32,
    pub style_match: f32,
}

impl Default for EvalScores {
    /// Neutral scores; missing or ambiguous evaluator output defaults here
    /// so routing always has numbers to work with.
    fn default() -> Self {
        Self {
            values_alignment: 0.5,
            model_usage: 0.5,
            heuristic_adherence: 0.5,
            style_match: 0.5,
        }
    }
}

impl EvalScores {
    /// Replace NaN or out-of-range values with the neutral 0.5.
    pub fn sanitized(self) -> Self {
        fn fix(v: f32) -> f32 {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                v
            } else {
                0.5
            }
        }
        Self {
            values_alignment: fix(self.values_alignment),
            model_usage: fix(self.model_usage),
            heuristic_adherence: fix(self.heuristic_adherence),
            style_match: fix(self.style_match),
        }
    }

    /// Weighted overall confidence.
    pub fn overall(&self, weights: &crate::config::ConfidenceWeights) -> f32 {
        weights.values * self.values_alignment
            + weights.models * self.model_usage
            + weights.heuristics * self.heuristic_adherence
            + weights.style * self.style_match
    }
}

/// Human rating of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingValue {
    Good,
    Bad,
}

/// Terminal routing outcome for an evaluated probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    /// Trustworthy enough to reinforce training directly
    AutoApproved,
    /// Queued for the owner to review
    AuthorReview,
    /// Confidently wrong; becomes a negative example
    Flagged,
}

impl Routing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApproved => "auto_approved",
            Self::AuthorReview => "author_review",
            Self::Flagged => "flagged",
        }
    }
}

/// Immutable audit record of one evaluated probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlaifEvaluation {
    pub id: String,
    pub owner_id: String,
    pub prompt: String,
    pub response: String,
    /// Section the probe was bucketed under for gap scoring
    pub section: ConstitutionSection,
    pub scores: EvalScores,
    pub overall_confidence: f32,
    pub rating: RatingValue,
    pub routing: Routing,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

/// Status of a synthetic rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStatus {
    AutoApproved,
    QueuedReview,
    AuthorValidated,
}

/// A synthetic rating awaiting (or past) human validation.
///
/// Mutated exactly once, when the owner validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticRating {
    pub id: String,
    pub owner_id: String,
    pub prompt: String,
    pub response: String,
    pub rating: RatingValue,
    /// Coarse confidence label for reviewers ("high" / "medium" / "low")
    pub confidence_label: String,
    pub reasoning: String,
    pub status: RatingStatus,
    /// Review note created alongside queued ratings
    pub review_note_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

/// Per-section slice of the maturity breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMaturity {
    pub section: ConstitutionSection,
    pub gap_score: f32,
    pub evaluated: usize,
}

/// Aggregate completeness metric for one owner's constitution.
///
/// Fully recomputed each time; no incremental state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaturityScore {
    pub owner_id: String,
    /// Overall scalar in [0, 1]
    pub score: f32,
    /// 1 - mean gap across sections
    pub coverage: f32,
    /// Share of evaluations that auto-approved
    pub reliability: f32,
    pub sections: Vec<SectionMaturity>,
    pub computed_at: DateTime<Utc>,
}

/// Result of asking the pipeline to process one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ProcessingOutcome {
    /// One entry was processed
    Processed {
        entry_id: String,
        /// New constitution version, when a delta was applied
        new_version: Option<u32>,
        training_pairs: usize,
        notes: usize,
    },
    /// No unprocessed entries for this owner
    NoWork,
}

/// Summary of one evaluation batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub probes: usize,
    pub auto_approved: usize,
    pub author_review: usize,
    pub flagged: usize,
    /// Probes skipped because the candidate call failed
    pub skipped: usize,
}

/// Error types for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RlaifError {
    /// Reasoning or candidate backend error
    #[error("Reasoning error: {0}")]
    Reasoning(#[from] persona_agent::ReasoningError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Constitution versioning error
    #[error("Constitution error: {0}")]
    Constitution(String),

    /// Rating already validated
    #[error("Rating {0} was already validated")]
    AlreadyValidated(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RlaifError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfidenceWeights;

    #[test]
    fn test_scores_sanitize_nan_and_range() {
        let scores = EvalScores {
            values_alignment: f32::NAN,
            model_usage: 1.7,
            heuristic_adherence: -0.2,
            style_match: 0.8,
        }
        .sanitized();

        assert_eq!(scores.values_alignment, 0.5);
        assert_eq!(scores.model_usage, 0.5);
        assert_eq!(scores.heuristic_adherence, 0.5);
        assert_eq!(scores.style_match, 0.8);
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let scores = EvalScores {
            values_alignment: 1.0,
            model_usage: 0.0,
            heuristic_adherence: 0.0,
            style_match: 0.0,
        };
        let overall = scores.overall(&ConfidenceWeights::default());
        assert!((overall - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_training_pair_quality_clamped() {
        let pair = TrainingPair::new("o", "s", "u", "a", 1.4, PairSource::Extraction);
        assert_eq!(pair.quality, 1.0);
    }
}
