//! Gap scores: how little validated evidence a section has.
//!
//! A gap score is recomputed from evaluation outcomes, never hand-edited.
//! High gap means the section is under-covered or covered mostly by weak
//! evidence, and the evaluation loop targets its synthetic probes there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ConstitutionSection;

/// Priority label derived from the numeric gap score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    High,
    Medium,
    Low,
}

/// Per-(owner, section) measure of missing validated evidence, in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapScore {
    pub owner_id: String,
    pub section: ConstitutionSection,
    /// 1.0 = nothing validated, 0.0 = fully covered by favorable evidence
    pub score: f32,
    pub priority: GapPriority,
    /// Evaluations that touched this section so far
    pub evaluated: usize,
    pub updated_at: DateTime<Utc>,
}

impl GapScore {
    /// Build a gap score from evaluation counts for one section.
    ///
    /// `unfavorable` counts evaluations that were flagged or fell short of
    /// auto-approval. With no evaluations at all the section has no
    /// validated evidence, so the gap is maximal. Coverage alone never
    /// lowers a gap: if every evaluation is unfavorable the ratio stays at
    /// 1.0.
    pub fn from_counts(
        owner_id: impl Into<String>,
        section: ConstitutionSection,
        unfavorable: usize,
        total: usize,
    ) -> Self {
        let score = gap_ratio(unfavorable, total);
        Self {
            owner_id: owner_id.into(),
            section,
            score,
            priority: priority_for(score),
            evaluated: total,
            updated_at: Utc::now(),
        }
    }
}

/// The raw gap ratio.
pub fn gap_ratio(unfavorable: usize, total: usize) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (unfavorable.min(total) as f32 / total as f32).clamp(0.0, 1.0)
}

/// Priority bands over the gap score.
pub fn priority_for(score: f32) -> GapPriority {
    if score >= 0.6 {
        GapPriority::High
    } else if score >= 0.3 {
        GapPriority::Medium
    } else {
        GapPriority::Low
    }
}

/// Threshold above which a section counts as high-gap for probe targeting.
pub const HIGH_GAP_THRESHOLD: f32 = 0.5;
