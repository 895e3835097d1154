//! Maturity scoring: one completeness metric per profile.
//!
//! Maturity blends coverage (how low the gap scores sit) with reliability
//! (how often evaluations auto-approve). It is recomputed in full from
//! stored gap scores and evaluation outcomes each time; nothing incremental
//! is kept between invocations.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use constitution::{ConstitutionSection, GapScore};

use crate::store::PersonaStore;
use crate::types::{MaturityScore, Result, Routing, SectionMaturity};

const COVERAGE_WEIGHT: f32 = 0.6;
const RELIABILITY_WEIGHT: f32 = 0.4;

/// Compute a maturity score from gap scores and evaluation outcome counts.
///
/// Sections absent from `gaps` count at the maximal gap of 1.0. With no
/// evaluations at all, reliability is 0.
pub fn compute_maturity(
    owner_id: &str,
    gaps: &[GapScore],
    auto_approved: usize,
    total_evaluations: usize,
) -> MaturityScore {
    let sections: Vec<SectionMaturity> = ConstitutionSection::all()
        .iter()
        .map(|&section| {
            let gap = gaps.iter().find(|g| g.section == section);
            SectionMaturity {
                section,
                gap_score: gap.map_or(1.0, |g| g.score),
                evaluated: gap.map_or(0, |g| g.evaluated),
            }
        })
        .collect();

    let mean_gap =
        sections.iter().map(|s| s.gap_score).sum::<f32>() / sections.len() as f32;
    let coverage = (1.0 - mean_gap).clamp(0.0, 1.0);
    let reliability = if total_evaluations == 0 {
        0.0
    } else {
        (auto_approved as f32 / total_evaluations as f32).clamp(0.0, 1.0)
    };

    MaturityScore {
        owner_id: owner_id.to_string(),
        score: COVERAGE_WEIGHT * coverage + RELIABILITY_WEIGHT * reliability,
        coverage,
        reliability,
        sections,
        computed_at: Utc::now(),
    }
}

/// Recomputes and persists the maturity score.
#[derive(Clone)]
pub struct MaturityScorer {
    store: Arc<dyn PersonaStore>,
}

impl MaturityScorer {
    pub fn new(store: Arc<dyn PersonaStore>) -> Self {
        Self { store }
    }

    /// Full recompute from stored gap scores and evaluation outcomes.
    pub async fn recompute(&self, owner_id: &str) -> Result<MaturityScore> {
        let gaps = self.store.gap_scores(owner_id).await?;
        let evaluations = self.store.evaluations(owner_id).await?;
        let auto_approved = evaluations
            .iter()
            .filter(|e| e.routing == Routing::AutoApproved)
            .count();

        let score = compute_maturity(owner_id, &gaps, auto_approved, evaluations.len());
        self.store.put_maturity(score.clone()).await?;

        debug!(
            owner_id,
            score = score.score,
            coverage = score.coverage,
            reliability = score.reliability,
            "Maturity recomputed"
        );
        Ok(score)
    }

    /// Last persisted score, if any.
    pub async fn current(&self, owner_id: &str) -> Result<Option<MaturityScore>> {
        Ok(self.store.maturity(owner_id).await?)
    }
}
