//! Evaluation loop: synthetic probes, scoring, and three-way routing.
//!
//! Each batch generates probe prompts biased toward high-gap profile
//! sections, collects candidate-model responses, scores each on four
//! dimensions against the profile, and routes the result. Every probe leaves
//! an immutable audit record; gap and maturity scores are recomputed once
//! per batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use constitution::{ConstitutionSection, SectionClassifier, HIGH_GAP_THRESHOLD};
use persona_agent::{CandidateModel, QualityTier, ReasoningService};

use crate::config::RlaifConfig;
use crate::manager::ConstitutionManager;
use crate::maturity::MaturityScorer;
use crate::notepad::Notepad;
use crate::prompts;
use crate::store::PersonaStore;
use crate::types::{
    BatchReport, EvalScores, Note, NoteKind, NotePriority, PairSource, RatingStatus, RatingValue,
    Result, RlaifEvaluation, Routing, SyntheticRating, TrainingPair,
};

/// Evaluator verdict as emitted by the reasoning model.
///
/// Missing or ambiguous scores default to the neutral 0.5 so routing always
/// has numbers to work with; the missing-rating default is `bad`, which can
/// never auto-approve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorOutput {
    #[serde(default = "neutral")]
    pub values_alignment: f32,
    #[serde(default = "neutral")]
    pub model_usage: f32,
    #[serde(default = "neutral")]
    pub heuristic_adherence: f32,
    #[serde(default = "neutral")]
    pub style_match: f32,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub reasoning: String,
}

fn neutral() -> f32 {
    0.5
}

impl Default for EvaluatorOutput {
    fn default() -> Self {
        Self {
            values_alignment: neutral(),
            model_usage: neutral(),
            heuristic_adherence: neutral(),
            style_match: neutral(),
            rating: String::new(),
            reasoning: String::new(),
        }
    }
}

impl EvaluatorOutput {
    fn scores(&self) -> EvalScores {
        EvalScores {
            values_alignment: self.values_alignment,
            model_usage: self.model_usage,
            heuristic_adherence: self.heuristic_adherence,
            style_match: self.style_match,
        }
        .sanitized()
    }

    fn rating_value(&self) -> RatingValue {
        if self.rating.trim().eq_ignore_ascii_case("good") {
            RatingValue::Good
        } else {
            RatingValue::Bad
        }
    }
}

/// Probe prompts as emitted by the reasoning model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    prompts: Vec<String>,
}

/// Route one evaluated probe. Total over its inputs; first match wins.
///
/// A values violation overrides everything else, then high confidence with a
/// good rating auto-approves, then low confidence flags, and the middle
/// ground goes to the author.
pub fn route_evaluation(
    scores: &EvalScores,
    overall_confidence: f32,
    rating: RatingValue,
    config: &crate::config::RoutingConfig,
) -> Routing {
    if scores.values_alignment < config.values_floor {
        Routing::Flagged
    } else if overall_confidence >= config.auto_approve_min && rating == RatingValue::Good {
        Routing::AutoApproved
    } else if overall_confidence < config.flag_below {
        Routing::Flagged
    } else {
        Routing::AuthorReview
    }
}

fn confidence_label(overall: f32) -> &'static str {
    if overall >= 0.75 {
        "high"
    } else if overall >= 0.5 {
        "medium"
    } else {
        "low"
    }
}

/// The RLAIF evaluation loop.
#[derive(Clone)]
pub struct EvaluationLoop {
    store: Arc<dyn PersonaStore>,
    service: Arc<ReasoningService>,
    candidate: Arc<dyn CandidateModel>,
    classifier: Arc<dyn SectionClassifier>,
    manager: ConstitutionManager,
    notepad: Notepad,
    maturity: MaturityScorer,
    config: RlaifConfig,
}

impl EvaluationLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn PersonaStore>,
        service: Arc<ReasoningService>,
        candidate: Arc<dyn CandidateModel>,
        classifier: Arc<dyn SectionClassifier>,
        manager: ConstitutionManager,
        notepad: Notepad,
        maturity: MaturityScorer,
        config: RlaifConfig,
    ) -> Self {
        Self {
            store,
            service,
            candidate,
            classifier,
            manager,
            notepad,
            maturity,
            config,
        }
    }

    /// Run one evaluation batch for an owner.
    ///
    /// Per-probe candidate or evaluator failures are skipped and logged
    /// rather than aborting the batch. Requires a profile: without ground
    /// truth there is nothing to score against, so the batch is a no-op.
    pub async fn run_batch(&self, owner_id: &str) -> Result<BatchReport> {
        let Some(profile) = self.manager.current(owner_id).await? else {
            info!(owner_id, "No profile yet, skipping evaluation batch");
            return Ok(BatchReport::default());
        };
        let profile_markdown = constitution::ConstitutionRenderer::render_markdown(&profile);
        let summary = self
            .manager
            .summary(owner_id, self.config.extraction.summary_items_per_field)
            .await?;
        let owner_context = prompts::persona_system_prompt(summary.as_deref());

        let prior_evaluations = self.store.evaluations(owner_id).await?.len();
        let prompts = self
            .generate_prompts(owner_id, summary.as_deref(), prior_evaluations)
            .await?;
        let feedback_context = self.feedback_context(owner_id).await?;

        let mut report = BatchReport {
            probes: prompts.len(),
            ..Default::default()
        };

        for prompt in &prompts {
            let response = match self.candidate.respond(&owner_context, prompt).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(owner_id, error = %e, "Candidate call failed, skipping probe");
                    report.skipped += 1;
                    continue;
                }
            };

            let verdict = match self
                .service
                .generate::<EvaluatorOutput>(
                    QualityTier::Quality,
                    &prompts::evaluator_system(),
                    &prompts::evaluator_user(prompt, &response, &profile_markdown, &feedback_context),
                )
                .await
            {
                Ok(structured) => structured.into_inner(),
                Err(e) => {
                    warn!(owner_id, error = %e, "Evaluator call failed, skipping probe");
                    report.skipped += 1;
                    continue;
                }
            };

            let scores = verdict.scores();
            let overall = scores.overall(&self.config.weights);
            let rating = verdict.rating_value();
            let routing = route_evaluation(&scores, overall, rating, &self.config.routing);
            let section = self.classifier.classify(prompt);

            self.apply_outcome(
                owner_id,
                &owner_context,
                prompt,
                &response,
                &verdict.reasoning,
                scores,
                overall,
                rating,
                routing,
                section,
            )
            .await?;

            match routing {
                Routing::AutoApproved => report.auto_approved += 1,
                Routing::AuthorReview => report.author_review += 1,
                Routing::Flagged => report.flagged += 1,
            }
        }

        // Once per batch, not per probe
        self.manager.recompute_gap_scores(owner_id).await?;
        self.maturity.recompute(owner_id).await?;

        info!(
            owner_id,
            probes = report.probes,
            auto_approved = report.auto_approved,
            author_review = report.author_review,
            flagged = report.flagged,
            skipped = report.skipped,
            "Evaluation batch complete"
        );
        Ok(report)
    }

    /// Build the probe prompt list: rotating seed prompts blended with
    /// model-generated prompts biased toward high-gap sections.
    ///
    /// When high-gap sections exist, at least half of the generated slots go
    /// to them; templated section probes top up the count if the model's own
    /// prompts under-serve those sections.
    async fn generate_prompts(
        &self,
        owner_id: &str,
        summary: Option<&str>,
        rotation: usize,
    ) -> Result<Vec<String>> {
        let batch_size = self.config.evaluation.batch_size.max(1);
        let seed_count = self.config.evaluation.seed_prompts.min(batch_size);

        let mut prompts: Vec<String> = (0..seed_count)
            .map(|i| prompts::SEED_PROMPTS[(rotation + i) % prompts::SEED_PROMPTS.len()].to_string())
            .collect();

        let generated_slots = batch_size - prompts.len();
        if generated_slots == 0 {
            return Ok(prompts);
        }

        let gap_scores = self.store.gap_scores(owner_id).await?;
        let high_gap: Vec<ConstitutionSection> = if gap_scores.is_empty() {
            // Never recomputed: every section is unvalidated
            ConstitutionSection::all().to_vec()
        } else {
            gap_scores
                .iter()
                .filter(|g| g.score >= HIGH_GAP_THRESHOLD)
                .map(|g| g.section)
                .collect()
        };

        let generated = match self
            .service
            .generate::<ProbeOutput>(
                QualityTier::Fast,
                &prompts::probe_generation_system(),
                &prompts::probe_generation_user(
                    summary.unwrap_or("(no profile summary available)"),
                    &high_gap,
                    generated_slots,
                ),
            )
            .await
        {
            Ok(structured) => structured.into_inner().prompts,
            Err(e) => {
                warn!(owner_id, error = %e, "Probe generation failed, using templated probes");
                Vec::new()
            }
        };

        if high_gap.is_empty() {
            prompts.extend(generated.into_iter().take(generated_slots));
            return Ok(prompts);
        }

        // Partition model prompts by whether they target a high-gap section,
        // then fill: targeted first, templated probes until the half quota
        // holds, off-target prompts last.
        let quota = generated_slots.div_ceil(2);
        let (mut targeted, off_target): (Vec<String>, Vec<String>) = generated
            .into_iter()
            .take(generated_slots)
            .partition(|p| high_gap.contains(&self.classifier.classify(p)));

        let mut template_idx = 0;
        while targeted.len() < quota && targeted.len() < generated_slots {
            targeted.push(prompts::section_probe(high_gap[template_idx % high_gap.len()]));
            template_idx += 1;
        }
        targeted.truncate(generated_slots);

        let remaining = generated_slots - targeted.len();
        prompts.extend(targeted);
        prompts.extend(off_target.into_iter().take(remaining));
        Ok(prompts)
    }

    /// Recent validated judgments and feedback-derived notes, formatted as
    /// secondary evaluator signal.
    async fn feedback_context(&self, owner_id: &str) -> Result<String> {
        let limit = self.config.evaluation.feedback_context;

        let mut ratings: Vec<SyntheticRating> = self
            .store
            .ratings(owner_id)
            .await?
            .into_iter()
            .filter(|r| r.status == RatingStatus::AuthorValidated)
            .collect();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ratings.truncate(limit);

        let mut out = String::new();
        for rating in ratings {
            out.push_str(&format!(
                "- [{:?}] probe: {} / verdict: {}\n",
                rating.rating,
                truncate(&rating.prompt, 120),
                truncate(&rating.reasoning, 160),
            ));
        }

        let mut calibration: Vec<Note> = self
            .store
            .notes(owner_id)
            .await?
            .into_iter()
            .filter(|n| n.topic.as_deref() == Some("evaluator_calibration"))
            .collect();
        calibration.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        calibration.truncate(limit);
        for note in calibration {
            out.push_str(&format!(
                "- [calibration] {}\n",
                truncate(&note.content, 200)
            ));
        }
        Ok(out)
    }

    /// Persist the side effects of one routed probe.
    #[allow(clippy::too_many_arguments)]
    async fn apply_outcome(
        &self,
        owner_id: &str,
        owner_context: &str,
        prompt: &str,
        response: &str,
        reasoning: &str,
        scores: EvalScores,
        overall: f32,
        rating: RatingValue,
        routing: Routing,
        section: ConstitutionSection,
    ) -> Result<()> {
        let mut review_note_id = None;

        match routing {
            Routing::AutoApproved => {
                let quality = overall.clamp(
                    self.config.evaluation.approved_quality_min,
                    self.config.evaluation.approved_quality_max,
                );
                self.store
                    .insert_training_pair(TrainingPair::new(
                        owner_id,
                        owner_context,
                        prompt,
                        response,
                        quality,
                        PairSource::Rlaif,
                    ))
                    .await?;
            }
            Routing::AuthorReview | Routing::Flagged => {
                let note = Note::new(
                    owner_id,
                    NoteKind::Question,
                    format!(
                        "Review a {} probe result. Probe: {} Evaluator: {}",
                        routing.as_str(),
                        truncate(prompt, 200),
                        truncate(reasoning, 300),
                    ),
                )
                .with_topic("synthetic_review")
                .with_priority(if routing == Routing::Flagged {
                    NotePriority::High
                } else {
                    NotePriority::Medium
                });
                review_note_id = Some(note.id.clone());
                self.notepad.append_notes_best_effort(owner_id, vec![note]).await;

                if routing == Routing::Flagged {
                    // Negative example: the training signal should capture
                    // "don't do this" as well as "do this"
                    self.store
                        .insert_training_pair(TrainingPair::new(
                            owner_id,
                            owner_context,
                            prompt,
                            format!("[Response to avoid] {response}"),
                            self.config.evaluation.negative_quality,
                            PairSource::RlaifNegative,
                        ))
                        .await?;
                }
            }
        }

        let status = if routing == Routing::AutoApproved {
            RatingStatus::AutoApproved
        } else {
            RatingStatus::QueuedReview
        };
        self.store
            .insert_rating(SyntheticRating {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                prompt: prompt.to_string(),
                response: response.to_string(),
                rating,
                confidence_label: confidence_label(overall).to_string(),
                reasoning: reasoning.to_string(),
                status,
                review_note_id,
                created_at: chrono::Utc::now(),
                validated_at: None,
            })
            .await?;

        // The audit record is written for every probe, whatever the outcome
        self.store
            .insert_evaluation(RlaifEvaluation {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                prompt: prompt.to_string(),
                response: response.to_string(),
                section,
                scores,
                overall_confidence: overall,
                rating,
                routing,
                reasoning: reasoning.to_string(),
                created_at: chrono::Utc::now(),
            })
            .await?;
        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::manager::OwnerLocks;
    use crate::store::MemoryStore;
    use constitution::KeywordClassifier;
    use persona_agent::{MockBackend, MockCandidate};

    fn scores(values: f32) -> EvalScores {
        EvalScores {
            values_alignment: values,
            ..Default::default()
        }
    }

    #[test]
    fn test_values_floor_overrides_everything() {
        let routing = route_evaluation(
            &scores(0.2),
            0.95,
            RatingValue::Good,
            &RoutingConfig::default(),
        );
        assert_eq!(routing, Routing::Flagged);
    }

    #[test]
    fn test_high_confidence_good_auto_approves() {
        let routing = route_evaluation(
            &scores(0.9),
            0.9,
            RatingValue::Good,
            &RoutingConfig::default(),
        );
        assert_eq!(routing, Routing::AutoApproved);
    }

    #[test]
    fn test_high_confidence_bad_rating_goes_to_review() {
        let routing = route_evaluation(
            &scores(0.9),
            0.9,
            RatingValue::Bad,
            &RoutingConfig::default(),
        );
        assert_eq!(routing, Routing::AuthorReview);
    }

    #[test]
    fn test_low_confidence_flags() {
        let routing = route_evaluation(
            &scores(0.6),
            0.3,
            RatingValue::Good,
            &RoutingConfig::default(),
        );
        assert_eq!(routing, Routing::Flagged);
    }

    #[test]
    fn test_middle_ground_goes_to_review() {
        let routing = route_evaluation(
            &scores(0.6),
            0.5,
            RatingValue::Good,
            &RoutingConfig::default(),
        );
        assert_eq!(routing, Routing::AuthorReview);
    }

    #[test]
    fn test_routing_is_total() {
        let config = RoutingConfig::default();
        for values in [0.0, 0.2, 0.35, 0.5, 0.88, 1.0] {
            for overall in [0.0, 0.44, 0.45, 0.87, 0.88, 1.0] {
                for rating in [RatingValue::Good, RatingValue::Bad] {
                    // Must not panic; exactly one branch always matches
                    let _ = route_evaluation(&scores(values), overall, rating, &config);
                }
            }
        }
    }

    #[test]
    fn test_evaluator_defaults_are_neutral() {
        let verdict = EvaluatorOutput::default();
        let scores = verdict.scores();
        assert_eq!(scores.values_alignment, 0.5);
        // Missing rating can never auto-approve
        assert_eq!(verdict.rating_value(), RatingValue::Bad);
    }

    #[test]
    fn test_confidence_labels() {
        assert_eq!(confidence_label(0.9), "high");
        assert_eq!(confidence_label(0.6), "medium");
        assert_eq!(confidence_label(0.2), "low");
    }

    fn loop_over(store: Arc<MemoryStore>) -> EvaluationLoop {
        let config = RlaifConfig::default();
        let manager = ConstitutionManager::new(store.clone(), Arc::new(OwnerLocks::new()));
        let notepad = Notepad::new(store.clone(), config.notepad.clone());
        let maturity = MaturityScorer::new(store.clone());
        EvaluationLoop::new(
            store,
            Arc::new(ReasoningService::single(Arc::new(MockBackend::default()))),
            Arc::new(MockCandidate::new("unused")),
            Arc::new(KeywordClassifier::new()),
            manager,
            notepad,
            maturity,
            config,
        )
    }

    fn rating(status: RatingStatus, prompt: &str) -> SyntheticRating {
        SyntheticRating {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: "owner-1".to_string(),
            prompt: prompt.to_string(),
            response: "r".to_string(),
            rating: RatingValue::Good,
            confidence_label: "medium".to_string(),
            reasoning: "matched their register".to_string(),
            status,
            review_note_id: None,
            created_at: chrono::Utc::now(),
            validated_at: None,
        }
    }

    #[tokio::test]
    async fn test_feedback_context_includes_ratings_and_calibration_notes() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_rating(rating(RatingStatus::AuthorValidated, "validated probe"))
            .await
            .unwrap();
        store
            .insert_rating(rating(RatingStatus::QueuedReview, "still queued probe"))
            .await
            .unwrap();
        store
            .insert_notes(vec![
                Note::new("owner-1", NoteKind::Observation, "author disagreed with a Good rating")
                    .with_topic("evaluator_calibration"),
                Note::new("owner-1", NoteKind::Observation, "unrelated observation"),
            ])
            .await
            .unwrap();

        let context = loop_over(store)
            .feedback_context("owner-1")
            .await
            .unwrap();

        assert!(context.contains("validated probe"));
        assert!(context.contains("author disagreed with a Good rating"));
        // Unvalidated ratings and unrelated notes stay out of the signal
        assert!(!context.contains("still queued probe"));
        assert!(!context.contains("unrelated observation"));
    }
}
