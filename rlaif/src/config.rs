//! Configuration for the persona pipeline.
//!
//! Routing thresholds and the confidence weight vector are policy, not law:
//! the defaults reproduce the shipped constants, but operators can tune them
//! from a YAML file without touching code.

use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlaifConfig {
    /// Routing thresholds
    pub routing: RoutingConfig,
    /// Confidence weight vector
    pub weights: ConfidenceWeights,
    /// Extraction engine settings
    pub extraction: ExtractionConfig,
    /// Notepad settings
    pub notepad: NotepadConfig,
    /// Evaluation loop settings
    pub evaluation: EvaluationConfig,
}

impl Default for RlaifConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            weights: ConfidenceWeights::default(),
            extraction: ExtractionConfig::default(),
            notepad: NotepadConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl RlaifConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Thresholds for the three-way routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Values alignment below this flags the probe outright
    pub values_floor: f32,
    /// Overall confidence at or above this (with a good rating) auto-approves
    pub auto_approve_min: f32,
    /// Overall confidence below this flags the probe
    pub flag_below: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            values_floor: 0.35,
            auto_approve_min: 0.88,
            flag_below: 0.45,
        }
    }
}

/// Weights for combining the four evaluation sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub values: f32,
    pub models: f32,
    pub heuristics: f32,
    pub style: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            values: 0.35,
            models: 0.20,
            heuristics: 0.20,
            style: 0.25,
        }
    }
}

/// Extraction engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Entry text sent to the reasoning service is capped at this length;
    /// persisted entries are never truncated
    pub entry_excerpt_chars: usize,
    /// Prior entries included for continuity in conversational mode
    pub context_entries: usize,
    /// Most recent / most important notes included in prompt context
    pub context_notes: usize,
    /// Items per list field in the constitution summary
    pub summary_items_per_field: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            entry_excerpt_chars: 8_000,
            context_entries: 5,
            context_notes: 12,
            summary_items_per_field: 8,
        }
    }
}

/// Notepad settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotepadConfig {
    /// Scratchpad keeps only this many trailing characters
    pub scratchpad_window_chars: usize,
}

impl Default for NotepadConfig {
    fn default() -> Self {
        Self {
            scratchpad_window_chars: 50_000,
        }
    }
}

/// Evaluation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Seed prompts drawn from the fixed corpus per batch
    pub seed_prompts: usize,
    /// Total probes per batch
    pub batch_size: usize,
    /// Quality clamp for auto-approved training pairs
    pub approved_quality_min: f32,
    pub approved_quality_max: f32,
    /// Quality score for negative ("don't do this") pairs
    pub negative_quality: f32,
    /// Quality score for pairs created from explicit positive feedback
    pub feedback_quality: f32,
    /// Recent feedback items included as secondary evaluation signal
    pub feedback_context: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed_prompts: 4,
            batch_size: 8,
            approved_quality_min: 0.65,
            approved_quality_max: 0.92,
            negative_quality: 0.2,
            feedback_quality: 0.8,
            feedback_context: 6,
        }
    }
}
