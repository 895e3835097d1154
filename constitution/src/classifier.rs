//! Section classification for synthetic probes.
//!
//! The evaluation loop buckets every probe under one constitution section so
//! gap scores can be recomputed per section. Classification is deliberately
//! cheap and deterministic; it drives gap bucketing, not correctness grading.
//! The trait boundary exists so a learned classifier can replace the keyword
//! one without touching routing logic.

use crate::types::ConstitutionSection;

/// Assigns a constitution section to a piece of text.
pub trait SectionClassifier: Send + Sync {
    /// Classify the text into exactly one section.
    fn classify(&self, text: &str) -> ConstitutionSection;
}

/// Keyword-weighted classifier.
///
/// Scores each section by weighted keyword hits and picks the highest;
/// ties break in canonical section order and zero hits default to
/// `Identity`.
pub struct KeywordClassifier {
    rules: Vec<(ConstitutionSection, Vec<(&'static str, u32)>)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                (
                    ConstitutionSection::Worldview,
                    vec![
                        ("believe", 2),
                        ("belief", 2),
                        ("truth", 2),
                        ("world", 1),
                        ("society", 1),
                        ("meaning", 2),
                        ("philosophy", 2),
                        ("religion", 1),
                        ("politic", 1),
                    ],
                ),
                (
                    ConstitutionSection::Values,
                    vec![
                        ("value", 3),
                        ("principle", 2),
                        ("important", 1),
                        ("care about", 2),
                        ("matter", 1),
                        ("ethic", 2),
                        ("integrity", 2),
                        ("priorit", 2),
                    ],
                ),
                (
                    ConstitutionSection::Models,
                    vec![
                        ("decide", 2),
                        ("decision", 2),
                        ("framework", 2),
                        ("mental model", 3),
                        ("approach", 1),
                        ("strategy", 1),
                        ("heuristic", 3),
                        ("tradeoff", 2),
                        ("think through", 2),
                    ],
                ),
                (
                    ConstitutionSection::Shadows,
                    vec![
                        ("contradiction", 3),
                        ("struggle", 2),
                        ("fear", 2),
                        ("avoid", 1),
                        ("weakness", 2),
                        ("tension", 2),
                        ("regret", 2),
                        ("blind spot", 3),
                    ],
                ),
                (
                    ConstitutionSection::Identity,
                    vec![
                        ("identity", 3),
                        ("who you are", 3),
                        ("who i am", 3),
                        ("yourself", 2),
                        ("describe you", 2),
                        ("role", 1),
                    ],
                ),
            ],
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ConstitutionSection {
        let lower = text.to_lowercase();

        let mut best = ConstitutionSection::Identity;
        let mut best_score = 0u32;

        // Canonical section order plus strict > keeps ties deterministic.
        for section in ConstitutionSection::all() {
            let Some((_, keywords)) = self.rules.iter().find(|(s, _)| *s == section) else {
                continue;
            };
            let score: u32 = keywords
                .iter()
                .map(|(kw, weight)| lower.matches(kw).count() as u32 * weight)
                .sum();
            if score > best_score {
                best = section;
                best_score = score;
            }
        }

        best
    }
}
