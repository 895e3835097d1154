//! Delta merging for constitution versions.
//!
//! A delta is a structured set of additions the extraction engine pulled out
//! of one entry. Merging never mutates the prior version: callers hand in a
//! deep copy and get back the merged sections plus a flag saying whether
//! anything actually changed, so an empty delta can be turned into a no-op
//! instead of a spurious version.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{ConstitutionSection, ConstitutionSections};

/// Additions to one section, as emitted by the reasoning model.
///
/// `section` is kept as a raw string so that out-of-schema section names can
/// be ignored instead of failing deserialization. `additions` maps field
/// names to either an array of strings (list fields) or a string
/// (`self_concept`, or a single-item list addition).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionDelta {
    /// Target section name ("worldview", "values", ...)
    #[serde(default)]
    pub section: String,
    /// Field name -> additions
    #[serde(default)]
    pub additions: serde_json::Map<String, Value>,
}

impl SectionDelta {
    /// Create a delta for a known section.
    pub fn for_section(section: ConstitutionSection) -> Self {
        Self {
            section: section.as_str().to_string(),
            additions: serde_json::Map::new(),
        }
    }

    /// Builder: append items to a list field.
    pub fn with_items(mut self, field: &str, items: Vec<String>) -> Self {
        self.additions
            .insert(field.to_string(), Value::Array(items.into_iter().map(Value::String).collect()));
        self
    }

    /// Builder: set free text for `self_concept`.
    pub fn with_self_concept(mut self, text: impl Into<String>) -> Self {
        self.additions
            .insert("self_concept".to_string(), Value::String(text.into()));
        self
    }
}

/// Merge a batch of deltas into a copy of the given sections.
///
/// Policy, per schema:
/// - list-valued fields append; duplicates of items already present are
///   skipped so re-driven entries stay convergent
/// - `self_concept` concatenates with a blank-line separator
/// - unknown sections and unknown fields are ignored with a debug log
///
/// Returns the merged sections and whether any content changed. Merging
/// `[A]` then `[B]` yields the same list contents as merging `[A, B]` once.
pub fn merge_sections(
    base: &ConstitutionSections,
    deltas: &[SectionDelta],
) -> (ConstitutionSections, bool) {
    let mut merged = base.clone();
    let mut changed = false;

    for delta in deltas {
        let Some(section) = ConstitutionSection::parse(&delta.section) else {
            debug!(section = %delta.section, "Ignoring delta for unknown section");
            continue;
        };
        let content = merged.section_mut(section);

        for (field, value) in &delta.additions {
            if field == "self_concept" {
                if let Some(text) = value.as_str() {
                    let text = text.trim();
                    if !text.is_empty() {
                        if !content.self_concept.is_empty() {
                            content.self_concept.push_str("\n\n");
                        }
                        content.self_concept.push_str(text);
                        changed = true;
                    }
                }
                continue;
            }

            let Some(list) = content.list_field_mut(field) else {
                debug!(section = %delta.section, field = %field, "Ignoring unknown delta field");
                continue;
            };

            for item in iter_string_items(value) {
                let item = item.trim();
                if item.is_empty() || list.iter().any(|existing| existing == item) {
                    continue;
                }
                list.push(item.to_string());
                changed = true;
            }
        }
    }

    (merged, changed)
}

/// Extract string items from a JSON value that may be a string or an array.
fn iter_string_items(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    }
}
