//! Core types for the persona constitution.
//!
//! The constitution is a five-section structured profile of a single person,
//! built as a chain of immutable versions. A version is never edited in
//! place; a new one is created by merging a delta into a deep copy of the
//! prior version's sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five sections of a constitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConstitutionSection {
    /// How the person sees the world: beliefs, epistemics, meaning
    Worldview,
    /// What they care about and refuse to compromise on
    Values,
    /// Mental models and decision frameworks they actually use
    Models,
    /// Self-concept, roles, how they describe themselves
    Identity,
    /// Contradictions, blind spots, tensions they carry
    Shadows,
}

impl ConstitutionSection {
    /// Get string representation for prompts and storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worldview => "worldview",
            Self::Values => "values",
            Self::Models => "models",
            Self::Identity => "identity",
            Self::Shadows => "shadows",
        }
    }

    /// Human-readable heading for rendered output.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Worldview => "Worldview",
            Self::Values => "Values",
            Self::Models => "Mental Models",
            Self::Identity => "Identity",
            Self::Shadows => "Shadows & Contradictions",
        }
    }

    /// All sections in canonical order.
    pub fn all() -> [Self; 5] {
        [
            Self::Worldview,
            Self::Values,
            Self::Models,
            Self::Identity,
            Self::Shadows,
        ]
    }

    /// Parse a section name as emitted by the reasoning model.
    ///
    /// Returns `None` for names outside the schema; callers ignore those
    /// deltas rather than erroring.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "worldview" => Some(Self::Worldview),
            "values" => Some(Self::Values),
            "models" | "mental_models" => Some(Self::Models),
            "identity" => Some(Self::Identity),
            "shadows" | "contradictions" => Some(Self::Shadows),
            _ => None,
        }
    }
}

/// Content of one constitution section.
///
/// Typed lists accumulate across versions; `self_concept` is free text that
/// grows by blank-line concatenation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    /// Stated values and priorities
    #[serde(default)]
    pub values: Vec<String>,
    /// Beliefs about the world
    #[serde(default)]
    pub beliefs: Vec<String>,
    /// Mental models and frameworks
    #[serde(default)]
    pub mental_models: Vec<String>,
    /// Recurring decision patterns and heuristics
    #[serde(default)]
    pub decision_patterns: Vec<String>,
    /// Boundaries the person holds
    #[serde(default)]
    pub boundaries: Vec<String>,
    /// Observed contradictions and tensions
    #[serde(default)]
    pub contradictions: Vec<String>,
    /// Free-text self description
    #[serde(default)]
    pub self_concept: String,
}

impl SectionContent {
    /// List field names that accept appended items.
    pub const LIST_FIELDS: [&'static str; 6] = [
        "values",
        "beliefs",
        "mental_models",
        "decision_patterns",
        "boundaries",
        "contradictions",
    ];

    /// Total number of list items across all fields.
    pub fn item_count(&self) -> usize {
        self.values.len()
            + self.beliefs.len()
            + self.mental_models.len()
            + self.decision_patterns.len()
            + self.boundaries.len()
            + self.contradictions.len()
    }

    /// Whether this section holds any content at all.
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0 && self.self_concept.is_empty()
    }

    /// Mutable access to a list field by schema name.
    pub fn list_field_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "values" => Some(&mut self.values),
            "beliefs" => Some(&mut self.beliefs),
            "mental_models" => Some(&mut self.mental_models),
            "decision_patterns" => Some(&mut self.decision_patterns),
            "boundaries" => Some(&mut self.boundaries),
            "contradictions" => Some(&mut self.contradictions),
            _ => None,
        }
    }

    /// Shared access to a list field by schema name.
    pub fn list_field(&self, name: &str) -> Option<&Vec<String>> {
        match name {
            "values" => Some(&self.values),
            "beliefs" => Some(&self.beliefs),
            "mental_models" => Some(&self.mental_models),
            "decision_patterns" => Some(&self.decision_patterns),
            "boundaries" => Some(&self.boundaries),
            "contradictions" => Some(&self.contradictions),
            _ => None,
        }
    }
}

/// All five sections of a constitution version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionSections {
    pub worldview: SectionContent,
    pub values: SectionContent,
    pub models: SectionContent,
    pub identity: SectionContent,
    pub shadows: SectionContent,
}

impl ConstitutionSections {
    /// Shared access to one section.
    pub fn section(&self, section: ConstitutionSection) -> &SectionContent {
        match section {
            ConstitutionSection::Worldview => &self.worldview,
            ConstitutionSection::Values => &self.values,
            ConstitutionSection::Models => &self.models,
            ConstitutionSection::Identity => &self.identity,
            ConstitutionSection::Shadows => &self.shadows,
        }
    }

    /// Mutable access to one section.
    pub fn section_mut(&mut self, section: ConstitutionSection) -> &mut SectionContent {
        match section {
            ConstitutionSection::Worldview => &mut self.worldview,
            ConstitutionSection::Values => &mut self.values,
            ConstitutionSection::Models => &mut self.models,
            ConstitutionSection::Identity => &mut self.identity,
            ConstitutionSection::Shadows => &mut self.shadows,
        }
    }

    /// Total list items across every section.
    pub fn item_count(&self) -> usize {
        ConstitutionSection::all()
            .iter()
            .map(|s| self.section(*s).item_count())
            .sum()
    }
}

/// One immutable constitution version.
///
/// "Current" always points at the highest version number for an owner; the
/// store enforces that with a compare-and-set on the expected version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstitutionDocument {
    /// Unique identifier
    pub id: String,
    /// Owner this constitution describes
    pub owner_id: String,
    /// Monotonic version number, starting at 1
    pub version: u32,
    /// The five sections
    pub sections: ConstitutionSections,
    /// SHA-256 over the canonical JSON of the sections, for audit
    pub content_hash: String,
    /// When the version was created
    pub created_at: DateTime<Utc>,
}

impl ConstitutionDocument {
    /// Create a new version from merged sections.
    pub fn new(owner_id: impl Into<String>, version: u32, sections: ConstitutionSections) -> Self {
        let content_hash = hash_sections(&sections);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            version,
            sections,
            content_hash,
            created_at: Utc::now(),
        }
    }
}

/// Compute the deterministic content hash of a sections struct.
///
/// serde_json serializes struct fields in declaration order, so the encoding
/// is stable across runs.
pub fn hash_sections(sections: &ConstitutionSections) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let canonical = serde_json::to_string(sections).unwrap_or_default();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_parse() {
        assert_eq!(
            ConstitutionSection::parse("Worldview"),
            Some(ConstitutionSection::Worldview)
        );
        assert_eq!(
            ConstitutionSection::parse("mental_models"),
            Some(ConstitutionSection::Models)
        );
        assert_eq!(ConstitutionSection::parse("finances"), None);
    }

    #[test]
    fn test_content_hash_deterministic() {
        let mut sections = ConstitutionSections::default();
        sections.values.values.push("honesty over comfort".to_string());

        let a = hash_sections(&sections);
        let b = hash_sections(&sections.clone());
        assert_eq!(a, b);

        sections.values.values.push("curiosity".to_string());
        assert_ne!(a, hash_sections(&sections));
    }

    #[test]
    fn test_item_count() {
        let mut sections = ConstitutionSections::default();
        sections
            .worldview
            .beliefs
            .push("systems outlive intentions".to_string());
        sections
            .shadows
            .contradictions
            .push("values rest, never rests".to_string());
        assert_eq!(sections.item_count(), 2);
        assert!(sections.identity.is_empty());
    }
}
