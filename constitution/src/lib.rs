//! Persona constitution: a versioned five-section profile of one person.
//!
//! This crate holds the document model and all pure logic over it:
//!
//! - [`ConstitutionDocument`]: one immutable version of the profile
//! - [`merge_sections`]: deep-copy-then-merge delta application
//! - [`ConstitutionRenderer`]: markdown export and bounded prompt summaries
//! - [`SectionClassifier`]: pluggable probe-to-section assignment
//! - [`GapScore`]: per-section missing-evidence measure
//!
//! Versioning rules: versions are immutable once created, "current" always
//! points at the highest version number, and a new version is only created
//! when a merge actually changes content. Persistence and per-owner
//! serialization live in the pipeline crate; nothing here does I/O.
//!
//! # Example
//!
//! ```
//! use constitution::{merge_sections, ConstitutionDocument, ConstitutionSection,
//!     ConstitutionSections, SectionDelta};
//!
//! let base = ConstitutionSections::default();
//! let delta = SectionDelta::for_section(ConstitutionSection::Values)
//!     .with_items("values", vec!["directness".to_string()]);
//!
//! let (merged, changed) = merge_sections(&base, &[delta]);
//! assert!(changed);
//!
//! let v1 = ConstitutionDocument::new("owner-1", 1, merged);
//! assert_eq!(v1.version, 1);
//! ```

pub mod classifier;
pub mod gap;
pub mod merge;
pub mod render;
pub mod types;

// Re-export main types
pub use classifier::{KeywordClassifier, SectionClassifier};
pub use gap::{gap_ratio, priority_for, GapPriority, GapScore, HIGH_GAP_THRESHOLD};
pub use merge::{merge_sections, SectionDelta};
pub use render::ConstitutionRenderer;
pub use types::{
    hash_sections, ConstitutionDocument, ConstitutionSection, ConstitutionSections, SectionContent,
};
