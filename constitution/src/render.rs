//! Rendering the constitution to flat text.
//!
//! The rendered form is an export-only view: a pure function of the sections
//! struct with no round-trip requirement. It is used both for human-readable
//! export and as the profile summary handed to the reasoning and candidate
//! models.

use crate::types::{ConstitutionDocument, ConstitutionSection, SectionContent};

/// Renders constitution documents to markdown-like text.
pub struct ConstitutionRenderer;

impl ConstitutionRenderer {
    /// Render the full document for export.
    pub fn render_markdown(doc: &ConstitutionDocument) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "# Constitution (v{})\n\nOwner: {}\nCreated: {}\nContent hash: {}\n",
            doc.version,
            doc.owner_id,
            doc.created_at.to_rfc3339(),
            doc.content_hash
        ));

        for section in ConstitutionSection::all() {
            let content = doc.sections.section(section);
            out.push_str(&format!("\n## {}\n", section.heading()));

            if content.is_empty() {
                out.push_str("\n_No validated evidence yet._\n");
                continue;
            }

            Self::render_section(&mut out, content);
        }

        out
    }

    /// Render a bounded summary for prompt context.
    ///
    /// Keeps the most recent items per list field so the summary stays inside
    /// a context budget regardless of how large the constitution grows.
    pub fn render_summary(doc: &ConstitutionDocument, items_per_field: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("CONSTITUTION v{} of this person:\n", doc.version));

        for section in ConstitutionSection::all() {
            let content = doc.sections.section(section);
            if content.is_empty() {
                continue;
            }

            out.push_str(&format!("\n[{}]\n", section.heading()));
            for field in SectionContent::LIST_FIELDS {
                let Some(items) = content.list_field(field) else {
                    continue;
                };
                if items.is_empty() {
                    continue;
                }
                let start = items.len().saturating_sub(items_per_field);
                for item in &items[start..] {
                    out.push_str(&format!("- {field}: {item}\n"));
                }
            }
            if !content.self_concept.is_empty() {
                out.push_str(&format!("self-concept: {}\n", content.self_concept));
            }
        }

        out
    }

    fn render_section(out: &mut String, content: &SectionContent) {
        for field in SectionContent::LIST_FIELDS {
            let Some(items) = content.list_field(field) else {
                continue;
            };
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("\n### {}\n\n", field.replace('_', " ")));
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        }
        if !content.self_concept.is_empty() {
            out.push_str(&format!("\n### self concept\n\n{}\n", content.self_concept));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConstitutionSections;

    fn sample_doc() -> ConstitutionDocument {
        let mut sections = ConstitutionSections::default();
        sections.values.values.push("clarity over cleverness".to_string());
        sections
            .models
            .mental_models
            .push("inversion: ask what would guarantee failure".to_string());
        sections.identity.self_concept = "A careful builder.".to_string();
        ConstitutionDocument::new("owner-1", 3, sections)
    }

    #[test]
    fn test_render_markdown_contains_all_sections() {
        let doc = sample_doc();
        let text = ConstitutionRenderer::render_markdown(&doc);

        assert!(text.contains("# Constitution (v3)"));
        for section in ConstitutionSection::all() {
            assert!(text.contains(section.heading()));
        }
        assert!(text.contains("clarity over cleverness"));
        assert!(text.contains("No validated evidence yet"));
    }

    #[test]
    fn test_render_is_pure() {
        let doc = sample_doc();
        assert_eq!(
            ConstitutionRenderer::render_markdown(&doc),
            ConstitutionRenderer::render_markdown(&doc)
        );
    }

    #[test]
    fn test_summary_bounds_items() {
        let mut sections = ConstitutionSections::default();
        for i in 0..20 {
            sections.values.values.push(format!("value-{i}"));
        }
        let doc = ConstitutionDocument::new("owner-1", 1, sections);

        let summary = ConstitutionRenderer::render_summary(&doc, 3);
        assert!(summary.contains("value-19"));
        assert!(!summary.contains("value-0\n"));
    }
}
