//! Prompt construction for extraction, evaluation, and probe generation.
//!
//! All prompts are plain functions over already-bounded context strings; the
//! callers own truncation. Responses are requested as JSON matching the
//! caller's output struct, and the structured parser absorbs deviations.

use constitution::ConstitutionSection;

/// Fixed corpus of identity-probing seed prompts. Batches draw a rotating
/// slice so repeated runs exercise different ground.
pub const SEED_PROMPTS: &[&str] = &[
    "What matters most to you when you have to choose between being kind and being honest?",
    "Describe a belief you held strongly five years ago that you no longer hold.",
    "When you face a decision with incomplete information, what do you do first?",
    "What would your closest friend say is your most defining trait?",
    "Tell me about a rule you follow even when nobody is watching.",
    "What kind of criticism is hardest for you to hear, and why?",
    "When do you find it acceptable to break a commitment?",
    "How do you decide whether a risk is worth taking?",
    "What do you do when someone you respect disagrees with you strongly?",
    "Describe something you avoid thinking about.",
    "What does a wasted day look like for you?",
    "When you explain something complicated, how do you usually approach it?",
    "What trade-off do you make more often than you'd like to admit?",
    "How do you behave when you are certain you are right but outnumbered?",
    "What line would you never cross for money?",
    "When you catch yourself contradicting your own values, what happens next?",
];

/// Templated probe targeting one section directly. Used to top up batches
/// when model-generated probes under-serve high-gap sections.
pub fn section_probe(section: ConstitutionSection) -> String {
    match section {
        ConstitutionSection::Worldview => {
            "How do you think the world fundamentally works? What forces shape what happens to people?".to_string()
        }
        ConstitutionSection::Values => {
            "Rank the three principles you refuse to compromise on, and describe a time each was tested.".to_string()
        }
        ConstitutionSection::Models => {
            "Walk me through exactly how you'd decide between two job offers. What's your actual process?".to_string()
        }
        ConstitutionSection::Identity => {
            "How would you describe who you are to someone who will work closely with you for a year?".to_string()
        }
        ConstitutionSection::Shadows => {
            "What topics make you defensive, and what does your defensiveness usually look like?".to_string()
        }
    }
}

/// System prompt a candidate model impersonates the owner with.
pub fn persona_system_prompt(constitution_summary: Option<&str>) -> String {
    match constitution_summary {
        Some(summary) => format!(
            "You are answering as a specific person, staying faithful to their \
             documented worldview, values, mental models, identity, and known \
             blind spots. Do not break character or mention this document.\n\n\
             # Person profile\n\n{summary}"
        ),
        None => "You are answering as a specific person whose profile is still being \
                 built. Answer naturally and consistently; avoid claiming specific \
                 biographical facts."
            .to_string(),
    }
}

/// System prompt for extracting constitution deltas from a submitted entry.
pub fn extraction_system() -> String {
    "You analyze text a person wrote about themselves and extract durable \
     personality evidence. You are conservative: extract only what the text \
     supports, phrased as short declarative items. Sections: worldview (beliefs \
     about how the world works), values (principles and boundaries), models \
     (decision patterns and mental models), identity (self-concept), shadows \
     (contradictions and blind spots).\n\n\
     Respond with JSON: {\"deltas\": [{\"section\": \"values\", \"additions\": \
     {\"values\": [\"...\"], \"boundaries\": [\"...\"]}}], \"training_pairs\": \
     [{\"user\": \"a question this text answers\", \"assistant\": \"how they \
     would answer, in their voice\", \"quality\": 0.7}], \"notes\": \
     [{\"kind\": \"observation|gap|mental_model|question\", \"content\": \"...\", \
     \"topic\": \"...\", \"priority\": \"high|medium|low\", \"critical\": false}], \
     \"scratchpad\": \"working thoughts to carry into the next cycle\", \
     \"ready_for_training\": false}"
        .to_string()
}

/// User message for batch extraction of one entry.
pub fn extraction_user(
    entry_excerpt: &str,
    constitution_summary: Option<&str>,
    notepad_summary: &str,
    scratchpad_tail: &str,
) -> String {
    let mut prompt = String::new();
    if let Some(summary) = constitution_summary {
        prompt.push_str("# Current profile (summary)\n\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }
    if !notepad_summary.is_empty() {
        prompt.push_str("# Open notes\n\n");
        prompt.push_str(notepad_summary);
        prompt.push_str("\n\n");
    }
    if !scratchpad_tail.is_empty() {
        prompt.push_str("# Your prior working notes\n\n");
        prompt.push_str(scratchpad_tail);
        prompt.push_str("\n\n");
    }
    prompt.push_str("# New entry to analyze\n\n");
    prompt.push_str(entry_excerpt);
    prompt
}

/// System prompt for the interactive conversational mode.
pub fn converse_system() -> String {
    "You are interviewing a person to understand who they are. Ask one \
     thoughtful follow-up at a time, grounded in what they just said and in \
     the open questions on file. Alongside the reply, extract any durable \
     personality evidence their message revealed.\n\n\
     Respond with JSON: {\"reply\": \"your next message to them\", \"deltas\": \
     [...], \"notes\": [...], \"scratchpad\": \"...\"} using the same delta and \
     note shapes as batch analysis."
        .to_string()
}

/// User message for one conversational turn, with recent-entry continuity.
pub fn converse_user(
    message: &str,
    recent_entries: &[String],
    constitution_summary: Option<&str>,
    notepad_summary: &str,
) -> String {
    let mut prompt = String::new();
    if let Some(summary) = constitution_summary {
        prompt.push_str("# Current profile (summary)\n\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }
    if !notepad_summary.is_empty() {
        prompt.push_str("# Open questions and notes\n\n");
        prompt.push_str(notepad_summary);
        prompt.push_str("\n\n");
    }
    if !recent_entries.is_empty() {
        prompt.push_str("# Recent things they've shared\n\n");
        for entry in recent_entries {
            prompt.push_str("- ");
            prompt.push_str(entry);
            prompt.push('\n');
        }
        prompt.push_str("\n\n");
    }
    prompt.push_str("# Their message\n\n");
    prompt.push_str(message);
    prompt
}

/// System prompt for scoring a candidate response against the profile.
pub fn evaluator_system() -> String {
    "You judge whether a response sounds like it came from a specific \
     documented person. Score four dimensions in [0, 1]: values_alignment \
     (consistent with their stated values and boundaries), model_usage \
     (reasons the way they reason), heuristic_adherence (follows their \
     decision patterns), style_match (voice and register). Then give an \
     overall verdict.\n\n\
     Respond with JSON: {\"values_alignment\": 0.0, \"model_usage\": 0.0, \
     \"heuristic_adherence\": 0.0, \"style_match\": 0.0, \"rating\": \
     \"good|bad\", \"reasoning\": \"one short paragraph\"}"
        .to_string()
}

/// User message for one evaluation.
pub fn evaluator_user(
    probe: &str,
    response: &str,
    constitution_markdown: &str,
    feedback_context: &str,
) -> String {
    let mut prompt = format!("# Person profile\n\n{constitution_markdown}\n\n");
    if !feedback_context.is_empty() {
        prompt.push_str("# Recent validated judgments (secondary signal)\n\n");
        prompt.push_str(feedback_context);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "# Probe\n\n{probe}\n\n# Candidate response\n\n{response}"
    ));
    prompt
}

/// System prompt for generating gap-targeted probe prompts.
pub fn probe_generation_system() -> String {
    "You design interview questions that surface evidence for under-documented \
     parts of a personality profile. Questions must be open-ended, specific, \
     and answerable in a paragraph.\n\n\
     Respond with JSON: {\"prompts\": [\"...\", \"...\"]}"
        .to_string()
}

/// User message for probe generation, naming the high-gap sections.
pub fn probe_generation_user(
    constitution_summary: &str,
    high_gap_sections: &[ConstitutionSection],
    count: usize,
) -> String {
    let targets: Vec<&str> = high_gap_sections.iter().map(|s| s.as_str()).collect();
    format!(
        "# Current profile (summary)\n\n{constitution_summary}\n\n\
         Generate {count} probing questions. Prioritize these under-documented \
         sections: {}.",
        targets.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_corpus_is_nonempty_and_distinct() {
        assert!(SEED_PROMPTS.len() >= 8);
        let mut seen = std::collections::HashSet::new();
        for prompt in SEED_PROMPTS {
            assert!(seen.insert(prompt), "duplicate seed prompt: {prompt}");
        }
    }

    #[test]
    fn test_section_probe_covers_all_sections() {
        for section in ConstitutionSection::all() {
            assert!(!section_probe(section).is_empty());
        }
    }

    #[test]
    fn test_extraction_user_orders_context_before_entry() {
        let prompt = extraction_user("the entry text", Some("profile summary"), "- note", "prior");
        let entry_pos = prompt.find("the entry text").unwrap();
        assert!(prompt.find("profile summary").unwrap() < entry_pos);
        assert!(prompt.find("prior").unwrap() < entry_pos);
    }

    #[test]
    fn test_persona_prompt_without_profile() {
        let prompt = persona_system_prompt(None);
        assert!(prompt.contains("still being"));
    }
}
