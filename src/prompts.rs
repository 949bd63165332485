//! Prompts for specification generation.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the document structure the
//!    model is asked for (adding a section, tightening a rule) requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, making prompt regressions easy to catch.
//!
//! Callers can override the system prompt via
//! [`crate::config::PipelineConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

use crate::record::NormalizedDocument;

/// Default system prompt for the completion call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert technical writer. You turn source \
documents into clear, complete technical specification documents in Markdown. You write only \
the specification — no commentary, no preamble, no closing remarks.";

/// Delimiter line fencing the document content inside the user prompt, so
/// the model can tell instructions from material.
pub const CONTENT_DELIMITER: &str = "----------------------------------------";

/// Build the single user prompt for a normalised document.
///
/// The fixed instructional template asks for four top-level sections and
/// embeds the source verbatim between delimiter lines, together with the
/// file's identity so the model can reference it.
pub fn build_user_prompt(document: &NormalizedDocument) -> String {
    format!(
        r#"Analyze the following document and produce a technical specification for what it describes.

Structure the specification exactly as:

1. # Overview — what the system or feature is and who it is for
2. # Requirements — functional and non-functional requirements as itemised lists
3. # Technical Details — architecture, data, interfaces, constraints
4. # Additional Sections — anything else the document implies (risks, open questions, milestones)

Source file: {key}
File type: {kind}
Content length: {length} characters

Document content:
{delim}
{text}
{delim}

Respond with the Markdown specification only."#,
        key = document.key,
        kind = document.kind,
        length = document.text.chars().count(),
        delim = CONTENT_DELIMITER,
        text = document.text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileKind;
    use chrono::Utc;

    fn doc(text: &str) -> NormalizedDocument {
        NormalizedDocument {
            key: "uploads/spec.txt".into(),
            bucket: "uploads".into(),
            size: text.len() as u64,
            arrived_at: Utc::now(),
            etag: "etag".into(),
            text: text.into(),
            kind: FileKind::Txt,
        }
    }

    #[test]
    fn prompt_embeds_content_between_delimiters() {
        let prompt = build_user_prompt(&doc("Build a login page."));
        let first = prompt.find(CONTENT_DELIMITER).unwrap();
        let last = prompt.rfind(CONTENT_DELIMITER).unwrap();
        assert!(first < last, "two delimiter lines expected");
        let inner = &prompt[first..last];
        assert!(inner.contains("Build a login page."));
    }

    #[test]
    fn prompt_names_key_kind_and_length() {
        let prompt = build_user_prompt(&doc("hello world"));
        assert!(prompt.contains("uploads/spec.txt"));
        assert!(prompt.contains("File type: txt"));
        assert!(prompt.contains("Content length: 11 characters"));
    }

    #[test]
    fn prompt_asks_for_the_four_sections() {
        let prompt = build_user_prompt(&doc("x y z"));
        for section in ["# Overview", "# Requirements", "# Technical Details", "# Additional Sections"] {
            assert!(prompt.contains(section), "missing {section}");
        }
    }
}
