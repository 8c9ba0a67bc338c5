//! Prompt templates for the document pipeline.
//!
//! Keeping prompts here means tests can inspect them directly without a
//! model behind them, and changing the wording touches one place.
//!
//! The client itself never truncates; fitting text into the model's
//! context window is done here, by the pipeline, before the call.

/// Prefix of the summary request; the document excerpt follows it.
pub const SUMMARY_PROMPT_PREFIX: &str = "Please summarize this text from a PDF: ";

/// Build the summary prompt from at most `max_chars` characters of `text`.
pub fn summary_prompt(text: &str, max_chars: usize) -> String {
    format!("{SUMMARY_PROMPT_PREFIX}{}", truncate_chars(text, max_chars))
}

/// The longest prefix of `s` holding at most `max_chars` characters.
///
/// Cuts on a `char` boundary, so multi-byte text never splits mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
