//! Result types for the document pipeline.

use crate::prompts::truncate_chars;
use crate::transport::{CompletionResult, UploadResult};
use serde::Serialize;
use std::path::PathBuf;

/// Timing and size of the local extraction step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Characters of extracted text.
    pub chars: usize,
    /// UTF-8 bytes of extracted text.
    pub bytes: usize,
    /// Wall-clock extraction time.
    pub duration_ms: u64,
}

/// Everything [`crate::process::process_document`] produced.
///
/// A run that gets past the upload is a success even if the summary
/// failed; check `summary_error`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutput {
    pub path: PathBuf,

    /// Full extracted text. Not serialised; see [`ProcessOutput::preview`].
    #[serde(skip)]
    pub text: String,

    pub extraction: ExtractionStats,
    pub upload: UploadResult,

    /// `None` when summarising was disabled or failed.
    pub summary: Option<CompletionResult>,

    /// Why the summary is missing, if it was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,

    pub total_duration_ms: u64,
}

impl ProcessOutput {
    /// The first `max_chars` characters of the text, with `...` appended
    /// when it was cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let head = truncate_chars(&self.text, max_chars);
        if head.len() < self.text.len() {
            format!("{head}...")
        } else {
            head.to_string()
        }
    }
}
