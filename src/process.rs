//! The extract → upload → summarise pipeline.
//!
//! Only extraction and upload are fatal. A failed summary is recorded in
//! [`ProcessOutput::summary_error`] and the run still returns `Ok`, the same
//! way a partially converted document is still a result.

use crate::client::Client;
use crate::config::ProcessOptions;
use crate::context::CallContext;
use crate::error::ProcessError;
use crate::extract::TextExtractor;
use crate::output::{ExtractionStats, ProcessOutput};
use crate::progress::{ProcessProgressCallback, Stage};
use crate::prompts::summary_prompt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Extract text from `path`, upload the file and optionally summarise it.
///
/// # Errors
///
/// * [`ProcessError::Extract`] when the text cannot be extracted;
/// * [`ProcessError::EmptyDocument`] when the document holds no text;
/// * [`ProcessError::Upload`] when the upload fails.
pub async fn process_document(
    client: &Client,
    extractor: &dyn TextExtractor,
    path: impl AsRef<Path>,
    options: &ProcessOptions,
    ctx: &CallContext,
    progress: &dyn ProcessProgressCallback,
) -> Result<ProcessOutput, ProcessError> {
    let path = path.as_ref();
    let span = info_span!("process_document", file.path = %path.display());
    run(client, extractor, path, options, ctx, progress)
        .instrument(span)
        .await
}

async fn run(
    client: &Client,
    extractor: &dyn TextExtractor,
    path: &Path,
    options: &ProcessOptions,
    ctx: &CallContext,
    progress: &dyn ProcessProgressCallback,
) -> Result<ProcessOutput, ProcessError> {
    let total_start = Instant::now();

    // ── Step 1: Extract ──────────────────────────────────────────────────
    progress.on_stage_start(Stage::Extract);
    let extract_start = Instant::now();
    let text = match extractor.extract_text(ctx, path).await {
        Ok(text) if text.trim().is_empty() => {
            let err = ProcessError::EmptyDocument {
                path: path.to_path_buf(),
            };
            progress.on_stage_error(Stage::Extract, &err.to_string());
            return Err(err);
        }
        Ok(text) => text,
        Err(e) => {
            progress.on_stage_error(Stage::Extract, &e.to_string());
            return Err(e.into());
        }
    };
    let extraction = ExtractionStats {
        chars: text.chars().count(),
        bytes: text.len(),
        duration_ms: extract_start.elapsed().as_millis() as u64,
    };
    progress.on_stage_complete(Stage::Extract, &format!("{} chars", extraction.chars));

    // ── Step 2: Upload ───────────────────────────────────────────────────
    progress.on_stage_start(Stage::Upload);
    let upload = match client.upload_file(ctx, path, &options.purpose).await {
        Ok(upload) => upload,
        Err(e) => {
            progress.on_stage_error(Stage::Upload, &e.to_string());
            return Err(ProcessError::Upload(e));
        }
    };
    progress.on_stage_complete(Stage::Upload, &upload.id);

    // ── Step 3: Summarise ────────────────────────────────────────────────
    let mut summary = None;
    let mut summary_error = None;
    if options.summarize {
        progress.on_stage_start(Stage::Summarize);
        let prompt = summary_prompt(&text, options.summary_chars);
        match client.complete_text(ctx, &prompt).await {
            Ok(completion) => {
                progress.on_stage_complete(
                    Stage::Summarize,
                    &format!("{} chars", completion.content.chars().count()),
                );
                summary = Some(completion);
            }
            Err(e) => {
                warn!(error = %e, "summary failed; continuing without it");
                progress.on_stage_error(Stage::Summarize, &e.to_string());
                summary_error = Some(e.to_string());
            }
        }
    }

    let total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        file.id = %upload.id,
        summarized = summary.is_some(),
        total_duration_ms,
        "document processed"
    );

    Ok(ProcessOutput {
        path: path.to_path_buf(),
        text,
        extraction,
        upload,
        summary,
        summary_error,
        total_duration_ms,
    })
}
