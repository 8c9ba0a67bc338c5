//! Progress-callback trait for pipeline stage events.
//!
//! Pass any `&dyn ProcessProgressCallback` to
//! [`crate::process::process_document`] to hear about each stage as it
//! starts, finishes or fails. The CLI drives its spinner from these events.
//!
//! # Example
//!
//! ```rust
//! use openai_pdf::{ProcessProgressCallback, Stage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ProcessProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, detail: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done: {detail}");
//!     }
//! }
//!
//! let counter = CountingCallback {
//!     completed: AtomicUsize::new(0),
//! };
//! let cb: &dyn ProcessProgressCallback = &counter;
//! cb.on_stage_complete(Stage::Extract, "1200 chars");
//! assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;

/// One step of the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Upload,
    Summarize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Upload => "upload",
            Stage::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods default to no-ops so callers only override what they
/// care about.
pub trait ProcessProgressCallback: Send + Sync {
    /// The stage is about to run.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// The stage succeeded; `detail` is a short human-readable summary.
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// The stage failed. For [`Stage::Summarize`] the run still succeeds.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessProgressCallback for NoopProgressCallback {}
