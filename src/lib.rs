//! # openai-pdf
//!
//! Extract the text of a PDF, upload the file to OpenAI and ask for a
//! summary, through a client that survives a flaky network.
//!
//! ## Why this crate?
//!
//! A plain HTTP call to a hosted model fails in boring, predictable ways:
//! bursts trip the provider's rate limit, 5xx and 429 responses come and
//! go, and occasionally a "successful" response has no choices in it.
//! [`Client`] wraps the two calls this tool needs (upload a file, complete
//! a prompt) with:
//!
//! * a token-bucket **rate limiter** shared by every caller;
//! * **exponential backoff** with a permanent/transient split, so a bad API
//!   key fails at once while a 503 is retried up to a ceiling;
//! * **cancellation** through [`CallContext`], honoured while waiting for
//!   a token, during the request and during backoff;
//! * one **tracing span** per operation, with the error recorded on it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    pdfium text extraction (spawn_blocking)
//!  ├─ 2. Upload     POST /files          ← rate limit + retry (60 s ceiling)
//!  └─ 3. Summarise  POST /chat/completions ← rate limit + retry (30 s ceiling)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openai_pdf::{
//!     process_document, CallContext, Client, ClientConfig, NoopProgressCallback,
//!     OpenAiConfig, PdfTextExtractor, ProcessOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let openai = OpenAiConfig::new(std::env::var("OPENAI_API_KEY")?);
//!     let client = Client::openai(openai, ClientConfig::default())?;
//!
//!     let output = process_document(
//!         &client,
//!         &PdfTextExtractor::new(),
//!         "document.pdf",
//!         &ProcessOptions::default(),
//!         &CallContext::new(),
//!         &NoopProgressCallback,
//!     )
//!     .await?;
//!
//!     println!("uploaded as {}", output.upload.id);
//!     if let Some(summary) = output.summary {
//!         println!("{}", summary.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `openai-pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `otel`  | off     | Adds `--otel-stdout`: span export through tracing-opentelemetry |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! openai-pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod output;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod rate_limit;
pub mod retry;
#[cfg(feature = "cli")]
pub mod telemetry;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder, ProcessOptions, RateLimitConfig, RetryConfig};
pub use context::CallContext;
pub use error::{
    CancelReason, ClientError, ConfigError, ExtractError, FailureKind, Operation, ProcessError,
    TransportError,
};
pub use extract::{PdfTextExtractor, TextExtractor};
pub use output::{ExtractionStats, ProcessOutput};
pub use process::process_document;
pub use progress::{NoopProgressCallback, ProcessProgressCallback, Stage};
pub use rate_limit::RateLimiter;
pub use retry::{Classify, RetryAttempt, RetryError, RetryPolicy};
pub use transport::{
    ChatMessage, CompletionResponse, CompletionResult, OpenAiConfig, OpenAiTransport, Transport,
    UploadResult,
};
