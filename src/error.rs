//! Error types for the openai-pdf library.
//!
//! The errors are layered to match the call path:
//!
//! * [`TransportError`]: what a single transport attempt reports. Every
//!   service failure carries an explicit [`FailureKind`] tag, so the retry
//!   policy never needs to know which HTTP library produced it.
//!
//! * [`ClientError`]: what [`crate::client::Client`] returns. Each variant
//!   names the [`Operation`] it came from, so callers can log or display it
//!   without re-deriving context.
//!
//! * [`ExtractError`]: local PDF text extraction failures.
//!
//! * [`ProcessError`]: fatal failures of the extract → upload pipeline.
//!   A failed summary is *not* fatal and is reported inside
//!   [`crate::output::ProcessOutput`] instead.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ── Cancellation ─────────────────────────────────────────────────────────

/// Why a [`crate::context::CallContext`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The caller cancelled the context explicitly.
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

// ── Transport errors ─────────────────────────────────────────────────────

/// Retry classification attached to every service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network errors, 5xx, 429: expected to resolve on retry.
    Transient,
    /// 4xx other than 429: malformed request, bad credentials.
    Permanent,
}

impl FailureKind {
    /// Classify an HTTP status code.
    ///
    /// 400–499 are permanent except 429, which means the remote side is
    /// throttling us and will accept the request later.
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) && status != 429 {
            FailureKind::Permanent
        } else {
            FailureKind::Transient
        }
    }
}

/// A failure reported by one transport call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote service (or the network in front of it) failed.
    #[error("{}", service_message(.status, .message))]
    Service {
        kind: FailureKind,
        status: Option<u16>,
        message: String,
    },

    /// The call succeeded at the HTTP level but the payload was unusable
    /// (zero choices, undecodable body). Upstream inconsistencies of this
    /// kind are intermittent, so they are retried.
    #[error("invalid response from service: {detail}")]
    EmptyResponse { detail: String },

    /// The request could not be built (bad URL, unencodable header).
    /// Sending it again would fail the same way, so it is never retried.
    #[error("request could not be built: {detail}")]
    InvalidRequest { detail: String },

    /// The local file could not be read. Never retried.
    #[error("cannot read '{}': {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn service_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("service returned HTTP {code}: {message}"),
        None => format!("service unreachable: {message}"),
    }
}

impl TransportError {
    /// Build a service error, classifying it from the HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        TransportError::Service {
            kind: FailureKind::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// A transient failure with no HTTP status (connect error, timeout, reset).
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Service {
            kind: FailureKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    /// The retry classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::Service { kind, .. } => *kind,
            TransportError::EmptyResponse { .. } => FailureKind::Transient,
            TransportError::InvalidRequest { .. } | TransportError::LocalIo { .. } => {
                FailureKind::Permanent
            }
        }
    }

    /// The HTTP status code, if the service produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Service { status, .. } => *status,
            _ => None,
        }
    }
}

// ── Client errors ────────────────────────────────────────────────────────

/// The client operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UploadFile,
    CompleteText,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::UploadFile => "upload_file",
            Operation::CompleteText => "complete_text",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`crate::client::Client`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Cancellation ──────────────────────────────────────────────────────
    /// The context ended while waiting for a rate-limit token. No token
    /// was consumed and the transport was never called.
    #[error("{operation}: rate-limit wait aborted: {reason}")]
    RateLimitAborted {
        operation: Operation,
        reason: CancelReason,
    },

    /// The context ended during an attempt or a backoff wait.
    /// `last_error` is the transient failure being backed off from, if any.
    #[error(
        "{operation}: cancelled after {attempts} attempt(s): {reason}{}",
        last_error_suffix(.last_error)
    )]
    Cancelled {
        operation: Operation,
        attempts: u32,
        reason: CancelReason,
        #[source]
        last_error: Option<TransportError>,
    },

    // ── Service errors ────────────────────────────────────────────────────
    /// The service rejected the request in a way retrying cannot fix.
    #[error("{operation}: rejected by service: {source}")]
    Permanent {
        operation: Operation,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Transient failures continued until the retry ceiling was reached.
    #[error("{operation}: failed after retries ({attempts} attempts in {elapsed:?}): {source}")]
    RetriesExhausted {
        operation: Operation,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: TransportError,
    },

    // ── Local errors ──────────────────────────────────────────────────────
    /// The file to upload could not be read.
    #[error("{operation}: cannot read local file '{}': {source}", .path.display())]
    LocalIo {
        operation: Operation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A precondition on the arguments failed; nothing was sent.
    #[error("{operation}: invalid argument: {reason}")]
    InvalidArgument {
        operation: Operation,
        reason: String,
    },
}

fn last_error_suffix(last_error: &Option<TransportError>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {e})"),
        None => String::new(),
    }
}

impl ClientError {
    /// The operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            ClientError::RateLimitAborted { operation, .. }
            | ClientError::Cancelled { operation, .. }
            | ClientError::Permanent { operation, .. }
            | ClientError::RetriesExhausted { operation, .. }
            | ClientError::LocalIo { operation, .. }
            | ClientError::InvalidArgument { operation, .. } => *operation,
        }
    }

    /// True for both rate-limit and backoff/attempt cancellations.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimitAborted { .. } | ClientError::Cancelled { .. }
        )
    }

    /// True when the service rejected the request permanently.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ClientError::Permanent { .. })
    }

    /// The cancellation reason, for cancellation errors.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            ClientError::RateLimitAborted { reason, .. } | ClientError::Cancelled { reason, .. } => {
                Some(*reason)
            }
            _ => None,
        }
    }

    /// HTTP status of the underlying service failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Permanent { source, .. } | ClientError::RetriesExhausted { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }
}

// ── Extraction errors ────────────────────────────────────────────────────

/// Errors from local PDF text extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{}'\nCheck the path exists and is readable.", .path.display())]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{}'\nTry: chmod +r {path:?}", .path.display())]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{}'\nFirst bytes: {magic:?}", .path.display())]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF requires a password but none was provided.
    #[error("PDF '{}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.", .path.display())]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{}'", .path.display())]
    WrongPassword { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{}' is corrupt: {detail}", .path.display())]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install pdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// The caller's context ended before extraction finished.
    #[error("Text extraction aborted: {0}")]
    Cancelled(CancelReason),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Pipeline errors ──────────────────────────────────────────────────────

/// Fatal errors from [`crate::process::process_document`].
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Text extraction failed.
    #[error("Text extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// The document contains no extractable text.
    #[error("No text could be extracted from '{}' (scanned or image-only PDF?)", .path.display())]
    EmptyDocument { path: PathBuf },

    /// The file upload failed.
    #[error("Upload failed: {0}")]
    Upload(#[source] ClientError),
}

/// Builder validation failure.
#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);
