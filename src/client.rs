//! The resilient client: rate limiting, retry, tracing and logging around
//! the two remote operations.
//!
//! Every call follows the same shape:
//!
//! 1. check arguments (nothing is sent if they are invalid);
//! 2. wait for a rate-limit token, abandoning the wait if the context ends;
//! 3. run the transport call under the operation's [`RetryPolicy`];
//! 4. close the operation span with its outcome.
//!
//! Each operation opens one span (`upload_file` or `complete_text`;
//! the latter's `text.length` is the prompt's UTF-8 byte length). The
//! span's `attempts`, `otel.status_code` and `error` fields are filled in
//! when the call finishes, so a tracing-opentelemetry exporter reports
//! failures as span errors.
//!
//! Log levels: `debug` per attempt, `warn` per retryable failure (emitted
//! by the retry loop), `info` once on success, `error` on any failure.

use crate::config::ClientConfig;
use crate::context::CallContext;
use crate::error::{ClientError, ConfigError, Operation, TransportError};
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryError, RetryPolicy};
use crate::transport::{
    ChatMessage, CompletionResponse, CompletionResult, OpenAiConfig, OpenAiTransport, Transport,
    UploadResult,
};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::field::Empty;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, info_span, Dispatch, Instrument, Span};

/// Resilient client for file uploads and text completions.
///
/// Cheap to share: wrap it in an `Arc` and call it from as many tasks as
/// needed. All of them draw from the same rate limiter.
pub struct Client {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    upload_retry: RetryPolicy,
    completion_retry: RetryPolicy,
    dispatch: Option<Dispatch>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("limiter", &self.limiter)
            .field("upload_retry", self.upload_retry.config())
            .field("completion_retry", self.completion_retry.config())
            .field("dispatch", &self.dispatch.as_ref().map(|_| "<Dispatch>"))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client around any [`Transport`].
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Result<Self, ConfigError> {
        config.upload_retry.validate()?;
        config.completion_retry.validate()?;
        Ok(Self {
            transport,
            limiter: RateLimiter::new(config.rate_limit)?,
            upload_retry: RetryPolicy::new(config.upload_retry),
            completion_retry: RetryPolicy::new(config.completion_retry),
            dispatch: config.dispatch,
        })
    }

    /// Build a client talking to the OpenAI REST API.
    pub fn openai(openai: OpenAiConfig, config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = OpenAiTransport::new(openai)?;
        Self::new(Arc::new(transport), config)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Upload the file at `path` with the given purpose tag.
    ///
    /// # Errors
    ///
    /// * [`ClientError::InvalidArgument`] for an empty `purpose`;
    /// * [`ClientError::RateLimitAborted`] / [`ClientError::Cancelled`] when
    ///   `ctx` ends first;
    /// * [`ClientError::LocalIo`] when the file cannot be read (not retried);
    /// * [`ClientError::Permanent`] on a 4xx rejection other than 429;
    /// * [`ClientError::RetriesExhausted`] once the upload ceiling is reached.
    pub async fn upload_file(
        &self,
        ctx: &CallContext,
        path: impl AsRef<Path>,
        purpose: &str,
    ) -> Result<UploadResult, ClientError> {
        let path = path.as_ref();
        let span = self.span(|| {
            info_span!(
                "upload_file",
                file.path = %path.display(),
                file.purpose = purpose,
                attempts = Empty,
                otel.status_code = Empty,
                error = Empty,
            )
        });

        self.scoped(span.clone(), async {
            let result = self.upload_inner(ctx, path, purpose, &span).await;
            match &result {
                Ok(upload) => info!(
                    file.id = %upload.id,
                    file.status = %upload.status,
                    "file uploaded"
                ),
                Err(e) => record_failure(&span, e),
            }
            result
        })
        .await
    }

    /// Run one completion over `prompt` as a single user message.
    ///
    /// Fitting `prompt` into the model's context window is the caller's
    /// job. A response with no choices, or only empty ones, is retried.
    pub async fn complete_text(
        &self,
        ctx: &CallContext,
        prompt: &str,
    ) -> Result<CompletionResult, ClientError> {
        let span = self.span(|| {
            info_span!(
                "complete_text",
                text.length = prompt.len(),
                attempts = Empty,
                otel.status_code = Empty,
                error = Empty,
            )
        });

        self.scoped(span.clone(), async {
            let result = self.complete_inner(ctx, prompt, &span).await;
            match &result {
                Ok(completion) => info!(
                    model = %completion.model,
                    prompt_tokens = completion.usage.prompt_tokens,
                    completion_tokens = completion.usage.completion_tokens,
                    "completion received"
                ),
                Err(e) => record_failure(&span, e),
            }
            result
        })
        .await
    }

    async fn upload_inner(
        &self,
        ctx: &CallContext,
        path: &Path,
        purpose: &str,
        span: &Span,
    ) -> Result<UploadResult, ClientError> {
        const OP: Operation = Operation::UploadFile;

        if purpose.trim().is_empty() {
            return Err(ClientError::InvalidArgument {
                operation: OP,
                reason: "purpose must not be empty".into(),
            });
        }
        self.admit(ctx, OP).await?;

        let transport = &*self.transport;
        let mut attempts = 0u32;
        let result = self
            .upload_retry
            .run(ctx, |attempt| {
                attempts = attempt.index + 1;
                debug!(attempt = attempts, "uploading file");
                transport.create_file(path, purpose)
            })
            .await;
        span.record("attempts", attempts);

        result.map_err(|e| into_client_error(OP, e))
    }

    async fn complete_inner(
        &self,
        ctx: &CallContext,
        prompt: &str,
        span: &Span,
    ) -> Result<CompletionResult, ClientError> {
        const OP: Operation = Operation::CompleteText;

        if prompt.trim().is_empty() {
            return Err(ClientError::InvalidArgument {
                operation: OP,
                reason: "prompt must not be empty".into(),
            });
        }
        self.admit(ctx, OP).await?;

        let transport = &*self.transport;
        let messages = [ChatMessage::user(prompt)];
        let messages = &messages[..];
        let mut attempts = 0u32;
        let result = self
            .completion_retry
            .run(ctx, |attempt| {
                attempts = attempt.index + 1;
                debug!(attempt = attempts, "requesting completion");
                async move {
                    let response = transport.create_completion(messages).await?;
                    first_choice(response)
                }
            })
            .await;
        span.record("attempts", attempts);

        result.map_err(|e| into_client_error(OP, e))
    }

    /// Wait for a rate-limit token on behalf of `operation`.
    async fn admit(&self, ctx: &CallContext, operation: Operation) -> Result<(), ClientError> {
        self.limiter
            .acquire(ctx)
            .await
            .map_err(|reason| ClientError::RateLimitAborted { operation, reason })
    }

    // ── Dispatch override ────────────────────────────────────────────────

    /// Create a span in the override dispatcher, or the current one.
    fn span(&self, make: impl FnOnce() -> Span) -> Span {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, make),
            None => make(),
        }
    }

    /// Run `fut` inside `span`, routing its events to the override
    /// dispatcher when one is configured.
    async fn scoped<F: Future>(&self, span: Span, fut: F) -> F::Output {
        let fut = fut.instrument(span);
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }
}

/// The first non-empty choice, or a transient [`TransportError::EmptyResponse`].
fn first_choice(response: CompletionResponse) -> Result<CompletionResult, TransportError> {
    let CompletionResponse {
        model,
        choices,
        usage,
    } = response;

    if choices.is_empty() {
        return Err(TransportError::EmptyResponse {
            detail: "completion returned no choices".into(),
        });
    }

    let content = choices
        .into_iter()
        .map(|c| c.content)
        .find(|c| !c.trim().is_empty())
        .ok_or_else(|| TransportError::EmptyResponse {
            detail: "completion choices had no content".into(),
        })?;

    Ok(CompletionResult {
        content,
        model,
        usage,
    })
}

fn into_client_error(operation: Operation, err: RetryError<TransportError>) -> ClientError {
    match err {
        RetryError::Permanent {
            error: TransportError::LocalIo { path, source },
            ..
        } => ClientError::LocalIo {
            operation,
            path,
            source,
        },
        RetryError::Permanent { error, attempts } => ClientError::Permanent {
            operation,
            attempts,
            source: error,
        },
        RetryError::Exhausted {
            error,
            attempts,
            elapsed,
        } => ClientError::RetriesExhausted {
            operation,
            attempts,
            elapsed,
            source: error,
        },
        RetryError::Cancelled {
            reason,
            attempts,
            last_error,
        } => ClientError::Cancelled {
            operation,
            attempts,
            reason,
            last_error,
        },
    }
}

/// Mark `span` as failed and log the failure.
fn record_failure(span: &Span, err: &ClientError) {
    span.record("otel.status_code", "ERROR");
    span.record("error", tracing::field::display(err));
    error!(
        operation = %err.operation(),
        status = err.status(),
        error = %err,
        "operation failed"
    );
}
