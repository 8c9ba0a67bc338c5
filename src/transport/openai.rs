//! REST transport for the OpenAI files and chat-completions endpoints.
//!
//! One method call is one HTTP request. Status codes are mapped onto
//! [`FailureKind`](crate::error::FailureKind) here and nowhere else, so the
//! rest of the crate never sees a `reqwest::Error`.

use super::{ChatMessage, Choice, CompletionResponse, Transport, UploadResult, Usage};
use crate::error::{ConfigError, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Connection settings for [`OpenAiTransport`].
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer token sent on every request.
    pub api_key: String,

    /// API root without trailing slash. Default: [`DEFAULT_BASE_URL`].
    ///
    /// Point this at a compatible gateway or a local mock server.
    pub base_url: String,

    /// Model used for chat completions. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Per-request HTTP timeout. Default: 60 s.
    ///
    /// Independent of the caller's [`CallContext`](crate::context::CallContext)
    /// deadline; whichever fires first ends the request.
    pub request_timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// [`Transport`] backed by the OpenAI REST API.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiTransport {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError(
                "OpenAI API key is empty. Set OPENAI_API_KEY or pass --api-key.".into(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ConfigError("model name must not be empty".into()));
        }
        let base = reqwest::Url::parse(&config.base_url)
            .map_err(|e| ConfigError(format!("invalid base URL '{}': {e}", config.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError(format!(
                "base URL '{}' must use http or https",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send `request` and decode a 2xx JSON body as `T`.
    async fn send_json<T>(&self, request: reqwest::RequestBuilder) -> Result<T, TransportError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("reading response body: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::from_status(
                status.as_u16(),
                api_error_message(&body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| TransportError::EmptyResponse {
            detail: format!("undecodable body: {e}"),
        })
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a failed `send()`. A request that could not be built will never
/// succeed; everything else is a network fault.
fn send_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() {
        TransportError::InvalidRequest {
            detail: e.to_string(),
        }
    } else {
        TransportError::network(e.to_string())
    }
}

/// `error.message` from an API error body, or the raw body.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn create_file(&self, path: &Path, purpose: &str) -> Result<UploadResult, TransportError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TransportError::LocalIo {
                path: path.to_path_buf(),
                source,
            })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());

        debug!(bytes = bytes.len(), %filename, "POST /files");

        let form = Form::new()
            .text("purpose", purpose.to_string())
            .part("file", Part::bytes(bytes).file_name(filename));

        self.send_json(self.http.post(self.endpoint("files")).multipart(form))
            .await
    }

    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionResponse, TransportError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
        };

        debug!(model = %self.config.model, messages = messages.len(), "POST /chat/completions");

        let wire: ChatResponse = self
            .send_json(self.http.post(self.endpoint("chat/completions")).json(&request))
            .await?;

        Ok(CompletionResponse {
            model: wire.model,
            choices: wire
                .choices
                .into_iter()
                .map(|c| Choice {
                    content: c.message.content.unwrap_or_default(),
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: wire.usage.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        let err = OpenAiTransport::new(OpenAiConfig::new("  ")).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn rejects_malformed_base_url() {
        let err = OpenAiTransport::new(OpenAiConfig::new("k").base_url("not a url")).unwrap_err();
        assert!(err.to_string().contains("invalid base URL"), "got: {err}");

        let err =
            OpenAiTransport::new(OpenAiConfig::new("k").base_url("ftp://files.example")).unwrap_err();
        assert!(err.to_string().contains("http or https"), "got: {err}");
    }

    #[tokio::test]
    async fn unbuildable_request_is_permanent() {
        // Bypass `new` so the bad scheme reaches reqwest.
        let t = OpenAiTransport {
            http: reqwest::Client::new(),
            config: OpenAiConfig::new("k").base_url("ftp://files.example/v1"),
        };

        let err = t
            .create_completion(&[ChatMessage::user("ping")])
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InvalidRequest { .. }), "got: {err}");
        assert_eq!(err.kind(), crate::error::FailureKind::Permanent);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn debug_redacts_key() {
        let dbg = format!("{:?}", OpenAiConfig::new("sk-secret"));
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let t = OpenAiTransport::new(OpenAiConfig::new("k").base_url("http://localhost:1/v1/")).unwrap();
        assert_eq!(t.endpoint("files"), "http://localhost:1/v1/files");
    }

    #[test]
    fn error_message_prefers_api_shape() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(api_error_message(""), "empty response body");
    }
}
