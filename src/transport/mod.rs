//! The raw remote-service calls the client wraps.
//!
//! A [`Transport`] performs exactly one request per call: no rate limiting,
//! no retries, no logging policy. Everything resilient lives in
//! [`crate::client::Client`]. Failures come back as
//! [`TransportError`](crate::error::TransportError) tagged
//! transient/permanent, so the retry policy stays independent of whichever
//! HTTP stack sits underneath.
//!
//! Implementations own their connection pooling. The client drops an
//! in-flight call's future when the caller's context ends, so a call must
//! not leave detached work behind.

pub mod openai;

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use openai::{OpenAiConfig, OpenAiTransport};

/// A file accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Remote identifier, e.g. `file-abc123`.
    pub id: String,
    /// Display name recorded by the service.
    pub filename: String,
    /// Purpose tag the file was uploaded with.
    #[serde(default)]
    pub purpose: String,
    /// Size in bytes as seen by the service.
    #[serde(default)]
    pub bytes: u64,
    /// Unix timestamp of creation.
    #[serde(default)]
    pub created_at: i64,
    /// Processing status, e.g. `uploaded` or `processed`.
    #[serde(default)]
    pub status: String,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One alternative returned by a completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Raw completion response, before the client checks its shape.
///
/// `choices` may legitimately arrive empty from an inconsistent upstream;
/// the client treats that as a transient failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionResponse {
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

/// Generated text returned by [`crate::client::Client::complete_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

/// The remote calls the resilient client is built around.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload the file at `path`.
    ///
    /// An unreadable local file must be reported as
    /// [`TransportError::LocalIo`] so it is surfaced without retrying.
    async fn create_file(&self, path: &Path, purpose: &str) -> Result<UploadResult, TransportError>;

    /// Run one chat completion over `messages`.
    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionResponse, TransportError>;
}
