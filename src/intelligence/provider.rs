//! Completion provider seam.
//!
//! The sentiment engine talks to the hosted model through [`CompletionProvider`]
//! so the HTTP gateway can be swapped for a scripted provider in tests.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One chat message in an OpenAI-compatible completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Errors from the completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("AI gateway API key is not configured")]
    NotConfigured,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("AI credits exhausted. Please add credits to continue.")]
    QuotaExhausted,

    #[error("AI gateway error: {status}")]
    Upstream { status: u16, body: String },

    #[error("AI gateway request failed: {0}")]
    Transport(String),

    #[error("AI gateway returned an unexpected body: {0}")]
    MalformedEnvelope(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion and return the assistant message content.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}
