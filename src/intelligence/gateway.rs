//! Chat-completions client for the hosted AI gateway.
//!
//! Uses reqwest with Bearer auth against an OpenAI-compatible
//! `/v1/chat/completions` endpoint. 429 and 402 are surfaced as their own
//! error kinds; nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{ChatMessage, CompletionError, CompletionProvider};
use crate::config::GatewayConfig;

pub struct GatewayClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionProvider for GatewayClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::NotConfigured)?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            log::error!("AI gateway error: {} {}", status, text);
            return Err(error_for_status(status.as_u16(), text));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        completion_content(&text)
    }
}

/// Map a non-2xx gateway status to its error kind.
pub(crate) fn error_for_status(status: u16, body: String) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited,
        402 => CompletionError::QuotaExhausted,
        _ => CompletionError::Upstream { status, body },
    }
}

/// Pull `choices[0].message.content` out of a completion response body.
pub(crate) fn completion_content(body: &str) -> Result<String, CompletionError> {
    #[derive(Deserialize)]
    struct Envelope {
        choices: Vec<Choice>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }

    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedEnvelope(e.to_string()))?;
    envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CompletionError::MalformedEnvelope("missing choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(error_for_status(429, String::new()), CompletionError::RateLimited));
        assert!(matches!(error_for_status(402, String::new()), CompletionError::QuotaExhausted));
        assert!(matches!(
            error_for_status(503, "down".into()),
            CompletionError::Upstream { status: 503, .. }
        ));
    }

    #[test]
    fn test_completion_content_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"sentiment\":\"neutral\"}"}}]}"#;
        assert_eq!(completion_content(body).unwrap(), r#"{"sentiment":"neutral"}"#);
    }

    #[test]
    fn test_completion_content_rejects_empty_choices() {
        assert!(matches!(
            completion_content(r#"{"choices":[]}"#),
            Err(CompletionError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            completion_content("<html>"),
            Err(CompletionError::MalformedEnvelope(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let client = GatewayClient::new(&GatewayConfig {
            url: "http://127.0.0.1:9/v1/chat/completions".into(),
            model: "test-model".into(),
            api_key: None,
            timeout_secs: 1,
        })
        .unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, CompletionError::NotConfigured));
    }
}
