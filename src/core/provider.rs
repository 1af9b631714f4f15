//! Chat provider: the reasoning service behind the identify operation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ServiceError;
use crate::types::Turn;

/// Produces raw completion text for a message list
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[Turn]) -> Result<String, ServiceError>;
}

/// OpenAI-compatible chat completions client (Groq by default)
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build from config, reading the key from the configured env var.
    /// `None` when no key is set.
    pub fn from_env(config: &ProviderConfig) -> Option<Self> {
        config.api_key().map(|key| Self::new(config, Some(key)))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    async fn complete(&self, messages: &[Turn]) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": { "type": "json_object" },
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            debug!(%status, "provider request failed");
            return Err(classify_failure(status, &text));
        }

        let json: Value = res.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::malformed("No content received from provider"))
    }
}

/// Map a non-success provider response to a service error
pub fn classify_failure(status: StatusCode, body: &str) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS || is_rate_limit_body(body) {
        return ServiceError::RateLimited;
    }
    ServiceError::unavailable(format!("provider returned {}", status))
}

fn is_rate_limit_body(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["code"].as_str().map(|c| c == "rate_limit_exceeded"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ServiceError::RateLimited));
    }

    #[test]
    fn test_rate_limit_code_in_body() {
        let body = r#"{"error":{"message":"quota","code":"rate_limit_exceeded"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, ServiceError::RateLimited));
    }

    #[test]
    fn test_other_status_is_unavailable() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, ServiceError::Unavailable { .. }));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = ProviderConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            ..ProviderConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config, None);
        assert_eq!(provider.endpoint(), "http://localhost:9999/v1/chat/completions");
    }
}
