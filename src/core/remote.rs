//! Remote Decision Client
//!
//! One POST per user action to an identify endpoint; no retries, no timeout
//! beyond the transport default. Any failure is reported as a
//! [`ServiceError`] and the session falls back to the local engine.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::core::identify::{parse_decision, IdentifyRequest};
use crate::error::ServiceError;
use crate::types::{Decision, ObservationSet, Turn};

/// A decision engine that may fail (network I/O)
#[async_trait]
pub trait RemoteEngine: Send + Sync {
    /// Ask for the next decision. Inputs are copies; engines never mutate
    /// session state.
    async fn ask(&self, history: Vec<Turn>, observations: ObservationSet) -> Result<Decision, ServiceError>;
}

/// HTTP client for a geoscout identify endpoint
pub struct RemoteDecisionClient {
    client: Client,
    url: String,
}

impl RemoteDecisionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteEngine for RemoteDecisionClient {
    async fn ask(&self, history: Vec<Turn>, observations: ObservationSet) -> Result<Decision, ServiceError> {
        let body = IdentifyRequest {
            history,
            current_state: observations,
        };

        let res = self.client.post(&self.url).json(&body).send().await?;
        let status = res.status();
        if !status.is_success() {
            debug!(%status, url = %self.url, "identify endpoint failed");
            return Err(match status {
                // The identify endpoint reports quota exhaustion as 503
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited,
                _ => ServiceError::unavailable(format!("identify endpoint returned {}", status)),
            });
        }

        let text = res.text().await?;
        parse_decision(&text)
    }
}
