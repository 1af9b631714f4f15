//! Identify operation: history + observations in, one validated decision out
//!
//! The reasoning service's text is untrusted. It must deserialize into a
//! [`Decision`] with every field of the right type and in range, otherwise
//! the call fails as `Malformed`. The 120-character guard is applied here and
//! again by the session before anything is rendered.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::prompt::build_messages;
use crate::core::provider::ChatProvider;
use crate::core::remote::RemoteEngine;
use crate::error::{ServiceError, ServiceErrorKind};
use crate::types::{Decision, ObservationSet, Turn};

/// Request body of the identify operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default)]
    pub current_state: ObservationSet,
}

/// Strictly parse a decision from untrusted text
pub fn parse_decision(text: &str) -> Result<Decision, ServiceError> {
    let mut decision: Decision = serde_json::from_str(text.trim())
        .map_err(|e| ServiceError::malformed(e.to_string()))?;
    decision.validate().map_err(ServiceError::malformed)?;
    if decision.enforce_message_limit() {
        debug!("remote display_message truncated");
    }
    Ok(decision)
}

/// Degraded decision and HTTP status for a failure kind
pub fn degraded_response(kind: ServiceErrorKind) -> (u16, Decision) {
    (kind.http_status(), Decision::degraded(kind.notice()))
}

/// Prompt-driven decision engine over a chat provider
#[derive(Clone)]
pub struct Identifier {
    provider: Arc<dyn ChatProvider>,
}

impl Identifier {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Run one identify round
    pub async fn identify(&self, request: &IdentifyRequest) -> Result<Decision, ServiceError> {
        let messages = build_messages(&request.history, &request.current_state);
        let content = self.provider.complete(&messages).await.map_err(|e| {
            warn!(error = %e, "reasoning service call failed");
            e
        })?;
        parse_decision(&content)
    }
}

#[async_trait]
impl RemoteEngine for Identifier {
    async fn ask(&self, history: Vec<Turn>, observations: ObservationSet) -> Result<Decision, ServiceError> {
        self.identify(&IdentifyRequest {
            history,
            current_state: observations,
        })
        .await
    }
}
