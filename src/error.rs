//! Error types for GeoScout.
//!
//! Remote failures never reach the user: the session turns them into a local
//! decision and a notice. `InferenceInconclusive` is not an error at all, it
//! is `None` from `infer`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-visible notice when the reasoning service quota is exhausted
pub const RATE_LIMITED_NOTICE: &str = "Daily quota exceeded. Switching to local engine...";

/// User-visible notice for any other remote failure
pub const UNAVAILABLE_NOTICE: &str = "Connection unstable. Retrying...";

/// Failures of the remote reasoning path. Every kind trips the breaker.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Remote engine rate limited")]
    RateLimited,

    #[error("Remote engine unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Remote engine returned a malformed decision: {reason}")]
    Malformed { reason: String },
}

/// Copyable discriminant of [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    RateLimited,
    Unavailable,
    Malformed,
}

impl ServiceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }

    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::RateLimited => ServiceErrorKind::RateLimited,
            Self::Unavailable { .. } => ServiceErrorKind::Unavailable,
            Self::Malformed { .. } => ServiceErrorKind::Malformed,
        }
    }
}

impl ServiceErrorKind {
    /// Message the user sees for this failure
    pub fn notice(&self) -> &'static str {
        match self {
            Self::RateLimited => RATE_LIMITED_NOTICE,
            Self::Unavailable | Self::Malformed => UNAVAILABLE_NOTICE,
        }
    }

    /// HTTP status of the degraded identify response
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RateLimited => 503,
            Self::Unavailable | Self::Malformed => 500,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            return Self::RateLimited;
        }
        if err.is_decode() {
            return Self::malformed(err.to_string());
        }
        Self::unavailable(err.to_string())
    }
}

/// Rejected user actions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A decision is still being computed")]
    Busy,

    #[error("Session has concluded; reset to start a new sample")]
    Concluded,

    #[error("Option '{option}' is not offered by the current question")]
    UnknownOption { option: String },

    #[error("Trait '{name}' has not been observed")]
    UnknownTrait { name: String },
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}
