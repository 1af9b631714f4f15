//! Reason codes for adopted decisions
//!
//! Every decision the session adopts carries one of these, so logs and the
//! status API can say which path produced it.

use serde::{Deserialize, Serialize};

/// Why the current decision was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum DecisionReason {
    // =========================================================================
    // G000: Lifecycle
    // =========================================================================
    /// Fresh session or explicit reset
    G000_SESSION_START,

    // =========================================================================
    // G001: Remote engine
    // =========================================================================
    /// Remote decision adopted verbatim (after the length guard)
    G001_REMOTE_ADOPTED,

    // =========================================================================
    // G002-G003: Local conclusions
    // =========================================================================
    /// Local inference confidence above the early-exit threshold
    G002_EARLY_EXIT,
    /// Mercy rule reached with a low-confidence candidate
    G003_MERCY_BEST_GUESS,
    /// Mercy rule reached without any usable candidate
    G003_MERCY_UNKNOWN,

    // =========================================================================
    // G004-G005: Fallback script
    // =========================================================================
    /// Next question from the fixed script
    G004_SCRIPT_STEP,
    /// Script index past its end (invariant violation)
    G005_SEQUENCE_EXHAUSTED,
}

impl DecisionReason {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::G000_SESSION_START => "G000_SESSION_START",
            Self::G001_REMOTE_ADOPTED => "G001_REMOTE_ADOPTED",
            Self::G002_EARLY_EXIT => "G002_EARLY_EXIT",
            Self::G003_MERCY_BEST_GUESS => "G003_MERCY_BEST_GUESS",
            Self::G003_MERCY_UNKNOWN => "G003_MERCY_UNKNOWN",
            Self::G004_SCRIPT_STEP => "G004_SCRIPT_STEP",
            Self::G005_SEQUENCE_EXHAUSTED => "G005_SEQUENCE_EXHAUSTED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::G000_SESSION_START => "Session ready",
            Self::G001_REMOTE_ADOPTED => "Remote engine decision",
            Self::G002_EARLY_EXIT => "Strong local match",
            Self::G003_MERCY_BEST_GUESS => "Question limit reached, best guess",
            Self::G003_MERCY_UNKNOWN => "Question limit reached, no match",
            Self::G004_SCRIPT_STEP => "Scripted offline question",
            Self::G005_SEQUENCE_EXHAUSTED => "Offline script exhausted",
        }
    }

    /// Was the decision produced by the local engine?
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::G000_SESSION_START | Self::G001_REMOTE_ADOPTED)
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
