//! GeoScout: guided mineral identification
//!
//! A session asks visual/physical observation questions and converges on a
//! mineral. Decisions come from a remote reasoning service while it is
//! reachable, and from the deterministic local engine (rule scoring plus a
//! fixed question script) once the circuit breaker has tripped.

pub mod config;
pub mod core;
pub mod error;
pub mod types;

// =============================================================================
// DECISION LIMITS
// =============================================================================

/// Hard cap on `display_message` length (characters)
pub const MAX_MESSAGE_CHARS: usize = 120;

/// Marker appended to truncated messages
pub const TRUNCATION_MARKER: &str = "...";

/// Conversation turns kept for the remote engine (oldest evicted)
pub const HISTORY_CAPACITY: usize = 6;

// =============================================================================
// LOCAL INFERENCE [C]
// =============================================================================

/// Corroborating traits needed for a "solid" identification.
/// Confidence = min(match_count / baseline, 1.0), independent of rule size.
pub const CONFIDENCE_BASELINE: f64 = 4.0;

/// Inference confidence above which the offline path concludes immediately
pub const EARLY_EXIT_CONFIDENCE: f64 = 0.7;

/// Inference confidence above which the mercy rule reports a best guess
pub const MERCY_MIN_CONFIDENCE: f64 = 0.4;

/// Evidence count at which the offline path stops asking questions
pub const MERCY_EVIDENCE_LIMIT: usize = 6;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
