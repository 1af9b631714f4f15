//! Decision: the unit exchanged with the presentation layer
//!
//! Both engines produce the same fixed-shape structure. A decision replaces
//! the previous one wholesale; nothing is merged.

use serde::{Deserialize, Serialize};

use crate::types::{canonical_trait, UiDirective};
use crate::{MAX_MESSAGE_CHARS, TRUNCATION_MARKER};

/// Message shown before the session starts
pub const INITIAL_MESSAGE: &str = "System Ready. Initialize session to begin identification.";

/// The single option offered at `start`
pub const START_OPTION: &str = "Start Identification";

/// Option offered by degraded responses
pub const RETRY_OPTION: &str = "Retry";

/// Structured decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Text for the user (at most 120 characters once enforced)
    pub display_message: String,
    /// Next screen
    #[serde(alias = "ui_component")]
    pub ui_directive: UiDirective,
    /// Progress 0-100
    pub progress: u8,
    /// Confidence 0.0-1.0 (meaning depends on the producing engine)
    pub confidence: f64,
    /// Selectable options, in display order
    pub options: Vec<String>,
    /// Mineral name once concluded
    pub identified_mineral: Option<String>,
    /// Knowledge-base categories the remote engine considers answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_categories: Option<Vec<String>>,
}

impl Decision {
    /// Decision shown at session start and after reset
    pub fn initial() -> Self {
        Self {
            display_message: INITIAL_MESSAGE.to_string(),
            ui_directive: UiDirective::Start,
            progress: 0,
            confidence: 0.0,
            options: vec![START_OPTION.to_string()],
            identified_mineral: None,
            completed_categories: None,
        }
    }

    /// Question decision
    pub fn question(
        message: impl Into<String>,
        directive: UiDirective,
        progress: u8,
        confidence: f64,
        options: &[&str],
    ) -> Self {
        Self {
            display_message: truncate_message(&message.into()),
            ui_directive: directive,
            progress,
            confidence,
            options: options.iter().map(|o| o.to_string()).collect(),
            identified_mineral: None,
            completed_categories: None,
        }
    }

    /// Terminal decision
    pub fn conclusion(
        message: impl Into<String>,
        progress: u8,
        confidence: f64,
        mineral: impl Into<String>,
    ) -> Self {
        Self {
            display_message: truncate_message(&message.into()),
            ui_directive: UiDirective::Conclusion,
            progress,
            confidence,
            options: Vec::new(),
            identified_mineral: Some(mineral.into()),
            completed_categories: None,
        }
    }

    /// Degraded decision returned by the identify operation on failure.
    /// Still a valid decision, so the presentation layer needs no error path.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            display_message: truncate_message(&message.into()),
            ui_directive: UiDirective::PhysicalTest,
            progress: 0,
            confidence: 0.0,
            options: vec![RETRY_OPTION.to_string()],
            identified_mineral: None,
            completed_categories: None,
        }
    }

    /// Is this a terminal decision?
    pub fn is_conclusion(&self) -> bool {
        self.ui_directive.is_terminal()
    }

    /// Does the decision offer this option (case-insensitive)?
    pub fn offers(&self, option: &str) -> bool {
        let wanted = canonical_trait(option);
        self.options.iter().any(|o| canonical_trait(o) == wanted)
    }

    /// Apply the 120-character guard. Returns true if the message was cut.
    pub fn enforce_message_limit(&mut self) -> bool {
        if self.display_message.chars().count() <= MAX_MESSAGE_CHARS {
            return false;
        }
        self.display_message = truncate_message(&self.display_message);
        true
    }

    /// Range checks that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.progress > 100 {
            return Err(format!("progress {} is out of range [0, 100]", self.progress));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} is out of range [0.0, 1.0]", self.confidence));
        }
        // A question without options leaves the user nothing to press
        if !self.is_conclusion() && self.options.is_empty() {
            return Err(format!("{} decision has no options", self.ui_directive.as_str()));
        }
        Ok(())
    }
}

/// Cut a message to the display limit, marking the cut with an ellipsis.
///
/// Counts characters, not bytes, so multi-byte mineral formulas never split.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_MARKER.chars().count();
    let mut cut: String = message.chars().take(keep).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}
