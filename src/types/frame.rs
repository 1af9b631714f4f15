//! Presentation frame: what the presentation layer renders

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{Decision, DecisionReason, ObservationSet, UiDirective};

/// One observed trait with its undo handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrait {
    /// Trait label; also the key to pass to `retract`
    #[serde(rename = "trait")]
    pub name: String,
    /// Directive the trait was given under
    pub source: UiDirective,
}

/// Output structure for each adopted decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationFrame {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Message to show (replaced by a busy text while loading)
    pub message: String,
    /// Screen kind
    pub ui_directive: UiDirective,
    /// Progress 0-100
    pub progress: u8,
    /// Confidence 0.0-1.0
    pub confidence: f64,
    /// Selectable options
    pub options: Vec<String>,
    /// A consult is in flight, input must be disabled
    pub loading: bool,
    /// Circuit breaker open, show the offline banner
    pub offline: bool,
    /// Why the session went offline, if it did
    pub notice: Option<String>,
    /// Observed traits, each rendered with an undo control
    pub observed: Vec<ObservedTrait>,
    /// Final answer once concluded
    pub identified_mineral: Option<String>,
    /// Which path produced the decision
    pub reason: DecisionReason,
}

impl PresentationFrame {
    /// Build a frame from session parts
    pub fn new(
        decision: &Decision,
        observations: &ObservationSet,
        loading: bool,
        offline: bool,
        notice: Option<String>,
        reason: DecisionReason,
    ) -> Self {
        let message = if loading {
            "Processing...".to_string()
        } else {
            decision.display_message.clone()
        };
        Self {
            timestamp: Utc::now(),
            message,
            ui_directive: decision.ui_directive,
            progress: decision.progress,
            confidence: decision.confidence,
            options: decision.options.clone(),
            loading,
            offline,
            notice,
            observed: observations
                .iter()
                .map(|(name, obs)| ObservedTrait {
                    name: name.to_string(),
                    source: obs.source,
                })
                .collect(),
            identified_mineral: decision.identified_mineral.clone(),
            reason,
        }
    }

    /// Low but non-zero confidence, rendered as an unstable signal
    pub fn is_uncertain(&self) -> bool {
        self.confidence > 0.0 && self.confidence < 0.4
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let banner = if self.offline {
            "⚠ OFFLINE".yellow().bold().to_string()
        } else {
            "● ONLINE".green().bold().to_string()
        };
        let conf = format!("{:.0}%", self.confidence * 100.0);
        let conf = if self.confidence < 0.3 {
            conf.red()
        } else if self.confidence < 0.7 {
            conf.yellow()
        } else {
            conf.green()
        };

        format!(
            "{} {} [{}] {} | progress={}% | conf={}",
            banner,
            self.ui_directive.emoji(),
            self.ui_directive,
            self.message.bold(),
            self.progress,
            conf
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "directive={} | progress={} | confidence={:.2} | offline={} | reason={} | message={}",
            self.ui_directive.as_str(),
            self.progress,
            self.confidence,
            self.offline,
            self.reason.code(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;

    #[test]
    fn test_frame_lists_observed_traits_in_order() {
        let mut set = ObservationSet::new();
        set.insert("Yellow", Observation::selected(UiDirective::Observation));
        set.insert("Metallic", Observation::selected(UiDirective::PhysicalTest));

        let frame = PresentationFrame::new(
            &Decision::initial(),
            &set,
            false,
            false,
            None,
            DecisionReason::G000_SESSION_START,
        );
        let names: Vec<_> = frame.observed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Yellow", "Metallic"]);
        assert_eq!(frame.observed[1].source, UiDirective::PhysicalTest);
    }

    #[test]
    fn test_loading_frame_hides_message() {
        let frame = PresentationFrame::new(
            &Decision::initial(),
            &ObservationSet::new(),
            true,
            false,
            None,
            DecisionReason::G000_SESSION_START,
        );
        assert_eq!(frame.message, "Processing...");
        assert!(frame.loading);
    }

    #[test]
    fn test_parseable_string() {
        let frame = PresentationFrame::new(
            &Decision::initial(),
            &ObservationSet::new(),
            false,
            true,
            None,
            DecisionReason::G000_SESSION_START,
        );
        let line = frame.to_parseable_string();
        assert!(line.starts_with("directive=start | progress=0"));
        assert!(line.contains("offline=true"));
    }
}
