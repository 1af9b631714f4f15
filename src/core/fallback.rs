//! Deterministic Fallback Script
//!
//! Fixed six-question order used once the remote engine is unreachable:
//! Color → Luster → Transparency → Hardness → Streak → Crystal shape/Fracture.
//!
//! Script confidence tracks schedule progress (0.1 … 0.6), not evidence. It
//! is deliberately kept separate from inference confidence.

use tracing::{debug, error};

use crate::core::inference::infer;
use crate::types::{Decision, DecisionReason, MatchResult, ObservationSet, UiDirective};
use crate::{EARLY_EXIT_CONFIDENCE, MERCY_EVIDENCE_LIMIT, MERCY_MIN_CONFIDENCE};

/// Mineral reported when the mercy rule finds nothing usable
pub const UNKNOWN_MINERAL: &str = "Unknown / Insufficient Data";

/// Mineral reported by the safety net
pub const SEQUENCE_ERROR_MINERAL: &str = "Error";

/// One scripted question
#[derive(Debug, Clone, Copy)]
pub struct ScriptStep {
    pub category: &'static str,
    pub message: &'static str,
    pub directive: UiDirective,
    pub progress: u8,
    pub confidence: f64,
    pub options: &'static [&'static str],
}

impl ScriptStep {
    fn to_decision(&self) -> Decision {
        Decision::question(
            self.message,
            self.directive,
            self.progress,
            self.confidence,
            self.options,
        )
    }
}

/// The script, indexed by evidence count
pub static FALLBACK_SCRIPT: &[ScriptStep] = &[
    ScriptStep {
        category: "Color",
        message: "[OFFLINE] Mode: Deterministic Logic. Observe Color.",
        directive: UiDirective::Observation,
        progress: 15,
        confidence: 0.1,
        options: &["Colorless", "White", "Grey", "Black", "Red", "Green", "Yellow", "Gold", "Silver"],
    },
    ScriptStep {
        category: "Luster",
        message: "[OFFLINE] Color recorded. Observe Luster (Reflection).",
        directive: UiDirective::PhysicalTest,
        progress: 30,
        confidence: 0.2,
        options: &["Glassy", "Metallic", "Pearly", "Dull", "Waxy", "Greasy"],
    },
    ScriptStep {
        category: "Transparency",
        message: "[OFFLINE] Luster recorded. Check Transparency.",
        directive: UiDirective::Observation,
        progress: 45,
        confidence: 0.3,
        options: &["Transparent", "Translucent", "Opaque"],
    },
    ScriptStep {
        category: "Hardness",
        message: "[OFFLINE] Check Hardness. Can it scratch glass?",
        directive: UiDirective::PhysicalTest,
        progress: 60,
        confidence: 0.4,
        options: &["Hard (>5.5)", "Soft (<5.5)", "Unsure"],
    },
    ScriptStep {
        category: "Streak",
        message: "[OFFLINE] Perform Streak Test (Rub on ceramic plate).",
        directive: UiDirective::PhysicalTest,
        progress: 75,
        confidence: 0.5,
        options: &["White Streak", "Black Streak", "Red Streak", "Grey Streak", "No Streak", "Unsure"],
    },
    ScriptStep {
        category: "Crystal Shape / Fracture",
        message: "[OFFLINE] Final check. Observe Crystal Shape or Fracture.",
        directive: UiDirective::Observation,
        progress: 90,
        confidence: 0.6,
        options: &["Cubic", "Hexagonal", "Rhombohedral", "Massive", "Conchoidal", "Fibrous", "None"],
    },
];

/// Next scripted question for an evidence count.
///
/// Past the end of the script this returns the terminal `Error` decision.
/// The mercy rule concludes at six observations, so reaching it is a defect.
pub fn next_fallback_step(evidence_count: usize) -> (Decision, DecisionReason) {
    match FALLBACK_SCRIPT.get(evidence_count) {
        Some(step) => (step.to_decision(), DecisionReason::G004_SCRIPT_STEP),
        None => {
            error!(evidence_count, "fallback script exhausted before the mercy rule concluded");
            (sequence_exhausted(), DecisionReason::G005_SEQUENCE_EXHAUSTED)
        }
    }
}

fn sequence_exhausted() -> Decision {
    Decision::conclusion("Error: Sequence limit.", 0, 0.0, SEQUENCE_ERROR_MINERAL)
}

/// Full offline decision for an observation set:
/// early exit, then the mercy rule, then the script.
pub fn local_decision(observations: &ObservationSet) -> (Decision, DecisionReason) {
    let evidence = observations.len();
    let best = infer(observations);
    let candidate = best
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "none".to_string());
    debug!(evidence, %candidate, "local inference");
    decide(evidence, best)
}

fn decide(evidence: usize, best: Option<MatchResult>) -> (Decision, DecisionReason) {
    if let Some(m) = best.as_ref().filter(|m| m.confidence > EARLY_EXIT_CONFIDENCE) {
        return (
            Decision::conclusion(
                format!("[OFFLINE] Strong Match: {}", m.name),
                100,
                m.confidence,
                m.name.clone(),
            ),
            DecisionReason::G002_EARLY_EXIT,
        );
    }

    if evidence >= MERCY_EVIDENCE_LIMIT {
        return match best.filter(|m| m.confidence > MERCY_MIN_CONFIDENCE) {
            Some(m) => (
                Decision::conclusion(
                    format!("[OFFLINE] Best possible match: {} (Low Confidence)", m.name),
                    100,
                    m.confidence,
                    format!("{}?", m.name),
                ),
                DecisionReason::G003_MERCY_BEST_GUESS,
            ),
            None => (
                Decision::conclusion(
                    "[OFFLINE] Logic Constraints: No matching mineral found in database.",
                    100,
                    0.0,
                    UNKNOWN_MINERAL,
                ),
                DecisionReason::G003_MERCY_UNKNOWN,
            ),
        };
    }

    next_fallback_step(evidence)
}
