//! UI directive definitions

use serde::{Deserialize, Serialize};

/// Which kind of screen the presentation layer should show next.
///
/// Also recorded as the `source` of every observation: the directive that was
/// active when the user picked the option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiDirective {
    /// Session not started yet, only the start action is offered
    Start,
    /// Visual observation question (color, transparency, shape)
    Observation,
    /// Hands-on test (luster under light, hardness, streak)
    PhysicalTest,
    /// Chemical test (acid reaction, taste)
    ChemicalTest,
    /// Terminal state, identification finished
    Conclusion,
}

impl UiDirective {
    /// Wire name, identical to the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UiDirective::Start => "start",
            UiDirective::Observation => "observation",
            UiDirective::PhysicalTest => "physical_test",
            UiDirective::ChemicalTest => "chemical_test",
            UiDirective::Conclusion => "conclusion",
        }
    }

    /// Is this the terminal state?
    pub fn is_terminal(&self) -> bool {
        matches!(self, UiDirective::Conclusion)
    }

    /// Does this directive ask a question (i.e. options are observations)?
    pub fn is_question(&self) -> bool {
        matches!(
            self,
            UiDirective::Observation | UiDirective::PhysicalTest | UiDirective::ChemicalTest
        )
    }

    /// Get emoji for terminal display
    pub fn emoji(&self) -> &'static str {
        match self {
            UiDirective::Start => "⏳",
            UiDirective::Observation => "🔍",
            UiDirective::PhysicalTest => "🔨",
            UiDirective::ChemicalTest => "🧪",
            UiDirective::Conclusion => "💎",
        }
    }
}

impl std::fmt::Display for UiDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UiDirective::Start => "START",
            UiDirective::Observation => "OBSERVATION",
            UiDirective::PhysicalTest => "PHYSICAL_TEST",
            UiDirective::ChemicalTest => "CHEMICAL_TEST",
            UiDirective::Conclusion => "CONCLUSION",
        };
        write!(f, "{}", name)
    }
}
