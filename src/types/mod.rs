//! Core types for GeoScout

mod directive;
mod observation;
mod decision;
mod mineral;
mod reason;
mod turn;
mod frame;

pub use directive::UiDirective;
pub use observation::{canonical_trait, Observation, ObservationSet, ObservationValue};
pub use decision::{truncate_message, Decision, INITIAL_MESSAGE, RETRY_OPTION, START_OPTION};
pub use mineral::{MatchResult, MineralRule};
pub use reason::DecisionReason;
pub use turn::{ActionKind, History, Turn, TurnRole};
pub use frame::{ObservedTrait, PresentationFrame};
