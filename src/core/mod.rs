//! Core modules for GeoScout

pub mod knowledge;
pub mod inference;
pub mod fallback;
pub mod prompt;
pub mod provider;
pub mod identify;
pub mod remote;
pub mod session;
pub mod api;

pub use inference::{infer, infer_with};
pub use fallback::{local_decision, next_fallback_step};
pub use provider::{ChatProvider, OpenAiCompatibleProvider};
pub use identify::{parse_decision, Identifier, IdentifyRequest};
pub use remote::{RemoteDecisionClient, RemoteEngine};
pub use session::{consult, ConsultOutcome, Orchestrator, PendingConsult, Session};
pub use api::{create_router, run_server, AppState};
