//! Session Orchestrator: observation bookkeeping, engine choice, failover
//!
//! State transitions:
//! - START → question: any accepted action, consulted with no observations
//! - question → question: select (add trait) or retract (remove trait)
//! - question → CONCLUSION: engine concludes (terminal)
//! - any → START: explicit reset (clears history, traits and breaker)
//!
//! An action is split in three so the remote call can run without holding
//! the session: `begin_*` validates and builds a [`PendingConsult`],
//! [`consult`] picks an engine, and [`Session::complete`] commits the
//! candidate state together with the adopted decision. Nothing is committed
//! before a decision exists, so the traits shown always match what was
//! evaluated.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::fallback::local_decision;
use crate::core::remote::RemoteEngine;
use crate::error::{ServiceErrorKind, SessionError};
use crate::types::{
    ActionKind, Decision, DecisionReason, History, Observation, ObservationSet, PresentationFrame,
    Turn,
};

/// History annotation for the start action
pub const START_SUBJECT: &str = "Start Session";

/// Candidate state for one user action, not yet committed
#[derive(Debug, Clone)]
pub struct PendingConsult {
    /// Added or removed
    pub action: ActionKind,
    /// Option or trait the action names
    pub subject: String,
    /// Observation set the engines evaluate
    pub observations: ObservationSet,
    /// History including the new user turn
    pub history: History,
    /// Breaker state when the action began
    pub circuit_open: bool,
}

/// Result of consulting an engine
#[derive(Debug, Clone)]
pub enum ConsultOutcome {
    /// Remote engine answered
    Remote(Decision),
    /// Local engine answered
    Local {
        decision: Decision,
        reason: DecisionReason,
        /// Open the breaker when committing
        trip: bool,
        /// Remote failure that caused the fallback, if any
        failure: Option<ServiceErrorKind>,
    },
}

impl ConsultOutcome {
    pub fn decision(&self) -> &Decision {
        match self {
            ConsultOutcome::Remote(d) => d,
            ConsultOutcome::Local { decision, .. } => decision,
        }
    }
}

/// Consult an engine for a pending action.
///
/// Exactly one remote attempt unless the breaker is open or no remote engine
/// exists. A failed attempt is not retried; the local engine answers from the
/// same observation set that would have been sent.
pub async fn consult(engine: Option<&dyn RemoteEngine>, pending: &PendingConsult) -> ConsultOutcome {
    let engine = match engine {
        Some(engine) if !pending.circuit_open => engine,
        Some(_) => return local(pending, false, None),
        None => return local(pending, true, None),
    };

    match engine
        .ask(pending.history.to_vec(), pending.observations.clone())
        .await
    {
        Ok(decision) => match decision.validate() {
            Ok(()) => ConsultOutcome::Remote(decision),
            Err(reason) => {
                warn!(%reason, "remote decision rejected, circuit breaker open for this session");
                local(pending, true, Some(ServiceErrorKind::Malformed))
            }
        },
        Err(err) => {
            warn!(error = %err, "remote engine failed, circuit breaker open for this session");
            local(pending, true, Some(err.kind()))
        }
    }
}

fn local(pending: &PendingConsult, trip: bool, failure: Option<ServiceErrorKind>) -> ConsultOutcome {
    let (decision, reason) = local_decision(&pending.observations);
    ConsultOutcome::Local {
        decision,
        reason,
        trip,
        failure,
    }
}

/// One identification session
#[derive(Debug, Clone)]
pub struct Session {
    observations: ObservationSet,
    history: History,
    circuit_open: bool,
    decision: Decision,
    reason: DecisionReason,
    busy: bool,
    last_failure: Option<ServiceErrorKind>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create new session at START
    pub fn new() -> Self {
        Self {
            observations: ObservationSet::new(),
            history: History::new(),
            circuit_open: false,
            decision: Decision::initial(),
            reason: DecisionReason::G000_SESSION_START,
            busy: false,
            last_failure: None,
        }
    }

    /// Validate a selection and build its candidate state. Marks the session busy.
    pub fn begin_select(&mut self, option: &str) -> Result<PendingConsult, SessionError> {
        self.check_accepting()?;
        if !self.decision.offers(option) {
            return Err(SessionError::UnknownOption {
                option: option.to_string(),
            });
        }

        let mut observations = self.observations.clone();
        let subject = if !self.decision.ui_directive.is_question() {
            // Only START gets here (conclusions were rejected above).
            // Start is not an observation: consult with an empty set
            observations = ObservationSet::new();
            START_SUBJECT.to_string()
        } else {
            observations.insert(option, Observation::selected(self.decision.ui_directive));
            option.to_string()
        };

        Ok(self.begin(ActionKind::Selected, subject, observations))
    }

    /// Validate a retraction and build its candidate state. Marks the session busy.
    pub fn begin_retract(&mut self, name: &str) -> Result<PendingConsult, SessionError> {
        self.check_accepting()?;
        let mut observations = self.observations.clone();
        if observations.remove(name).is_none() {
            return Err(SessionError::UnknownTrait {
                name: name.to_string(),
            });
        }
        Ok(self.begin(ActionKind::Removed, name.to_string(), observations))
    }

    fn check_accepting(&self) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        if self.decision.is_conclusion() {
            return Err(SessionError::Concluded);
        }
        Ok(())
    }

    fn begin(&mut self, action: ActionKind, subject: String, observations: ObservationSet) -> PendingConsult {
        let mut history = self.history.clone();
        history.push(Turn::user_action(action, &subject));
        self.busy = true;
        debug!(action = action.as_str(), %subject, evidence = observations.len(), "consult started");
        PendingConsult {
            action,
            subject,
            observations,
            history,
            circuit_open: self.circuit_open,
        }
    }

    /// Commit a pending action with its adopted decision
    pub fn complete(&mut self, pending: PendingConsult, outcome: ConsultOutcome) -> &Decision {
        self.observations = pending.observations;
        self.history = pending.history;

        match outcome {
            ConsultOutcome::Remote(mut decision) => {
                decision.enforce_message_limit();
                let content = serde_json::to_string(&decision).unwrap_or_default();
                self.history.push(Turn::assistant(content));
                self.decision = decision;
                self.reason = DecisionReason::G001_REMOTE_ADOPTED;
            }
            ConsultOutcome::Local {
                mut decision,
                reason,
                trip,
                failure,
            } => {
                if trip && !self.circuit_open {
                    info!("session switched to local engine");
                }
                self.circuit_open |= trip;
                if failure.is_some() {
                    self.last_failure = failure;
                }
                decision.enforce_message_limit();
                self.decision = decision;
                self.reason = reason;
            }
        }

        self.busy = false;
        debug!(
            reason = self.reason.code(),
            directive = self.decision.ui_directive.as_str(),
            evidence = self.observations.len(),
            "decision adopted"
        );
        &self.decision
    }

    /// Drop a pending action without committing anything
    pub fn abort(&mut self) {
        self.busy = false;
    }

    /// Back to START: clears traits, history and the breaker
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current decision
    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    /// Why the current decision was produced
    pub fn reason(&self) -> DecisionReason {
        self.reason
    }

    /// Observed traits
    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    /// Conversation history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Is the breaker open (offline banner)?
    pub fn is_offline(&self) -> bool {
        self.circuit_open
    }

    /// Is a consult in flight?
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Has the session concluded?
    pub fn is_concluded(&self) -> bool {
        self.decision.is_conclusion()
    }

    /// Remote failure that opened the breaker, if any
    pub fn last_failure(&self) -> Option<ServiceErrorKind> {
        self.last_failure
    }

    /// Frame for the presentation layer
    pub fn frame(&self) -> PresentationFrame {
        PresentationFrame::new(
            &self.decision,
            &self.observations,
            self.busy,
            self.circuit_open,
            self.last_failure.map(|k| k.notice().to_string()),
            self.reason,
        )
    }
}

/// A session paired with its (optional) remote engine
pub struct Orchestrator {
    session: Session,
    remote: Option<Arc<dyn RemoteEngine>>,
}

impl Orchestrator {
    /// Orchestrator that consults `remote` until it fails
    pub fn new(remote: Arc<dyn RemoteEngine>) -> Self {
        Self {
            session: Session::new(),
            remote: Some(remote),
        }
    }

    /// Orchestrator without a remote engine (local from the first action)
    pub fn offline() -> Self {
        Self {
            session: Session::new(),
            remote: None,
        }
    }

    /// Pick an option
    pub async fn select(&mut self, option: &str) -> Result<&Decision, SessionError> {
        let pending = self.session.begin_select(option)?;
        Ok(self.run(pending).await)
    }

    /// Retract an observed trait
    pub async fn retract(&mut self, name: &str) -> Result<&Decision, SessionError> {
        let pending = self.session.begin_retract(name)?;
        Ok(self.run(pending).await)
    }

    async fn run(&mut self, pending: PendingConsult) -> &Decision {
        let outcome = consult(self.remote.as_deref(), &pending).await;
        self.session.complete(pending, outcome)
    }

    /// Start a new sample
    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn frame(&self) -> PresentationFrame {
        self.session.frame()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::types::{UiDirective, START_OPTION};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always fails with 500-equivalent
    struct DownEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteEngine for DownEngine {
        async fn ask(&self, _: Vec<Turn>, _: ObservationSet) -> Result<Decision, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::unavailable("500"))
        }
    }

    /// Always asks the same luster question
    struct LusterEngine;

    #[async_trait]
    impl RemoteEngine for LusterEngine {
        async fn ask(&self, _: Vec<Turn>, _: ObservationSet) -> Result<Decision, ServiceError> {
            Ok(Decision::question(
                "Observe luster.",
                UiDirective::PhysicalTest,
                30,
                0.2,
                &["Glassy", "Metallic", "Unsure"],
            ))
        }
    }

    /// Asks a question with nothing to answer
    struct NoOptionsEngine;

    #[async_trait]
    impl RemoteEngine for NoOptionsEngine {
        async fn ask(&self, _: Vec<Turn>, _: ObservationSet) -> Result<Decision, ServiceError> {
            Ok(Decision::question("Observe color.", UiDirective::Observation, 15, 0.1, &[]))
        }
    }

    #[test]
    fn test_initial_state_is_start() {
        let session = Session::new();
        assert_eq!(session.decision().ui_directive, UiDirective::Start);
        assert_eq!(session.reason(), DecisionReason::G000_SESSION_START);
        assert!(!session.is_offline());
        assert!(session.observations().is_empty());
    }

    #[tokio::test]
    async fn test_offline_start_asks_color() {
        let mut orch = Orchestrator::offline();
        let decision = orch.select(START_OPTION).await.unwrap();
        assert_eq!(decision.progress, 15);
        assert!((decision.confidence - 0.1).abs() < 1e-9);
        assert!(orch.session().is_offline());
        // No remote failure happened, so no notice
        assert!(orch.frame().notice.is_none());
    }

    #[tokio::test]
    async fn test_remote_failure_trips_breaker() {
        let engine = Arc::new(DownEngine {
            calls: AtomicUsize::new(0),
        });
        let mut orch = Orchestrator::new(engine.clone());

        orch.select(START_OPTION).await.unwrap();
        assert!(orch.session().is_offline());
        assert_eq!(orch.session().last_failure(), Some(ServiceErrorKind::Unavailable));
        assert_eq!(
            orch.frame().notice.as_deref(),
            Some("Connection unstable. Retrying...")
        );

        orch.select("Red").await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1, "no re-attempt once open");
    }

    #[tokio::test]
    async fn test_question_without_options_falls_back() {
        let mut orch = Orchestrator::new(Arc::new(NoOptionsEngine));
        let decision = orch.select(START_OPTION).await.unwrap().clone();

        assert!(!decision.options.is_empty());
        assert_eq!(orch.session().reason(), DecisionReason::G004_SCRIPT_STEP);
        assert!(orch.session().is_offline());
        assert_eq!(orch.session().last_failure(), Some(ServiceErrorKind::Malformed));

        // The user can keep answering
        orch.select("Red").await.unwrap();
        assert!(orch.session().observations().contains("Red"));
    }

    #[tokio::test]
    async fn test_remote_success_appends_assistant_turn() {
        let mut orch = Orchestrator::new(Arc::new(LusterEngine));
        orch.select(START_OPTION).await.unwrap();
        orch.select("Glassy").await.unwrap();

        let session = orch.session();
        assert!(!session.is_offline());
        assert_eq!(session.reason(), DecisionReason::G001_REMOTE_ADOPTED);
        let source = session.observations().get("glassy").unwrap().source;
        assert_eq!(source, UiDirective::PhysicalTest);
        // start user + assistant, select user + assistant
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn test_busy_blocks_actions() {
        let mut session = Session::new();
        let pending = session.begin_select(START_OPTION).unwrap();
        assert!(session.is_busy());
        assert!(session.frame().loading);
        assert_eq!(session.begin_select(START_OPTION).unwrap_err(), SessionError::Busy);

        let (decision, reason) = local_decision(&pending.observations);
        session.complete(
            pending,
            ConsultOutcome::Local {
                decision,
                reason,
                trip: true,
                failure: None,
            },
        );
        assert!(!session.is_busy());
    }

    #[test]
    fn test_state_untouched_until_complete() {
        let mut session = Session::new();
        let pending = session.begin_select(START_OPTION).unwrap();
        let outcome = ConsultOutcome::Local {
            decision: local_decision(&pending.observations).0,
            reason: DecisionReason::G004_SCRIPT_STEP,
            trip: true,
            failure: None,
        };
        session.complete(pending, outcome);

        let pending = session.begin_select("Red").unwrap();
        assert!(pending.observations.contains("Red"));
        assert!(!session.observations().contains("Red"));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_option_rejected() {
        let mut orch = Orchestrator::offline();
        orch.select(START_OPTION).await.unwrap();
        let err = orch.select("Purple").await.unwrap_err();
        assert_eq!(
            err,
            SessionError::UnknownOption {
                option: "Purple".to_string()
            }
        );
        assert!(!orch.session().is_busy());
    }

    #[tokio::test]
    async fn test_retract_unknown_trait() {
        let mut orch = Orchestrator::offline();
        orch.select(START_OPTION).await.unwrap();
        let err = orch.retract("Glassy").await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownTrait { .. }));
    }

    #[tokio::test]
    async fn test_concluded_session_rejects_actions_until_reset() {
        let mut orch = Orchestrator::offline();
        orch.select(START_OPTION).await.unwrap();
        for option in ["Gold", "Metallic"] {
            orch.select(option).await.unwrap();
        }
        orch.select("Opaque").await.unwrap();
        orch.select("Unsure").await.unwrap();
        orch.select("No Streak").await.unwrap();
        let decision = orch.select("Cubic").await.unwrap().clone();
        assert!(decision.is_conclusion());

        assert_eq!(orch.select("Cubic").await.unwrap_err(), SessionError::Concluded);
        assert_eq!(orch.retract("Gold").await.unwrap_err(), SessionError::Concluded);

        orch.reset();
        assert_eq!(orch.session().decision().ui_directive, UiDirective::Start);
        assert!(orch.session().observations().is_empty());
        assert!(orch.session().history().is_empty());
        assert!(!orch.session().is_offline());
    }
}
