//! Integration tests for the session orchestrator
//!
//! Tests the full path: user action → consult (remote or local) → commit → frame

use async_trait::async_trait;
use geoscout::core::fallback::UNKNOWN_MINERAL;
use geoscout::core::{Orchestrator, RemoteEngine};
use geoscout::error::{ServiceError, ServiceErrorKind, SessionError};
use geoscout::types::{Decision, DecisionReason, ObservationSet, Turn, TurnRole, UiDirective, START_OPTION};
use geoscout::{HISTORY_CAPACITY, MAX_MESSAGE_CHARS};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fails the first `failures` calls, then answers with a colour question
struct FlakyEngine {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyEngine {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteEngine for FlakyEngine {
    async fn ask(&self, _: Vec<Turn>, _: ObservationSet) -> Result<Decision, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ServiceError::RateLimited);
        }
        Ok(Decision::question(
            "Observe color.",
            UiDirective::Observation,
            10,
            0.1,
            &["Red", "Black", "Other"],
        ))
    }
}

/// Answers with whatever it is given, recording every request
struct ScriptedEngine {
    reply: Decision,
    requests: Mutex<Vec<(Vec<Turn>, ObservationSet)>>,
}

impl ScriptedEngine {
    fn new(reply: Decision) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteEngine for ScriptedEngine {
    async fn ask(&self, history: Vec<Turn>, observations: ObservationSet) -> Result<Decision, ServiceError> {
        self.requests.lock().unwrap().push((history, observations));
        Ok(self.reply.clone())
    }
}

// =============================================================================
// OFFLINE SCENARIOS
// =============================================================================

/// Offline start asks for colour
#[tokio::test]
async fn test_offline_start() {
    let mut orch = Orchestrator::offline();
    let decision = orch.select(START_OPTION).await.unwrap().clone();

    assert_eq!(decision.display_message, "[OFFLINE] Mode: Deterministic Logic. Observe Color.");
    assert_eq!(decision.ui_directive, UiDirective::Observation);
    assert_eq!(decision.progress, 15);
    assert!((decision.confidence - 0.1).abs() < 1e-9);
    assert!(decision.offers("Colorless"));
    assert!(decision.offers("Silver"));

    let frame = orch.frame();
    assert!(frame.offline);
    assert!(frame.observed.is_empty());
}

/// Six answers that match nothing conclude as unknown
#[tokio::test]
async fn test_offline_mercy_unknown() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();

    let answers = ["Green", "Waxy", "Translucent", "Unsure", "No Streak", "None"];
    for (i, answer) in answers.iter().enumerate() {
        let decision = orch.select(answer).await.unwrap().clone();
        if i + 1 < answers.len() {
            assert!(!decision.is_conclusion(), "concluded after {} answers", i + 1);
            assert_eq!(decision.progress, 15 * (i as u8 + 2));
        } else {
            assert_eq!(decision.ui_directive, UiDirective::Conclusion);
            assert_eq!(decision.identified_mineral.as_deref(), Some(UNKNOWN_MINERAL));
            assert_eq!(decision.confidence, 0.0);
            assert_eq!(decision.progress, 100);
        }
    }
    assert_eq!(orch.session().reason(), DecisionReason::G003_MERCY_UNKNOWN);
}

/// Enough evidence for a weak match concludes with a best guess
#[tokio::test]
async fn test_offline_mercy_best_guess() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();

    // Hematite gets Red + Dull = 2 matches (0.5)
    for answer in ["Red", "Dull", "Opaque", "Soft (<5.5)", "Red Streak", "None"] {
        orch.select(answer).await.unwrap();
    }
    let decision = orch.session().decision();
    assert_eq!(decision.identified_mineral.as_deref(), Some("Hematite (Fe₂O₃)?"));
    assert!((decision.confidence - 0.5).abs() < 1e-9);
    assert_eq!(orch.session().reason(), DecisionReason::G003_MERCY_BEST_GUESS);
}

/// Strong evidence exits the script early
#[tokio::test]
async fn test_offline_early_exit() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();
    orch.select("Colorless").await.unwrap();
    orch.select("Glassy").await.unwrap();
    let decision = orch.select("Transparent").await.unwrap().clone();

    // Quartz: Colorless, Glassy, Transparent = 3 → 0.75
    assert!(decision.is_conclusion());
    assert_eq!(decision.identified_mineral.as_deref(), Some("Quartz (SiO₂)"));
    assert_eq!(decision.display_message, "[OFFLINE] Strong Match: Quartz (SiO₂)");
    assert_eq!(orch.session().reason(), DecisionReason::G002_EARLY_EXIT);
}

// =============================================================================
// RETRACTION
// =============================================================================

/// Select then retract leaves the traits unchanged and the script rewinds
#[tokio::test]
async fn test_retract_restores_observations() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();
    orch.select("Red").await.unwrap();
    let before = orch.session().observations().clone();
    let before_progress = orch.session().decision().progress;

    orch.select("Dull").await.unwrap();
    assert_eq!(orch.session().observations().len(), 2);

    let decision = orch.retract("Dull").await.unwrap().clone();
    assert_eq!(orch.session().observations(), &before);
    assert_eq!(decision.progress, before_progress);
}

/// Retraction matches by canonical name
#[tokio::test]
async fn test_retract_is_case_insensitive() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();
    orch.select("Red").await.unwrap();
    orch.retract("  RED ").await.unwrap();
    assert!(orch.session().observations().is_empty());
}

/// Retracting twice fails the second time and changes nothing
#[tokio::test]
async fn test_double_retract() {
    let mut orch = Orchestrator::offline();
    orch.select(START_OPTION).await.unwrap();
    orch.select("Red").await.unwrap();
    orch.retract("Red").await.unwrap();
    let history_len = orch.session().history().len();

    let err = orch.retract("Red").await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownTrait { .. }));
    assert_eq!(orch.session().history().len(), history_len);
}

// =============================================================================
// CIRCUIT BREAKER
// =============================================================================

/// Once tripped, the remote is never consulted again even if it recovers
#[tokio::test]
async fn test_breaker_is_sticky() {
    let engine = Arc::new(FlakyEngine::new(1));
    let mut orch = Orchestrator::new(engine.clone());

    let decision = orch.select(START_OPTION).await.unwrap().clone();
    assert!(decision.display_message.starts_with("[OFFLINE]"));
    assert_eq!(orch.session().last_failure(), Some(ServiceErrorKind::RateLimited));
    assert_eq!(
        orch.frame().notice.as_deref(),
        Some("Daily quota exceeded. Switching to local engine...")
    );

    for answer in ["Red", "Dull", "Opaque"] {
        let decision = orch.select(answer).await.unwrap().clone();
        assert!(decision.display_message.starts_with("[OFFLINE]"));
    }
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

/// Reset closes the breaker and the remote is consulted again
#[tokio::test]
async fn test_reset_closes_breaker() {
    let engine = Arc::new(FlakyEngine::new(1));
    let mut orch = Orchestrator::new(engine.clone());
    orch.select(START_OPTION).await.unwrap();
    assert!(orch.session().is_offline());

    orch.reset();
    assert!(!orch.session().is_offline());
    assert!(orch.frame().notice.is_none());

    let decision = orch.select(START_OPTION).await.unwrap().clone();
    assert_eq!(decision.display_message, "Observe color.");
    assert_eq!(orch.session().reason(), DecisionReason::G001_REMOTE_ADOPTED);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// REMOTE PATH
// =============================================================================

/// Over-long remote messages are truncated before display
#[tokio::test]
async fn test_remote_message_truncated() {
    let mut reply = Decision::question("short", UiDirective::Observation, 10, 0.1, &["Red", "Other"]);
    reply.display_message = "x".repeat(300);
    let mut orch = Orchestrator::new(Arc::new(ScriptedEngine::new(reply)));

    let decision = orch.select(START_OPTION).await.unwrap().clone();
    assert_eq!(decision.display_message.chars().count(), MAX_MESSAGE_CHARS);
    assert!(decision.display_message.ends_with("..."));
    assert!(orch.frame().message.chars().count() <= MAX_MESSAGE_CHARS);
}

/// The remote sees the candidate observation set and a bounded history
#[tokio::test]
async fn test_remote_receives_candidate_state() {
    let reply = Decision::question("Observe color.", UiDirective::Observation, 10, 0.1, &["Red", "Dull", "Opaque", "Other"]);
    let engine = Arc::new(ScriptedEngine::new(reply));
    let mut orch = Orchestrator::new(engine.clone());

    orch.select(START_OPTION).await.unwrap();
    for answer in ["Red", "Dull", "Opaque", "Other"] {
        orch.select(answer).await.unwrap();
    }

    let requests = engine.requests.lock().unwrap();
    assert_eq!(requests.len(), 5);

    // Start is consulted with no observations
    let (history, observations) = &requests[0];
    assert!(observations.is_empty());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, TurnRole::User);
    assert_eq!(history[0].content, "User selected: Start Session");

    // The last request already contains the new trait
    let (history, observations) = &requests[4];
    assert!(observations.contains("Other"));
    assert_eq!(observations.len(), 4);
    assert!(history.len() <= HISTORY_CAPACITY);
    assert_eq!(history.last().map(|t| t.content.as_str()), Some("User selected: Other"));

    assert!(orch.session().history().len() <= HISTORY_CAPACITY);
}
