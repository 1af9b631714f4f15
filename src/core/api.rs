//! HTTP + WebSocket API for GeoScout
//!
//! Endpoints:
//! - POST /api/identify - Remote decision operation (history + observations → decision)
//! - POST /session/new - Create new session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/select - Pick an option
//! - POST /session/{id}/retract - Undo an observed trait
//! - POST /session/{id}/reset - Start a new sample
//! - DELETE /session/{id} - Drop a session
//! - WS /ws/{id} - Live presentation frames
//! - GET /health - Health check

use axum::{
    body::Bytes,
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::core::identify::{degraded_response, Identifier, IdentifyRequest};
use crate::core::remote::RemoteEngine;
use crate::core::session::{consult, PendingConsult, Session};
use crate::error::{ServiceErrorKind, SessionError};
use crate::types::{DecisionReason, PresentationFrame};

/// Idle time after which a session may be evicted
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Session plus its live-update channel
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Session,
    pub update_tx: broadcast::Sender<PresentationFrame>,
    /// Last request that touched the session
    pub last_active: Instant,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        let (update_tx, _) = broadcast::channel(100);
        Self {
            session,
            update_tx,
            last_active: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Broadcast and return the current frame
    fn publish(&self) -> PresentationFrame {
        let frame = self.session.frame();
        let _ = self.update_tx.send(frame.clone());
        frame
    }
}

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, SessionEntry>>,
    /// Serves `/api/identify`
    pub identifier: Option<Identifier>,
    /// Engine consulted by sessions
    pub remote: Option<Arc<dyn RemoteEngine>>,
    /// Idle sessions older than this are evicted when a new one is created
    pub session_ttl: Duration,
    next_id: AtomicU64,
}

impl AppState {
    pub fn new(identifier: Option<Identifier>, remote: Option<Arc<dyn RemoteEngine>>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            identifier,
            remote,
            session_ttl: DEFAULT_SESSION_TTL,
            next_id: AtomicU64::new(1),
        }
    }

    /// Override the idle eviction time
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sessions consult the identifier in-process
    pub fn with_identifier(identifier: Identifier) -> Self {
        let remote: Arc<dyn RemoteEngine> = Arc::new(identifier.clone());
        Self::new(Some(identifier), Some(remote))
    }

    /// No reasoning service: identify degrades, sessions run locally
    pub fn offline() -> Self {
        Self::new(None, None)
    }
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub frame: PresentationFrame,
}

/// Session status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub frame: PresentationFrame,
    pub reason: DecisionReason,
    /// Current decision came from the local engine
    pub local: bool,
    pub history_len: usize,
}

/// Select request
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub option: String,
}

/// Retract request
#[derive(Debug, Deserialize)]
pub struct RetractRequest {
    #[serde(rename = "trait")]
    pub name: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
    pub remote_configured: bool,
}

/// Error body for rejected session actions
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// API-level failures
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Session(SessionError),
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", "Session not found".to_string()),
            ApiError::Session(err) => {
                let (status, code) = match err {
                    SessionError::Busy => (StatusCode::CONFLICT, "BUSY"),
                    SessionError::Concluded => (StatusCode::CONFLICT, "CONCLUDED"),
                    SessionError::UnknownOption { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_OPTION"),
                    SessionError::UnknownTrait { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_TRAIT"),
                };
                (status, code, err.to_string())
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message),
        };
        (status, Json(ErrorResponse { error: message, code })).into_response()
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/identify", post(identify))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/select", post(select))
        .route("/session/:id/retract", post(retract))
        .route("/session/:id/reset", post(reset))
        .route("/ws/:id", get(websocket_handler))
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
        remote_configured: state.remote.is_some(),
    })
}

/// Identify operation. Failures answer with a degraded decision (503/500),
/// so callers never need a separate error body.
async fn identify(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: IdentifyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "identify request body rejected");
            return degraded(ServiceErrorKind::Unavailable);
        }
    };

    let Some(identifier) = state.identifier.as_ref() else {
        warn!("identify called without a reasoning service configured");
        return degraded(ServiceErrorKind::Unavailable);
    };

    match identifier.identify(&request).await {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => {
            warn!(error = %e, "identify failed");
            degraded(e.kind())
        }
    }
}

fn degraded(kind: ServiceErrorKind) -> Response {
    let (status, decision) = degraded_response(kind);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(decision)).into_response()
}

/// Create new session
async fn create_session(State(state): State<Arc<AppState>>) -> Json<NewSessionResponse> {
    let session_id = generate_session_id(state.next_id.fetch_add(1, Ordering::Relaxed));
    let entry = SessionEntry::new(Session::new());
    let frame = entry.session.frame();

    let mut sessions = state.sessions.write().await;
    evict_idle(&mut sessions, state.session_ttl);
    sessions.insert(session_id.clone(), entry);

    Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
        frame,
    })
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or(ApiError::NotFound)?;

    Ok(Json(SessionStatusResponse {
        session_id: id,
        frame: entry.session.frame(),
        reason: entry.session.reason(),
        local: entry.session.reason().is_local(),
        history_len: entry.session.history().len(),
    }))
}

/// Pick an option
async fn select(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<PresentationFrame>, ApiError> {
    let pending = begin(&state, &id, |session| session.begin_select(&req.option)).await?;
    run_consult(&state, &id, pending).await
}

/// Undo an observed trait
async fn retract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RetractRequest>,
) -> Result<Json<PresentationFrame>, ApiError> {
    let pending = begin(&state, &id, |session| session.begin_retract(&req.name)).await?;
    run_consult(&state, &id, pending).await
}

/// Start a new sample
async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PresentationFrame>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or(ApiError::NotFound)?;
    if entry.session.is_busy() {
        return Err(SessionError::Busy.into());
    }
    entry.session.reset();
    entry.touch();
    Ok(Json(entry.publish()))
}

/// Drop a session. A consult still in flight is discarded when it finishes.
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut sessions = state.sessions.write().await;
    sessions.remove(&id).ok_or(ApiError::NotFound)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove sessions idle for at least `ttl`. Busy sessions are kept.
fn evict_idle(sessions: &mut HashMap<String, SessionEntry>, ttl: Duration) {
    let before = sessions.len();
    sessions.retain(|_, entry| entry.session.is_busy() || entry.last_active.elapsed() < ttl);
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, "idle sessions evicted");
    }
}

/// Validate under the lock and mark busy; the lock is released before the consult
async fn begin<F>(state: &AppState, id: &str, start: F) -> Result<PendingConsult, ApiError>
where
    F: FnOnce(&mut Session) -> Result<PendingConsult, SessionError>,
{
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(id).ok_or(ApiError::NotFound)?;
    let pending = start(&mut entry.session)?;
    entry.touch();
    entry.publish();
    Ok(pending)
}

/// Consult without holding the lock, then commit.
///
/// Consult and commit run in a detached task: if the client goes away the
/// handler future is dropped, but the session still resolves and leaves busy.
async fn run_consult(
    state: &Arc<AppState>,
    id: &str,
    pending: PendingConsult,
) -> Result<Json<PresentationFrame>, ApiError> {
    let task = tokio::spawn(consult_and_commit(state.clone(), id.to_string(), pending));
    match task.await {
        Ok(result) => result.map(Json),
        Err(e) => {
            error!(error = %e, session = id, "commit task failed");
            Err(ApiError::Internal("Decision could not be computed".to_string()))
        }
    }
}

async fn consult_and_commit(
    state: Arc<AppState>,
    id: String,
    pending: PendingConsult,
) -> Result<PresentationFrame, ApiError> {
    let remote = state.remote.clone();
    let request = pending.clone();
    let joined = tokio::spawn(async move { consult(remote.as_deref(), &request).await }).await;

    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| {
        debug!(session = %id, "session removed during consult, decision dropped");
        ApiError::NotFound
    })?;
    entry.touch();

    match joined {
        Ok(outcome) => {
            entry.session.complete(pending, outcome);
            Ok(entry.publish())
        }
        Err(e) => {
            error!(error = %e, session = %id, "consult task failed");
            entry.session.abort();
            entry.publish();
            Err(ApiError::Internal("Decision could not be computed".to_string()))
        }
    }
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or(ApiError::NotFound)?;
    let rx = entry.update_tx.subscribe();
    let current = entry.session.frame();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, current, rx).await;
    }))
}

/// Send the current frame, then every update until either side closes
async fn handle_websocket(
    socket: WebSocket,
    current: PresentationFrame,
    mut rx: broadcast::Receiver<PresentationFrame>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut forward = tokio::spawn(async move {
        let json = serde_json::to_string(&current).unwrap_or_default();
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    let json = serde_json::to_string(&frame).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut drain = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }
}

/// Generate session ID
fn generate_session_id(seq: u64) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("session_{:x}_{}", nanos as u64, seq)
}

/// Run the API server
pub async fn run_server(addr: &str, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let remote = state.remote.is_some();
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, remote, "GeoScout API running");
    info!("  POST /api/identify          - Identify (remote decision)");
    info!("  POST /session/new           - Create session");
    info!("  GET  /session/:id           - Get status");
    info!("  POST /session/:id/select    - Pick option");
    info!("  POST /session/:id/retract   - Undo trait");
    info!("  POST /session/:id/reset     - New sample");
    info!("  DELETE /session/:id         - Drop session");
    info!("  WS   /ws/:id                - Live frames");
    info!("  GET  /health                - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
