//! HTTP API gateway for engram.
//!
//! Exposes the memory agent over REST:
//!
//! - `GET    /health`                     — liveness and provider reachability
//! - `POST   /v1/chat`                    — send a message, get a response
//! - `POST   /v1/conversations/{id}/end`  — consolidate and get the summary
//! - `GET    /v1/memory/{tier}`           — tier-scoped retrieval (`?q=` query)
//! - `DELETE /v1/memory/{tier}`           — erase one tier
//! - `GET    /v1/stats`                   — combined memory statistics
//!
//! Built on Axum. Sessions are held in memory, keyed by session id, and
//! the oldest is evicted when the cap is reached.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use engram_agent::{ConversationSession, MemoryOrchestrator, SessionSummary};
use engram_core::memory::MemoryTier;

/// Maximum in-memory sessions before the oldest is evicted.
const MAX_SESSIONS: usize = 1_000;

/// One live session. Each session has its own lock so a slow completion
/// in one conversation never stalls the others or the map itself.
struct SessionSlot {
    session: Arc<Mutex<ConversationSession>>,
    created_at: DateTime<Utc>,
}

/// Shared state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<MemoryOrchestrator>,
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<MemoryOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat", post(chat_handler))
        .route("/v1/conversations/{id}/end", post(end_handler))
        .route("/v1/memory/{tier}", get(memory_handler))
        .route("/v1/memory/{tier}", delete(clear_memory_handler))
        .route("/v1/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server, serving until the process exits.
pub async fn start(
    orchestrator: Arc<MemoryOrchestrator>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    orchestrator.initialize().await?;
    let state = Arc::new(GatewayState::new(orchestrator));
    let router = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let provider_ok = state
        .orchestrator
        .provider()
        .health_check()
        .await
        .unwrap_or(false);
    Json(json!({
        "status": "ok",
        "provider_reachable": provider_ok,
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Continue an existing session, or omit to start a new one.
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    // Resolve the session first, then release the map lock before any
    // provider I/O: only the per-session lock is held across the turn.
    let session = match payload.session_id {
        Some(id) => {
            let sessions = state.sessions.read().await;
            match sessions.get(&id) {
                Some(slot) => Arc::clone(&slot.session),
                None => {
                    return Err((
                        StatusCode::NOT_FOUND,
                        Json(ErrorResponse {
                            error: format!("unknown session: {id}"),
                        }),
                    ));
                }
            }
        }
        None => {
            let mut session = ConversationSession::new(Arc::clone(&state.orchestrator));
            session.start().await.map_err(internal_error)?;
            let id = session.session_id();
            let session = Arc::new(Mutex::new(session));

            let mut sessions = state.sessions.write().await;
            if sessions.len() >= MAX_SESSIONS {
                if let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, slot)| slot.created_at)
                    .map(|(k, _)| k.clone())
                {
                    warn!(session_id = %oldest, "Session cap reached, evicting oldest");
                    sessions.remove(&oldest);
                }
            }
            sessions.insert(
                id,
                SessionSlot {
                    session: Arc::clone(&session),
                    created_at: Utc::now(),
                },
            );
            session
        }
    };

    let mut session = session.lock().await;
    let response = session
        .process(&payload.message)
        .await
        .map_err(internal_error)?;

    Ok(Json(ChatResponse {
        response,
        session_id: session.session_id(),
    }))
}

/// Clone a session handle out of the map, releasing the map lock.
async fn lookup_session(
    state: &SharedState,
    session_id: Option<&str>,
) -> Option<Arc<Mutex<ConversationSession>>> {
    let id = session_id?;
    let sessions = state.sessions.read().await;
    sessions.get(id).map(|slot| Arc::clone(&slot.session))
}

async fn end_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let Some(slot) = state.sessions.write().await.remove(&id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown session: {id}"),
            }),
        ));
    };

    // An in-flight turn on this session finishes before consolidation.
    let mut session = slot.session.lock().await;
    let summary = session.end().await.map_err(internal_error)?;
    Ok(Json(summary))
}

fn default_limit() -> usize {
    10
}

#[derive(Deserialize)]
struct MemoryQuery {
    #[serde(default)]
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
    /// Scope working-memory reads to a live session.
    session_id: Option<String>,
}

async fn memory_handler(
    State(state): State<SharedState>,
    Path(tier): Path<String>,
    Query(params): Query<MemoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let tier: MemoryTier = tier.parse().map_err(bad_request)?;

    let session = lookup_session(&state, params.session_id.as_deref()).await;
    let result = match session {
        Some(session) => {
            let session = session.lock().await;
            state
                .orchestrator
                .retrieve(session.context(), tier, &params.q, params.limit)
                .await
        }
        None => {
            let ctx = state.orchestrator.new_session();
            state
                .orchestrator
                .retrieve(&ctx, tier, &params.q, params.limit)
                .await
        }
    };

    result.map(Json).map_err(internal_error)
}

async fn clear_memory_handler(
    State(state): State<SharedState>,
    Path(tier): Path<String>,
    Query(params): Query<MemoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let tier: MemoryTier = tier.parse().map_err(bad_request)?;

    let session = lookup_session(&state, params.session_id.as_deref()).await;
    match session {
        Some(session) => {
            let mut session = session.lock().await;
            state
                .orchestrator
                .clear_tier(session.context_mut(), tier)
                .await
        }
        None => {
            let mut ctx = state.orchestrator.new_session();
            state.orchestrator.clear_tier(&mut ctx, tier).await
        }
    }
    .map_err(internal_error)?;

    info!(tier = %tier, "Cleared memory tier via API");
    Ok(Json(json!({ "cleared": tier.as_str() })))
}

async fn stats_handler(
    State(state): State<SharedState>,
    Query(params): Query<MemoryQuery>,
) -> Json<Value> {
    let active_sessions = state.sessions.read().await.len();
    let session = lookup_session(&state, params.session_id.as_deref()).await;
    let stats = match session {
        Some(session) => {
            let session = session.lock().await;
            state.orchestrator.memory_stats(session.context()).await
        }
        None => {
            let ctx = state.orchestrator.new_session();
            state.orchestrator.memory_stats(&ctx).await
        }
    };
    Json(json!({
        "active_sessions": active_sessions,
        "memory": stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use engram_agent::OrchestratorConfig;
    use engram_core::provider::Provider;
    use engram_core::store::SearchStore;
    use engram_providers::ScriptedProvider;
    use engram_store::InMemoryStore;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(dir: &TempDir, responses: Vec<&str>) -> Router {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(
            responses.into_iter().map(String::from).collect(),
        ));
        let store: Arc<dyn SearchStore> = Arc::new(InMemoryStore::new());
        let config = OrchestratorConfig {
            procedural_path: dir.path().join("rules.txt"),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Arc::new(MemoryOrchestrator::new(provider, store, config));
        build_router(Arc::new(GatewayState::new(orchestrator)))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["hi"]);
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_creates_session_and_reuses_it() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["first reply", "second reply"]);

        let response = router
            .clone()
            .oneshot(
                Request::post("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"], "first reply");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let response = router
            .oneshot(
                Request::post("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(
                        r#"{{"message": "again", "session_id": "{session_id}"}}"#
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["response"], "second reply");
        assert_eq!(body["session_id"], session_id.as_str());
    }

    #[tokio::test]
    async fn chat_with_unknown_session_is_404() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["hi"]);
        let response = router
            .oneshot(
                Request::post("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"message": "hello", "session_id": "missing"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ending_a_session_returns_summary_and_forgets_it() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["reply", "{}"]);

        let response = router
            .clone()
            .oneshot(
                Request::post("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let session_id = body_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = router
            .clone()
            .oneshot(
                Request::post(format!("/v1/conversations/{session_id}/end"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["total_messages"], 1);

        let response = router
            .oneshot(
                Request::post(format!("/v1/conversations/{session_id}/end"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tier_is_400() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["hi"]);
        let response = router
            .oneshot(
                Request::get("/v1/memory/muscle?q=anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn procedural_tier_is_searchable_over_http() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["hi"]);
        let response = router
            .oneshot(
                Request::get("/v1/memory/procedural?q=clarifying")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(!body.as_array().unwrap().is_empty());
    }

    /// A completion that parks until released, to hold a chat turn open.
    struct GatedProvider {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl Provider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn complete(
            &self,
            _messages: &[engram_core::message::Message],
        ) -> Result<String, engram_core::error::ProviderError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("late reply".into())
        }
    }

    #[tokio::test]
    async fn slow_completion_does_not_block_other_handlers() {
        let dir = TempDir::new().unwrap();
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let provider: Arc<dyn Provider> = Arc::new(GatedProvider {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        let store: Arc<dyn SearchStore> = Arc::new(InMemoryStore::new());
        let config = OrchestratorConfig {
            procedural_path: dir.path().join("rules.txt"),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Arc::new(MemoryOrchestrator::new(provider, store, config));
        let router = build_router(Arc::new(GatewayState::new(orchestrator)));

        let chat_router = router.clone();
        let chat = tokio::spawn(async move {
            chat_router
                .oneshot(
                    Request::post("/v1/chat")
                        .header("content-type", "application/json")
                        .body(Body::from(r#"{"message": "hello"}"#))
                        .unwrap(),
                )
                .await
                .unwrap()
        });

        // Wait until the chat turn is parked inside the completion.
        entered.notified().await;

        // Stats must answer while that turn is still in flight.
        let response = router
            .oneshot(Request::get("/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["active_sessions"], 1);

        release.notify_one();
        let response = chat.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["response"], "late reply");
    }

    #[tokio::test]
    async fn stats_include_session_count() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&dir, vec!["hi"]);
        let response = router
            .oneshot(Request::get("/v1/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["memory"]["procedural"]["total_rules"], 10);
    }
}
