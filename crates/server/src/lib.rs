//! HTTP status surface for Parley.
//!
//! Exposes health and status endpoints, a hook for clearing a conversation,
//! and the two endpoints a WhatsApp bridge process uses to push inbound
//! events and collect outbound replies.
//!
//! Built on Axum.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
};
use parley_agent::MessageDispatcher;
use parley_channels::{ChannelRegistry, ClientState, OutboundEvent};
use parley_config::ServerConfig;
use parley_core::error::ChannelError;
use parley_core::message::ConversationId;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state for the server.
pub struct ServerState {
    pub dispatcher: Arc<MessageDispatcher>,
    pub channels: Arc<ChannelRegistry>,
}

type SharedState = Arc<ServerState>;

/// Build the Axum router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/conversations/{id}", delete(clear_handler))
        .route("/whatsapp/events", post(whatsapp_event_handler))
        .route("/whatsapp/outbox", get(whatsapp_outbox_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Status server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    timestamp: String,
    client_ready: bool,
}

async fn root_handler(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "Parley Chatbot Server Running",
        timestamp: chrono::Utc::now().to_rfc3339(),
        client_ready: state.channels.all_ready().await,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    client_state: &'static str,
    uptime_secs: u64,
    started_at: String,
    ai_enabled: bool,
    active_conversations: usize,
    messages_handled: u64,
    channels: Vec<String>,
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let dispatcher = &state.dispatcher;
    let client_state = if state.channels.all_ready().await {
        ClientState::Ready
    } else {
        ClientState::Disconnected
    };
    let active_conversations = dispatcher.store().count().await.unwrap_or_else(|e| {
        warn!(error = %e, "Could not count conversations");
        0
    });
    Json(StatusResponse {
        client_state: client_state.label(),
        uptime_secs: dispatcher.stats().uptime_secs(),
        started_at: dispatcher.stats().started_at().to_rfc3339(),
        ai_enabled: dispatcher.ai_enabled(),
        active_conversations,
        messages_handled: dispatcher.stats().messages_handled(),
        channels: state.channels.list(),
    })
}

#[derive(Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn clear_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, StatusCode> {
    match state.dispatcher.clear(&ConversationId(id)).await {
        Ok(cleared) => Ok(Json(ClearResponse { cleared })),
        Err(e) => {
            error!(error = %e, "Failed to clear conversation");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn whatsapp_event_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let Some(whatsapp) = state.channels.whatsapp() else {
        return StatusCode::NOT_FOUND;
    };
    if !whatsapp.verify_token(bearer_token(&headers)) {
        warn!("Rejected WhatsApp event with missing or invalid bridge token");
        return StatusCode::UNAUTHORIZED;
    }

    match whatsapp.inject_json(&body).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(ChannelError::InvalidPayload(reason)) => {
            warn!(%reason, "Malformed WhatsApp event");
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            warn!(error = %e, "WhatsApp channel not accepting events");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn whatsapp_outbox_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<OutboundEvent>>, StatusCode> {
    let whatsapp = state.channels.whatsapp().ok_or(StatusCode::NOT_FOUND)?;
    if !whatsapp.verify_token(bearer_token(&headers)) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(whatsapp.drain_outbox().await))
}
