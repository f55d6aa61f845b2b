use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::boundary::SendBoundary;
use crate::bot::{CommandRegistry, LoadError, PollSpec, SharedStatus, StopHandle};

/// State shared by the dashboard handlers
#[derive(Clone)]
pub struct DashboardState {
    pub status: SharedStatus,
    pub commands: Arc<CommandRegistry>,
    /// Same outbound boundary the event loop uses
    pub sender: Arc<dyn SendBoundary>,
    pub stop: StopHandle,
}

#[derive(Debug, Deserialize)]
struct PollRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Vec<String>,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/commands", get(list_commands).put(save_commands))
        .route("/api/commands/reload", post(reload_commands))
        .route("/api/poll", post(create_poll))
        .route("/api/bot/stop", post(stop_bot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the dashboard on localhost
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("🌐 Dashboard listening on http://{}", addr);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: DashboardState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server": "stryker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn get_status(State(state): State<DashboardState>) -> impl IntoResponse {
    let status = state.status.read().await;
    let uptime = status.uptime_secs(Utc::now());

    let mut body = match serde_json::to_value(&*status) {
        Ok(value) => value,
        Err(e) => {
            log::error!("Failed to serialize bot status: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to serialize status" })),
            );
        }
    };
    if let Some(map) = body.as_object_mut() {
        map.insert("uptimeSecs".to_string(), json!(uptime));
    }
    (StatusCode::OK, Json(body))
}

async fn list_commands(State(state): State<DashboardState>) -> impl IntoResponse {
    let table = state.commands.snapshot();
    Json(json!({
        "triggerCount": table.trigger_count(),
        "commands": table.definitions(),
    }))
}

async fn reload_commands(State(state): State<DashboardState>) -> impl IntoResponse {
    match state.commands.reload().await {
        Ok(trigger_count) => {
            state.status.write().await.trigger_count = trigger_count;
            (
                StatusCode::OK,
                Json(json!({ "reloaded": true, "triggerCount": trigger_count })),
            )
        }
        Err(e) => {
            log::warn!("Dashboard reload failed, previous commands kept: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "reloaded": false, "error": e.to_string() })),
            )
        }
    }
}

async fn save_commands(State(state): State<DashboardState>, body: Bytes) -> impl IntoResponse {
    match state.commands.save(&body).await {
        Ok(trigger_count) => {
            state.status.write().await.trigger_count = trigger_count;
            (
                StatusCode::OK,
                Json(json!({ "saved": true, "triggerCount": trigger_count })),
            )
        }
        Err(LoadError::Storage(e)) => {
            log::error!("❌ Failed to save commands: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "saved": false, "error": e.to_string() })),
            )
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "saved": false, "error": e.to_string() })),
        ),
    }
}

async fn create_poll(
    State(state): State<DashboardState>,
    Json(request): Json<PollRequest>,
) -> impl IntoResponse {
    if !state.status.read().await.running {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Bot is not running" })),
        );
    }

    let poll = match PollSpec::new(&request.question, &request.options) {
        Ok(poll) => poll,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        }
    };

    match state.sender.create_poll(&poll).await {
        Ok(()) => {
            log::info!("📊 Poll created from dashboard: '{}'", poll.question);
            state.status.write().await.polls_created += 1;
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": format!("Poll created: {}", poll.question) })),
            )
        }
        Err(e) => {
            log::error!("❌ Dashboard poll failed: {}", e);
            state.status.write().await.last_error = Some(e.to_string());
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn stop_bot(State(state): State<DashboardState>) -> impl IntoResponse {
    log::info!("🛑 Stop requested from dashboard");
    state.stop.stop();
    (StatusCode::ACCEPTED, Json(json!({ "stopping": true })))
}
