// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Read endpoints are public; control
// endpoints require a valid Bearer token checked via the `AuthBearer`
// extractor.
//
// Control requests never touch trading state directly: they flip the trading
// mode or raise a flag that the cycle runner consumes between cycles.
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::types::TradingMode;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/risk", get(risk))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/control/pause", post(control_pause))
        .route("/api/v1/control/resume", post(control_resume))
        .route("/api/v1/control/kill", post(control_kill))
        .route("/api/v1/control/reset-daily", post(control_reset_daily))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Read endpoints
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn signals(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.latest_signals())
}

async fn risk(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.risk_state() {
        Some(risk) => Json(risk).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "No cycle has completed yet" })),
        )
            .into_response(),
    }
}

// =============================================================================
// Control endpoints (authenticated)
// =============================================================================

#[derive(Serialize)]
struct ControlResponse {
    trading_mode: TradingMode,
    message: String,
}

async fn control_pause(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.set_trading_mode(TradingMode::Paused);
    info!("Trading PAUSED via API");

    Json(ControlResponse {
        trading_mode: TradingMode::Paused,
        message: "Trading paused — signals are still scored".to_string(),
    })
}

async fn control_resume(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControlResponse>, (StatusCode, Json<serde_json::Value>)> {
    if state.trading_mode() == TradingMode::Killed {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Trading was killed — restart required" })),
        ));
    }
    state.set_trading_mode(TradingMode::Live);
    info!("Trading RESUMED via API");

    Ok(Json(ControlResponse {
        trading_mode: TradingMode::Live,
        message: "Trading resumed".to_string(),
    }))
}

async fn control_kill(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.set_trading_mode(TradingMode::Killed);
    state.request_shutdown();
    warn!("Trading KILLED via API");

    Json(ControlResponse {
        trading_mode: TradingMode::Killed,
        message: "Trading killed — the cycle loop stops before its next cycle".to_string(),
    })
}

async fn control_reset_daily(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_daily_reset();
    info!("Daily risk reset requested via API");

    Json(serde_json::json!({
        "status": "pending",
        "message": "Daily risk state resets before the next cycle",
    }))
}
