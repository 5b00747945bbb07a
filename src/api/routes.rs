//! API route definitions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::state::AppState;
use crate::diagnostics::RunError;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/diagnostics/run", post(run_diagnostics))
        .route("/diagnostics/cancel", post(cancel_diagnostics))
        .route("/diagnostics/state", get(diagnostics_state))
        .route("/diagnostics/latest", get(diagnostics_latest))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": { "status": "ok" },
        "meta": meta()
    }))
}

/// Runs to completion before responding. A client that disconnects drops the
/// handler future, which abandons the run.
async fn run_diagnostics(State(state): State<AppState>) -> Response {
    match state.runner.run().await {
        Ok(result) => Json(json!({ "data": result, "meta": meta() })).into_response(),
        Err(e) => {
            let status = match e {
                RunError::AlreadyRunning => StatusCode::CONFLICT,
                RunError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(json!({ "error": e.to_string(), "meta": meta() }))).into_response()
        }
    }
}

async fn cancel_diagnostics(State(state): State<AppState>) -> Json<Value> {
    let was_running = state.runner.cancel();
    Json(json!({ "data": { "cancelled": was_running }, "meta": meta() }))
}

async fn diagnostics_state(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "state": state.runner.state(),
            "connectivity": state.runner.connectivity().current(),
        },
        "meta": meta()
    }))
}

async fn diagnostics_latest(State(state): State<AppState>) -> Json<Value> {
    match state.runner.last_result() {
        Some(result) => Json(json!({ "data": result.as_ref(), "meta": meta() })),
        None => Json(json!({ "data": null, "meta": { "message": "no diagnostics results yet" } })),
    }
}
