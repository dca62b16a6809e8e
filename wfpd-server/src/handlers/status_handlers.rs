//! Welcome, health and metrics endpoints.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

pub async fn welcome() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        "{\"msg\": \"Hello from the SCANOSS Scanning API\"}\n",
    )
        .into_response()
}

pub async fn health_check() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        "{\"alive\": true}\n",
    )
        .into_response()
}

/// `GET /api/metrics/{type}` — request counters per category.
pub async fn metrics(
    State(state): State<AppState>,
    Path(metric_type): Path<String>,
) -> AppResult<Response> {
    let requests = json!(state.counters.snapshot());
    let body = match metric_type.as_str() {
        "requests" => requests,
        "all" => json!({ "requests": requests }),
        other => {
            return Err(AppError::bad_request(format!(
                "Unknown request type: {other}. Supported: requests, all"
            )));
        }
    };
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        format!("{body}\n"),
    )
        .into_response())
}
