//! GET /health — liveness plus the configured analysis tiers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Vision providers in the order they are tried.
    pub providers: Vec<String>,
    pub ocr_fallback: bool,
    pub time: String,
}

pub async fn health_route(State(state): State<Arc<AppState>>) -> Response {
    let reviewer = &state.reviewer;
    ApiResponse::success(HealthResponse {
        status: "ok",
        providers: reviewer
            .providers()
            .providers()
            .iter()
            .map(|p| p.to_string())
            .collect(),
        ocr_fallback: reviewer.settings().ocr_endpoint().is_some(),
        time: chrono::Utc::now().to_rfc3339(),
    })
    .into_response_with_status(StatusCode::OK)
}
