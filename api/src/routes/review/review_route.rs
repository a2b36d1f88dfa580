//! POST /review and POST /review/annotated.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chat_review::render;
use tracing::{info, instrument};

use crate::{
    core::{
        app_state::AppState,
        http::response_envelope::{ApiResponse, DEGRADED_HEADER},
    },
    error_handler::{AppError, AppResult},
    routes::review::review_request::ReviewRequest,
};

fn checked(payload: Result<Json<ReviewRequest>, JsonRejection>) -> AppResult<ReviewRequest> {
    let Json(body) = payload?;
    body.validate().map_err(|details| AppError::BadRequest {
        message: "invalid review request".into(),
        details,
    })?;
    Ok(body)
}

/// Handler: POST /review
///
/// Answers with the review as `data`; a fallback tier is named in the
/// envelope's `degraded` field and the `x-review-degraded` header.
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/review \
///   -H 'content-type: application/json' \
///   -d '{"images":["https://example.com/chat.png"],"language":"en"}'
/// ```
#[instrument(name = "review_route", skip_all)]
pub async fn review_route(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<Response> {
    let body = checked(payload)?;
    let outcome = state.reviewer.analyze(&body.refs(), body.language()).await?;

    let degraded = outcome.degraded_reason();
    info!(images = body.images.len(), degraded = ?degraded, "review served");
    Ok(ApiResponse::success(outcome.into_review())
        .with_degraded(degraded)
        .into_response_with_status(StatusCode::OK))
}

/// Handler: POST /review/annotated
///
/// Same request as `/review`; answers with the annotated PNG. Degraded
/// reviews are flagged with the `x-review-degraded` header.
#[instrument(name = "review_annotated_route", skip_all)]
pub async fn review_annotated_route(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<Response> {
    let body = checked(payload)?;
    let pages = state.reviewer.load_pages(&body.refs()).await;
    let outcome = state.reviewer.analyze_pages(&pages, body.language()).await?;
    let degraded = outcome.degraded_reason();

    let glyphs = state.glyphs.clone();
    let review = outcome.into_review();
    let rendered = tokio::task::spawn_blocking(move || render(&review, &pages, &glyphs))
        .await
        .map_err(|e| AppError::Join(e.to_string()))??;

    info!(
        images = body.images.len(),
        badges = rendered.badges.len(),
        bytes = rendered.png.len(),
        degraded = ?degraded,
        "annotated review served"
    );

    let mut res = (StatusCode::OK, rendered.png).into_response();
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Some(reason) = degraded {
        res.headers_mut()
            .insert(DEGRADED_HEADER, HeaderValue::from_static(reason.as_str()));
    }
    Ok(res)
}
