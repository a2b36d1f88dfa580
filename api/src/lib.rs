//! HTTP surface for the chat reviewer.
//!
//! - `POST /review`           → JSON envelope with the review
//! - `POST /review/annotated` → annotated PNG
//! - `GET  /health`           → liveness and configured tiers

pub mod core;
pub mod error_handler;
pub mod middleware_layer;
pub mod routes;

use std::{env, sync::Arc};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tokio::signal;
use tracing::{error, info};

use crate::{
    core::app_state::AppState,
    error_handler::AppError,
    middleware_layer::json_extractor::json_error_mapper,
    routes::{
        health_route::health_route,
        review::review_route::{review_annotated_route, review_route},
    },
};

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
/// Room for ten inline screenshots as data URLs.
const BODY_LIMIT_BYTES: usize = 40 * 1024 * 1024;

/// Router with every route and middleware attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/review", post(review_route))
        .route("/review/annotated", post(review_annotated_route))
        .route("/health", get(health_route))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(Arc::new(state))
}

/// Builds state from the environment and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let addr = env::var("API_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
    let state = AppState::from_env()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("api stopped");
    Ok(())
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
