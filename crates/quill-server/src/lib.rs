//! Quill server library logic.
//!
//! The application factory: [`app`] assembles the router, the per-request
//! database middleware, request tracing, and the shared state extension.
//! Feature handlers hang off this router and reach the request's database
//! through the [`middleware::DbContext`] extension.

pub mod config;
pub mod middleware;

use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use quill_db::ConnectionSettings;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Settings each request context opens its connection with.
    pub db: ConnectionSettings,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(
            middleware::db_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
