//! Per-request database context middleware.
//!
//! This is where the connection lifecycle hooks into the framework: a fresh
//! [`RequestContext`] is created for every inbound request and stored in the
//! request extensions, and teardown runs unconditionally once the inner
//! service has produced its response — success or error alike. A request
//! whose future is dropped mid-flight (client disconnect, timeout layer)
//! skips the explicit path, and the context's `Drop` impl closes the
//! connection instead.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use quill_db::RequestContext;

use crate::AppState;

/// Wrapper for the per-request database context stored in request extensions.
///
/// Handlers take this with the `Extension` extractor and call
/// `RequestContext::db` to reach the request's connection.
#[derive(Clone)]
pub struct DbContext(pub Arc<RequestContext>);

/// Middleware wiring the database context to the request lifecycle.
pub async fn db_context_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let ctx = Arc::new(RequestContext::new(state.db.clone()));
    req.extensions_mut().insert(DbContext(Arc::clone(&ctx)));

    let response = next.run(req).await;

    // Teardown on a blocking thread — rusqlite work stays off the async
    // workers, matching how handlers are expected to use the connection.
    if let Err(e) = tokio::task::spawn_blocking(move || ctx.close()).await {
        tracing::warn!("database teardown task failed: {}", e);
    }

    Ok(response)
}
