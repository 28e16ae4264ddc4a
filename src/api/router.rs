//! Facility API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. Everything except the health probe runs
//! behind the caller-scope middleware.

use axum::routing::{get, post};
use axum::Router;
use rusqlite::Connection;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the facility API router around an open database connection.
pub fn facility_api_router(conn: Connection) -> Router {
    build_router(ApiContext::new(conn))
}

fn build_router(ctx: ApiContext) -> Router {
    let scoped = Router::new()
        .route("/encounters", post(endpoints::encounters::register))
        .route("/encounters/:id/advance", post(endpoints::encounters::advance))
        .route("/encounters/:id/history", get(endpoints::encounters::history))
        .route("/encounters/:id/vitals", post(endpoints::encounters::vitals))
        .route("/line-items", post(endpoints::line_items::create))
        .route("/line-items/:id/settle", post(endpoints::line_items::settle))
        .route("/queues/:dashboard", get(endpoints::queues::queue))
        .route("/queues/routing/pending", get(endpoints::queues::awaiting_routing))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::require_scope));

    let unscoped = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new().nest("/api", scoped.merge(unscoped))
}
