//! # relaycore-api
//!
//! HTTP data-plane API for relaycore. Every route is reachable only behind
//! the admission HMAC middleware; there is no per-user session beyond the
//! account identity each handler resolves from its own request body.

pub mod middleware;
pub mod resolve;
pub mod routes;

use axum::Router;
use relaycore_db::Database;
use std::sync::{atomic::AtomicI64, Arc};

/// Shared application state available to all route handlers.
pub struct AppState {
    pub db: Database,
    /// Unix timestamp of the last stale-call-session sweep, so the lazy
    /// cleanup in `routes::calls` runs at most once per throttle window
    /// instead of on every request.
    pub calls_cleanup_gate: AtomicI64,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db, calls_cleanup_gate: AtomicI64::new(0) }
    }
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let data_plane = Router::new()
        .merge(routes::account::router())
        .merge(routes::prekeys::router())
        .merge(routes::messages::router())
        .merge(routes::vault::router())
        .merge(routes::invites::router())
        .merge(routes::backup::router())
        .merge(routes::deletion::router())
        .merge(routes::groups::router())
        .merge(routes::calls::router())
        .merge(routes::misc::router())
        .route_layer(axum::middleware::from_fn(middleware::admission_middleware));

    Router::new()
        .nest("/d1", data_plane)
        .merge(routes::health::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
