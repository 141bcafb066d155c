//! HTTP route modules for the `vendgate` gateway.

pub mod gateway;
pub mod health;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full Axum router: vendor endpoints, health, and middleware.
pub fn app(state: Arc<AppState>, max_concurrency: usize) -> Router {
    // One semaphore across all vendor routes.
    let gateway_routes = gateway::router(&state.endpoints)
        .layer(tower::limit::GlobalConcurrencyLimitLayer::new(max_concurrency));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .merge(gateway_routes)
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
