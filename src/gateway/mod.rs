//! HTTP router assembly (C9) plus the request pipeline middleware (C10)
//! and observability endpoints (C11) it wires together.
//!
//! Route layering order mirrors spec §9's Design Note "auth ordering":
//! the rate limiter runs on the *raw* `X-API-Key` header before the
//! authenticator gets a chance to reject it, because `tower`/`axum`
//! layers execute outside-in and the rate-limit layer is applied after
//! (hence outside) the auth layer on every route that needs both.

pub mod handlers;
pub mod middleware;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;

use state::AppState;

/// Builds the complete, unstarted `axum::Router`. Split from the listener
/// bind + serve loop (in `main.rs`) so tests can drive it with
/// `tower::ServiceExt::oneshot` against an `AppState` built around a fake
/// engine, per the Design Note on testable seams.
pub fn build_router(state: Arc<AppState>) -> Router {
    let orders_post = post(handlers::place_order)
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    let order_get = get(handlers::get_order).layer(from_fn_with_state(
        state.clone(),
        middleware::require_auth,
    ));

    let order_delete = delete(handlers::cancel_order)
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    let stats_get = get(handlers::get_stats).layer(from_fn_with_state(
        state.clone(),
        middleware::require_auth,
    ));

    let api_v1 = Router::new()
        .route("/orders", orders_post)
        .route("/orders/{id}", order_get.merge(order_delete))
        .route("/book/{symbol}", get(handlers::get_book))
        .route("/trades/{symbol}", get(handlers::get_trades))
        .route("/stats", stats_get)
        .route("/health", get(handlers::health));

    Router::new()
        .route("/", get(handlers::root))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", api_v1)
        .layer(axum::middleware::from_fn(middleware::request_context))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
