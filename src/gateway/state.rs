//! Shared gateway application state.
//!
//! Generalizes the teacher's `AppState` -- a `Clone`-able bundle of
//! `Arc`-wrapped singletons handed to every handler via `axum::State` --
//! down to exactly what this gateway needs: config, the engine client and
//! its supervisor, and the rate limiter. Per the Design Note on global
//! mutable state, each singleton is an explicit field here rather than
//! hidden module statics, so tests can build an `AppState` around a fake
//! engine.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::api_auth::RateLimiter;
use crate::config::AppConfig;
use crate::engine::{EngineClient, EngineSupervisor};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<EngineClient>,
    pub supervisor: Arc<EngineSupervisor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, metrics_handle: PrometheusHandle) -> Self {
        let engine = Arc::new(EngineClient::new());
        let supervisor = Arc::new(EngineSupervisor::new(config.clone(), engine.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window_seconds,
        ));
        Self {
            config,
            engine,
            supervisor,
            rate_limiter,
            metrics_handle,
        }
    }
}
