//! Aztec Exchange Gateway — the HTTP front door to a native matching
//! engine.
//!
//! The gateway treats the engine as a black-box, line-oriented JSON
//! server reachable over the engine subprocess's stdin/stdout pipes. This
//! crate owns the three pieces that make that front door trustworthy:
//! subprocess lifecycle, a serialized line-protocol client, and the HTTP
//! request pipeline (auth, rate limiting, validation, metrics, logging)
//! that sits in front of it.
//!
//! # Modules
//!
//! - [`config`] - environment-resolved runtime settings (C1)
//! - [`logging`] - structured JSON logging setup (C2)
//! - [`metrics`] - Prometheus counters/histograms/gauges (C3)
//! - [`engine`] - subprocess supervisor, line-protocol client, wire types (C4/C5)
//! - [`api_auth`] - API-key authentication and the sliding-window rate limiter (C6/C7)
//! - [`gateway`] - HTTP router, handlers, middleware, and request/response types (C8-C11)

pub mod api_auth;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod logging;
pub mod metrics;

pub use config::AppConfig;
pub use gateway::state::AppState;
