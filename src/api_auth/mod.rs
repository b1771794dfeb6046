//! API-key authentication (C6) and the sliding-window rate limiter (C7).
//!
//! The gateway's security model is the flat, non-expiring key set from
//! [`crate::config::AppConfig`] -- there is no signing, no per-tenant
//! scoping, no replay-nonce tracking. Ported from
//! `original_source/api/app/auth.py`'s `verify_api_key` and
//! `rate_limit.py`'s `RateLimiter`.

pub mod error;
pub mod rate_limit;

pub use error::AuthError;
pub use rate_limit::{RateLimiter, client_key};
