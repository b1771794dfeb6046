//! Request validation and response DTOs for the HTTP surface (C8).
//!
//! Wire shapes mirror spec §3/§6 exactly. Validation happens once, at the
//! boundary, before anything is forwarded to the engine -- failures here
//! are `ValidationError`s (422) and are never counted as engine rejections
//! (§4.8).

pub mod response;

pub use response::ApiError;

use axum::Json;
use axum::extract::{FromRequest, Request};
use crate::engine::protocol::{BookLevel, Order, OrderType, Side, Trade};
use serde::{Deserialize, Serialize};

/// Inbound `POST /api/v1/orders` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub account_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: i64,
    pub quantity: i64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

/// Framework-level validated extractor for `POST /api/v1/orders`, grounded
/// on the teacher's `ValidatedOrderExtractor` (`gateway/types/order.rs`):
/// a bare `Json<PlaceOrderRequest>` lets axum's own `JsonRejection` escape
/// as a plain-text body before the handler ever runs, which would violate
/// the fixed `{success:false, error:{code,message}, request_id}` envelope
/// §6/§7 requires for every failure, schema-level or not (§4.8). This
/// extractor folds body-decode failures and field validation into the
/// same `ApiError` path.
pub struct ValidatedPlaceOrder(pub PlaceOrderRequest);

impl<S> FromRequest<S> for ValidatedPlaceOrder
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<PlaceOrderRequest>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(format!("body: {rejection}")))?;
        body.validate()?;
        Ok(Self(body))
    }
}

impl PlaceOrderRequest {
    /// Validates field lengths, the symbol pattern, and numeric ranges.
    /// Returns a human-readable field path + reason on the first failure
    /// encountered (§4.8 calls for field path and reason, not an
    /// exhaustive list).
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.account_id.is_empty() || self.account_id.chars().count() > 64 {
            return Err(ApiError::validation(
                "account_id: must be 1..64 characters",
            ));
        }
        if !is_valid_symbol(&self.symbol) {
            return Err(ApiError::validation(
                "symbol: must match pattern ^[A-Z]+-[A-Z]+$",
            ));
        }
        if self.price < 0 {
            return Err(ApiError::validation("price: must be >= 0"));
        }
        if self.quantity <= 0 {
            return Err(ApiError::validation("quantity: must be > 0"));
        }
        if let Some(ref key) = self.idempotency_key {
            if key.chars().count() > 64 {
                return Err(ApiError::validation("idempotency_key: must be <= 64 characters"));
            }
        }
        if let Some(ref id) = self.client_order_id {
            if id.chars().count() > 64 {
                return Err(ApiError::validation("client_order_id: must be <= 64 characters"));
            }
        }
        Ok(())
    }
}

fn is_valid_symbol(symbol: &str) -> bool {
    let Some((base, quote)) = symbol.split_once('-') else {
        return false;
    };
    !base.is_empty()
        && !quote.is_empty()
        && base.chars().all(|c| c.is_ascii_uppercase())
        && quote.chars().all(|c| c.is_ascii_uppercase())
        && !quote.contains('-')
}

/// `POST /api/v1/orders` and `GET`/`DELETE /api/v1/orders/{id}` response
/// body for a successful engine round-trip.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// `GET /api/v1/book/{symbol}` response (§3 `OrderBookResponse`).
#[derive(Debug, Clone, Serialize)]
pub struct OrderBookResponse {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradesResponse {
    pub symbol: String,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_orders: i64,
    pub total_trades: i64,
    pub total_cancels: i64,
    pub total_rejects: i64,
    pub event_sequence: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine_connected: bool,
    pub timestamp_ns: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookQuery {
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<u32>,
}

pub const DEFAULT_BOOK_DEPTH: u32 = 10;
pub const DEFAULT_TRADES_LIMIT: u32 = 100;
pub const MAX_TRADES_LIMIT: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlaceOrderRequest {
        PlaceOrderRequest {
            account_id: "u1".to_string(),
            symbol: "BTC-USD".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: 5_000_000_000_000,
            quantity: 100_000_000,
            idempotency_key: None,
            client_order_id: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_lowercase_symbol() {
        let mut req = sample();
        req.symbol = "btc-usd".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_symbol_without_separator() {
        let mut req = sample();
        req.symbol = "BTCUSD".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut req = sample();
        req.quantity = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_negative_price() {
        let mut req = sample();
        req.price = -1;
        assert!(req.validate().is_err());
    }

    #[test]
    fn allows_zero_price_for_market_orders() {
        let mut req = sample();
        req.order_type = OrderType::Market;
        req.price = 0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_oversized_account_id() {
        let mut req = sample();
        req.account_id = "a".repeat(65);
        assert!(req.validate().is_err());
    }
}
