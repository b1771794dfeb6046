//! Wire types shared between the gateway and the matching engine subprocess.
//!
//! One request is one UTF-8 JSON object terminated by `\n`; one response is
//! one UTF-8 JSON object terminated by `\n`. Optional fields must be omitted
//! from the serialized command when absent on the HTTP side -- the engine
//! distinguishes "absent" from "null" and only the former is accepted.

use serde::{Deserialize, Serialize};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "MARKET")]
    Market,
}

/// Order status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "REJECTED")]
    Rejected,
}

/// Order payload sent to the engine as part of `place_order`.
///
/// Optional fields use `skip_serializing_if` rather than a nullable
/// sentinel: the engine contract requires absence, not `null`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPayload {
    pub account_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: i64,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// Order as returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: i64,
    pub quantity: i64,
    pub remaining_qty: i64,
    pub timestamp_ns: i64,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// A matched trade as returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub buy_order_id: i64,
    pub sell_order_id: i64,
    pub symbol: String,
    pub price: i64,
    pub quantity: i64,
    pub timestamp_ns: i64,
    pub buyer_account_id: String,
    pub seller_account_id: String,
}

/// Aggregated price level in an order book snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: i64,
    pub quantity: i64,
    pub order_count: i64,
}

/// `place_order` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderData {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// `cancel_order` / `get_order` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
    pub order: Order,
}

/// `get_book` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BookData {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// `get_trades` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TradesData {
    pub symbol: String,
    pub trades: Vec<Trade>,
}

/// `get_stats` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsData {
    pub total_orders: i64,
    pub total_trades: i64,
    pub total_cancels: i64,
    pub total_rejects: i64,
    pub event_sequence: i64,
}

/// `health` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineHealthData {
    pub timestamp_ns: i64,
}

/// Business-level error carried by a failed envelope (`success: false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
}

/// The engine's reply envelope. `data` is left as raw JSON and decoded by
/// the caller into the command-specific payload type, since its shape
/// depends on which command produced it.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<EngineError>,
    pub req_id: String,
}
