//! HTTP route handlers (C9) and the observability endpoints (C11).
//!
//! Each order/book/trade handler is a thin translation layer: validate
//! the inbound body (C8), build the engine command (§6), send it over
//! the single serialized pipe (C5), and translate the envelope back to
//! an HTTP response (§7). None of these handlers touch the engine's
//! internals beyond the `code`/`message` pair a failed envelope carries.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::engine::{
    BookData, ClientError, EngineEnvelope, EngineError, OrderData, OrderPayload, PlaceOrderData,
    StatsData, TradesData,
};
use crate::gateway::state::AppState;
use crate::gateway::types::{
    BookQuery, DEFAULT_BOOK_DEPTH, DEFAULT_TRADES_LIMIT, HealthResponse, MAX_TRADES_LIMIT,
    OrderBookResponse, OrderResponse, PlaceOrderResponse, StatsResponse, TradesQuery,
    TradesResponse, ValidatedPlaceOrder,
};
use crate::gateway::types::ApiError;

/// Converts a transport-level failure (C5) into the spec's `TransportError`
/// response (§7): 500, `INTERNAL_ERROR`, and the `engine_connected` gauge
/// dropped to 0 since a failed send means the pipe is no longer trustworthy.
fn transport_error(err: ClientError) -> ApiError {
    tracing::error!(error = %err, "engine transport failure");
    crate::metrics::set_engine_connected(false);
    ApiError::internal("An internal error occurred")
}

/// Maps an engine business error (`success: false`) to the status the
/// caller's route requires, preserving the engine's own `code`/`message`
/// (§7 `EngineBusinessError`).
fn business_error(status: axum::http::StatusCode, error: EngineError) -> ApiError {
    ApiError::engine_business(status, error.code, error.message)
}

fn decode_data<T: serde::de::DeserializeOwned>(envelope: &EngineEnvelope) -> Result<T, ApiError> {
    let data = envelope
        .data
        .clone()
        .ok_or_else(|| ApiError::internal("engine reply missing data"))?;
    serde_json::from_value(data).map_err(|e| ApiError::internal(format!("malformed engine reply: {e}")))
}

pub async fn place_order(
    State(state): State<Arc<AppState>>,
    ValidatedPlaceOrder(req): ValidatedPlaceOrder,
) -> Result<impl IntoResponse, ApiError> {
    let payload = OrderPayload {
        account_id: req.account_id.clone(),
        symbol: req.symbol.clone(),
        side: req.side,
        order_type: req.order_type,
        price: req.price,
        quantity: req.quantity,
        idempotency_key: req.idempotency_key.clone(),
        client_order_id: req.client_order_id.clone(),
    };

    let start = Instant::now();
    let envelope = state.engine.place_order(payload).await.map_err(transport_error)?;
    let latency = start.elapsed().as_secs_f64();

    if !envelope.success {
        let error = envelope
            .error
            .unwrap_or_else(|| EngineError {
                code: "UNKNOWN".to_string(),
                message: "engine rejected the order".to_string(),
            });
        crate::metrics::record_order_rejected(&error.code);
        return Err(business_error(axum::http::StatusCode::BAD_REQUEST, error));
    }

    let data: PlaceOrderData = decode_data(&envelope)?;

    let side = side_label(req.side);
    let order_type = type_label(req.order_type);
    let status = status_label(data.order.status);
    crate::metrics::record_order(side, order_type, status, latency);

    let volume: i64 = data.trades.iter().map(|t| t.quantity).sum();
    crate::metrics::record_trades(&data.order.symbol, data.trades.len() as u64, volume);

    Ok(Json(PlaceOrderResponse {
        order: data.order,
        trades: data.trades,
    }))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let envelope = state.engine.get_order(order_id).await.map_err(transport_error)?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(not_found_error);
        return Err(business_error(axum::http::StatusCode::NOT_FOUND, error));
    }

    let data: OrderData = decode_data(&envelope)?;
    Ok(Json(OrderResponse { order: data.order }))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let envelope = state.engine.cancel_order(order_id).await.map_err(transport_error)?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(not_found_error);
        return Err(business_error(axum::http::StatusCode::NOT_FOUND, error));
    }

    let data: OrderData = decode_data(&envelope)?;
    Ok(Json(OrderResponse { order: data.order }))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.to_uppercase();
    let depth = query.depth.unwrap_or(DEFAULT_BOOK_DEPTH);

    let envelope = state
        .engine
        .get_book(&symbol, depth)
        .await
        .map_err(transport_error)?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(|| EngineError {
            code: "ENGINE_ERROR".to_string(),
            message: "engine failed to return book".to_string(),
        });
        return Err(business_error(axum::http::StatusCode::INTERNAL_SERVER_ERROR, error));
    }

    let data: BookData = decode_data(&envelope)?;

    crate::metrics::set_book_depth(&data.symbol, "bid", data.bids.len() as i64);
    crate::metrics::set_book_depth(&data.symbol, "ask", data.asks.len() as i64);

    Ok(Json(OrderBookResponse {
        symbol: data.symbol,
        bids: data.bids,
        asks: data.asks,
    }))
}

pub async fn get_trades(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<TradesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.to_uppercase();
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRADES_LIMIT)
        .min(MAX_TRADES_LIMIT);

    let envelope = state
        .engine
        .get_trades(&symbol, limit)
        .await
        .map_err(transport_error)?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(|| EngineError {
            code: "ENGINE_ERROR".to_string(),
            message: "engine failed to return trades".to_string(),
        });
        return Err(business_error(axum::http::StatusCode::INTERNAL_SERVER_ERROR, error));
    }

    let data: TradesData = decode_data(&envelope)?;
    Ok(Json(TradesResponse {
        symbol: data.symbol,
        trades: data.trades,
    }))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let envelope = state.engine.get_stats().await.map_err(transport_error)?;

    if !envelope.success {
        let error = envelope.error.unwrap_or_else(|| EngineError {
            code: "ENGINE_ERROR".to_string(),
            message: "engine failed to return stats".to_string(),
        });
        return Err(business_error(axum::http::StatusCode::INTERNAL_SERVER_ERROR, error));
    }

    let data: StatsData = decode_data(&envelope)?;
    Ok(Json(StatsResponse {
        total_orders: data.total_orders,
        total_trades: data.total_trades,
        total_cancels: data.total_cancels,
        total_rejects: data.total_rejects,
        event_sequence: data.event_sequence,
    }))
}

/// `health` must not throw (§4.11): any transport failure just flips the
/// `engine_connected` gauge and reports `degraded`, it never surfaces a
/// 5xx to the caller.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.health().await {
        Ok(envelope) if envelope.success => {
            crate::metrics::set_engine_connected(true);
            let timestamp_ns = envelope
                .data
                .as_ref()
                .and_then(|d| d.get("timestamp_ns"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            Json(HealthResponse {
                status: "healthy",
                engine_connected: true,
                timestamp_ns,
            })
        }
        _ => {
            crate::metrics::set_engine_connected(false);
            Json(HealthResponse {
                status: "degraded",
                engine_connected: false,
                timestamp_ns: 0,
            })
        }
    }
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics_handle.render();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(serde::Serialize)]
pub struct RootResponse {
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        service: "aztec-exchange",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn not_found_error() -> EngineError {
    EngineError {
        code: "NOT_FOUND".to_string(),
        message: "order not found".to_string(),
    }
}

/// Parses the `{id}` path segment as an `i64`. Taken as a `Path<String>`
/// rather than `Path<i64>` so a non-numeric segment comes back through
/// `ApiError`'s envelope (§6/§7) instead of axum's own `PathRejection`,
/// which would bypass the global error shape entirely.
fn parse_order_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::validation("order_id: must be an integer"))
}

fn side_label(side: crate::engine::Side) -> &'static str {
    match side {
        crate::engine::Side::Buy => "BUY",
        crate::engine::Side::Sell => "SELL",
    }
}

fn type_label(order_type: crate::engine::OrderType) -> &'static str {
    match order_type {
        crate::engine::OrderType::Limit => "LIMIT",
        crate::engine::OrderType::Market => "MARKET",
    }
}

fn status_label(status: crate::engine::OrderStatus) -> &'static str {
    match status {
        crate::engine::OrderStatus::New => "NEW",
        crate::engine::OrderStatus::Partial => "PARTIAL",
        crate::engine::OrderStatus::Filled => "FILLED",
        crate::engine::OrderStatus::Cancelled => "CANCELLED",
        crate::engine::OrderStatus::Rejected => "REJECTED",
    }
}
