//! Axum router and all HTTP handlers for rdk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers only translate HTTP to [`DeskHandle`] calls
//! and desk errors to status codes.
//!
//! [`DeskHandle`]: rdk_runtime::DeskHandle

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use rdk_field::CurrencyKey;
use rdk_orders::{OrderDraft, OrderId};
use rdk_runtime::{DeskError, DeskErrorKind};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{
        AddOrderRequest, EditCurrencyRequest, EditFieldRequest, EditPriceRequest, ErrorResponse,
        HealthResponse, OrdersResponse,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/snapshot", get(snapshot))
        .route("/v1/stream", get(stream))
        .route("/v1/fields/:key", get(field_get))
        .route("/v1/fields/:key/edit", post(field_edit))
        .route("/v1/fields/:key/cancel", post(field_cancel))
        .route("/v1/orders", get(orders_list).post(orders_add))
        .route("/v1/orders/:id/price", post(order_price))
        .route("/v1/orders/:id/currency", post(order_currency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, kind: &str, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            kind: kind.to_string(),
        }),
    )
        .into_response()
}

fn desk_error(e: DeskError) -> Response {
    let kind = e.kind();
    let status = match kind {
        DeskErrorKind::NotFound => StatusCode::NOT_FOUND,
        DeskErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        DeskErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    error_response(status, kind.as_str(), e)
}

fn parse_key(raw: &str) -> Result<CurrencyKey, Response> {
    CurrencyKey::parse(raw)
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid", e))
}

fn parse_order_id(raw: &str) -> Result<OrderId, Response> {
    raw.parse::<OrderId>()
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid", e))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: !st.desk.is_closed(),
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/snapshot
// ---------------------------------------------------------------------------

pub(crate) async fn snapshot(State(st): State<Arc<AppState>>) -> Response {
    match st.desk.snapshot().await {
        Ok(snap) => (StatusCode::OK, Json(snap)).into_response(),
        Err(e) => desk_error(e),
    }
}

// ---------------------------------------------------------------------------
// /v1/fields/:key
// ---------------------------------------------------------------------------

pub(crate) async fn field_get(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let key = match parse_key(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.desk.snapshot().await {
        Ok(snap) => match snap.field(&key) {
            Some(view) => (StatusCode::OK, Json(view.clone())).into_response(),
            None => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("unknown field '{key}'"),
            ),
        },
        Err(e) => desk_error(e),
    }
}

pub(crate) async fn field_edit(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(req): Json<EditFieldRequest>,
) -> Response {
    let key = match parse_key(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.desk.edit_field(key, req.value).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => desk_error(e),
    }
}

pub(crate) async fn field_cancel(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let key = match parse_key(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.desk.cancel_field(key).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => desk_error(e),
    }
}

// ---------------------------------------------------------------------------
// /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn orders_list(State(st): State<Arc<AppState>>) -> Response {
    match st.desk.snapshot().await {
        Ok(snap) => (
            StatusCode::OK,
            Json(OrdersResponse {
                orders: snap.orders,
                total: snap.total,
            }),
        )
            .into_response(),
        Err(e) => desk_error(e),
    }
}

/// Add an order. An empty body adds a random one in the default currency.
pub(crate) async fn orders_add(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let draft = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let req: AddOrderRequest = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid",
                    format!("bad order body: {e}"),
                )
            }
        };
        let currency = match parse_key(&req.currency) {
            Ok(k) => k,
            Err(resp) => return resp,
        };
        Some(OrderDraft::new(req.title, req.price, currency))
    };

    match st.desk.add_order(draft).await {
        Ok(view) => {
            info!(order = %view.id, title = %view.title, "order added via http");
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(e) => desk_error(e),
    }
}

pub(crate) async fn order_price(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(req): Json<EditPriceRequest>,
) -> Response {
    let id = match parse_order_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match st.desk.edit_order_price(id, req.price).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => desk_error(e),
    }
}

pub(crate) async fn order_currency(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(req): Json<EditCurrencyRequest>,
) -> Response {
    let id = match parse_order_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let currency = match parse_key(&req.currency) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match st.desk.edit_order_currency(id, currency).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => desk_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
