//! Request and response types for all rdk-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use rdk_runtime::OrderView;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// /v1/fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditFieldRequest {
    pub value: f64,
}

// ---------------------------------------------------------------------------
// /v1/orders
// ---------------------------------------------------------------------------

/// Body for `POST /v1/orders`. An empty body adds a random order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOrderRequest {
    pub title: String,
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderView>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPriceRequest {
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditCurrencyRequest {
    pub currency: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "not_found" | "invalid" | "unavailable"
    pub kind: String,
}
