//! Read models handed to render boundaries.

use rdk_field::{CurrencyKey, FieldSnapshot, FieldStatus, Generation};
use rdk_orders::{Order, OrderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldView {
    pub key: CurrencyKey,
    pub status: FieldStatus,
    /// What the input shows: candidate while DIRTY/IN_PROGRESS, accepted
    /// otherwise.
    pub display_value: f64,
    pub accepted_value: f64,
    pub generation: Generation,
    /// Input is locked and cancel is offered.
    pub locked: bool,
}

impl From<FieldSnapshot> for FieldView {
    fn from(s: FieldSnapshot) -> Self {
        Self {
            locked: s.status.is_locked(),
            key: s.key,
            status: s.status,
            display_value: s.display_value,
            accepted_value: s.accepted_value,
            generation: s.generation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub title: String,
    pub price: f64,
    pub currency: CurrencyKey,
    pub base_price: f64,
}

impl OrderView {
    pub(crate) fn new(order: &Order, base_price: f64) -> Self {
        Self {
            id: order.id,
            title: order.title.clone(),
            price: order.price,
            currency: order.currency.clone(),
            base_price,
        }
    }
}

/// Everything a render boundary needs to draw the desk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskSnapshot {
    pub fields: Vec<FieldView>,
    pub orders: Vec<OrderView>,
    pub total: f64,
}

impl DeskSnapshot {
    pub fn field(&self, key: &CurrencyKey) -> Option<&FieldView> {
        self.fields.iter().find(|f| &f.key == key)
    }

    pub fn order(&self, id: &OrderId) -> Option<&OrderView> {
        self.orders.iter().find(|o| &o.id == id)
    }
}
