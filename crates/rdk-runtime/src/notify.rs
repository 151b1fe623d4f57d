use serde::{Deserialize, Serialize};

use crate::views::{FieldView, OrderView};

/// Change notifications fanned out to subscribers after each processed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskNotification {
    FieldChanged(FieldView),
    OrderAdded { order: OrderView, position: usize },
    OrderChanged(OrderView),
    TotalChanged { total: f64 },
}

impl DeskNotification {
    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            DeskNotification::FieldChanged(_) => "field_changed",
            DeskNotification::OrderAdded { .. } => "order_added",
            DeskNotification::OrderChanged(_) => "order_changed",
            DeskNotification::TotalChanged { .. } => "total_changed",
        }
    }
}
