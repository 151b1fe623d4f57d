//! Insertion-ordered, grow-only order collection.
//!
//! Orders are never removed. Positions reported by
//! [`MembershipChange::Added`] are therefore stable for the set's lifetime.

use std::collections::HashMap;

use rdk_field::CurrencyKey;
use serde::Serialize;
use tracing::info;

use crate::order::{check_price, Order, OrderDraft, OrderError, OrderId};

/// Structural change to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipChange {
    /// `position` is zero-based.
    Added { id: OrderId, position: usize },
}

#[derive(Debug, Clone, Default)]
pub struct OrderSet {
    ids: Vec<OrderId>,
    orders: HashMap<OrderId, Order>,
}

impl OrderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn require(&self, id: &OrderId) -> Result<&Order, OrderError> {
        self.orders
            .get(id)
            .ok_or(OrderError::UnknownOrder { id: *id })
    }

    /// Id at zero-based `position`.
    pub fn id_at(&self, position: usize) -> Option<OrderId> {
        self.ids.get(position).copied()
    }

    /// Append `draft`, generating an id if it has none.
    ///
    /// Currency membership is not checked here; the caller validates it
    /// against the field registry before inserting.
    pub fn add(&mut self, draft: OrderDraft) -> Result<MembershipChange, OrderError> {
        check_price(draft.id, draft.price)?;
        let id = draft.id.unwrap_or_else(OrderId::generate);
        if self.orders.contains_key(&id) {
            return Err(OrderError::DuplicateOrder { id });
        }

        let position = self.ids.len();
        info!(order = %id, title = %draft.title, price = draft.price, currency = %draft.currency, position, "order added");
        self.ids.push(id);
        self.orders.insert(
            id,
            Order {
                id,
                title: draft.title,
                price: draft.price,
                currency: draft.currency,
            },
        );

        Ok(MembershipChange::Added { id, position })
    }

    /// Returns the previous price.
    pub fn set_price(&mut self, id: &OrderId, price: f64) -> Result<f64, OrderError> {
        check_price(Some(*id), price)?;
        let order = self
            .orders
            .get_mut(id)
            .ok_or(OrderError::UnknownOrder { id: *id })?;
        Ok(std::mem::replace(&mut order.price, price))
    }

    /// Returns the previous currency.
    pub fn set_currency(
        &mut self,
        id: &OrderId,
        currency: CurrencyKey,
    ) -> Result<CurrencyKey, OrderError> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or(OrderError::UnknownOrder { id: *id })?;
        Ok(std::mem::replace(&mut order.currency, currency))
    }

    /// Orders in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.ids.iter().filter_map(|id| self.orders.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CurrencyKey {
        CurrencyKey::parse(s).unwrap()
    }

    #[test]
    fn add_appends_and_reports_position() {
        let mut set = OrderSet::new();
        let a = set.add(OrderDraft::new("a", 8.0, key("usd"))).unwrap();
        let b = set.add(OrderDraft::new("b", 750.0, key("aus"))).unwrap();

        let MembershipChange::Added { id: id_a, position } = a;
        assert_eq!(position, 0);
        let MembershipChange::Added { id: id_b, position } = b;
        assert_eq!(position, 1);

        let titles: Vec<&str> = set.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(set.id_at(0), Some(id_a));
        assert_eq!(set.id_at(1), Some(id_b));
        assert_eq!(set.id_at(2), None);
    }

    #[test]
    fn supplied_id_is_kept_and_duplicates_refused() {
        let mut set = OrderSet::new();
        let id = OrderId::generate();
        set.add(OrderDraft::new("a", 1.0, key("eur")).with_id(id))
            .unwrap();
        assert!(set.contains(&id));
        let err = set
            .add(OrderDraft::new("b", 2.0, key("eur")).with_id(id))
            .unwrap_err();
        assert_eq!(err, OrderError::DuplicateOrder { id });
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn setters_return_previous_value() {
        let mut set = OrderSet::new();
        let MembershipChange::Added { id, .. } =
            set.add(OrderDraft::new("a", 8.0, key("usd"))).unwrap();

        assert_eq!(set.set_price(&id, 10.0).unwrap(), 8.0);
        assert_eq!(set.set_currency(&id, key("eur")).unwrap(), key("usd"));
        let order = set.require(&id).unwrap();
        assert_eq!(order.price, 10.0);
        assert_eq!(order.currency, key("eur"));
    }

    #[test]
    fn invalid_price_leaves_set_untouched() {
        let mut set = OrderSet::new();
        assert!(set.add(OrderDraft::new("a", -1.0, key("usd"))).is_err());
        assert!(set.is_empty());

        let MembershipChange::Added { id, .. } =
            set.add(OrderDraft::new("a", 8.0, key("usd"))).unwrap();
        assert!(set.set_price(&id, f64::NAN).is_err());
        assert_eq!(set.require(&id).unwrap().price, 8.0);
    }

    #[test]
    fn unknown_order() {
        let mut set = OrderSet::new();
        let id = OrderId::generate();
        assert!(set.get(&id).is_none());
        assert_eq!(
            set.set_price(&id, 1.0).unwrap_err(),
            OrderError::UnknownOrder { id }
        );
        assert!(set.set_currency(&id, key("usd")).is_err());
    }
}
