//! Per-order derivation chains and the aggregate total.
//!
//! Each attached order owns one chain:
//!
//! ```text
//! price ─┐
//!        ├─► basePrice = price / acceptedRate(currency)
//! currency ─► SubscriptionHandle(order, currency) ─► acceptedRate
//! ```
//!
//! The graph holds only keys (order id, currency key) and derived numbers.
//! Rates come in through [`AcceptedRates`] on attach/retarget, and through
//! [`DerivationGraph::on_accepted_changed`] when a field promotes a new
//! value. A subscription is always disposed before its replacement is
//! created, so a retargeted chain never sees updates for its old currency.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use rdk_field::{AcceptedRates, CurrencyKey};
use serde::Serialize;
use tracing::debug;

use crate::order::{Order, OrderId};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Live link from one order to one currency's accepted value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionHandle {
    pub order: OrderId,
    pub key: CurrencyKey,
}

#[derive(Debug, Clone)]
struct Chain {
    /// Attach order; drives total summation and fan-out ordering.
    position: usize,
    price: f64,
    rate: f64,
    base_price: f64,
    handle: SubscriptionHandle,
}

impl Chain {
    fn recompute(&mut self) -> f64 {
        let previous = self.base_price;
        self.base_price = self.price / self.rate;
        previous
    }
}

/// Base price of one chain before and after a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChainUpdate {
    pub id: OrderId,
    pub previous: f64,
    pub base_price: f64,
}

impl ChainUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.base_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivationError {
    /// The order references a currency with no field.
    UnknownCurrency { order: OrderId, key: CurrencyKey },
    /// No chain exists for this order.
    UnknownOrder { id: OrderId },
    /// `attach` called twice for the same order.
    AlreadyAttached { id: OrderId },
}

impl fmt::Display for DerivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationError::UnknownCurrency { order, key } => {
                write!(f, "order '{order}' references unknown currency '{key}'")
            }
            DerivationError::UnknownOrder { id } => write!(f, "no derivation chain for order '{id}'"),
            DerivationError::AlreadyAttached { id } => write!(f, "order '{id}' is already attached"),
        }
    }
}

impl std::error::Error for DerivationError {}

// ---------------------------------------------------------------------------
// DerivationGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DerivationGraph {
    sequence: Vec<OrderId>,
    chains: HashMap<OrderId, Chain>,
    /// currency -> orders currently subscribed to it.
    subscribers: HashMap<CurrencyKey, BTreeSet<OrderId>>,
    total: f64,
}

impl DerivationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Create the chain for `order`, seeded with its currency's current
    /// accepted value. Nothing changes on error.
    pub fn attach<R: AcceptedRates + ?Sized>(
        &mut self,
        order: &Order,
        rates: &R,
    ) -> Result<ChainUpdate, DerivationError> {
        if self.chains.contains_key(&order.id) {
            return Err(DerivationError::AlreadyAttached { id: order.id });
        }
        let rate = lookup(rates, order.id, &order.currency)?;

        let handle = self.subscribe(order.id, order.currency.clone());
        let mut chain = Chain {
            position: self.sequence.len(),
            price: order.price,
            rate,
            base_price: 0.0,
            handle,
        };
        chain.recompute();
        let base_price = chain.base_price;

        self.sequence.push(order.id);
        self.chains.insert(order.id, chain);
        self.refresh_total();
        debug!(order = %order.id, currency = %order.currency, rate, base_price, "chain attached");

        // A fresh chain counts as a change from zero.
        Ok(ChainUpdate {
            id: order.id,
            previous: 0.0,
            base_price,
        })
    }

    /// Recompute after the order's price changed.
    pub fn reprice(&mut self, order: &Order) -> Result<ChainUpdate, DerivationError> {
        let chain = self
            .chains
            .get_mut(&order.id)
            .ok_or(DerivationError::UnknownOrder { id: order.id })?;
        chain.price = order.price;
        let previous = chain.recompute();
        let update = ChainUpdate {
            id: order.id,
            previous,
            base_price: chain.base_price,
        };
        self.refresh_total();
        Ok(update)
    }

    /// Re-point the chain at the order's (new) currency.
    ///
    /// The old handle is disposed before the new one is created. The new
    /// key is checked first, so an unknown currency leaves the old
    /// subscription in place.
    pub fn retarget<R: AcceptedRates + ?Sized>(
        &mut self,
        order: &Order,
        rates: &R,
    ) -> Result<ChainUpdate, DerivationError> {
        if !self.chains.contains_key(&order.id) {
            return Err(DerivationError::UnknownOrder { id: order.id });
        }
        let rate = lookup(rates, order.id, &order.currency)?;

        let old = match self.chains.get(&order.id) {
            Some(chain) => chain.handle.clone(),
            None => return Err(DerivationError::UnknownOrder { id: order.id }),
        };
        self.unsubscribe(&old);
        let handle = self.subscribe(order.id, order.currency.clone());

        let chain = self
            .chains
            .get_mut(&order.id)
            .ok_or(DerivationError::UnknownOrder { id: order.id })?;
        chain.handle = handle;
        chain.price = order.price;
        chain.rate = rate;
        let previous = chain.recompute();
        let update = ChainUpdate {
            id: order.id,
            previous,
            base_price: chain.base_price,
        };
        debug!(order = %order.id, from = %old.key, to = %order.currency, rate, "chain retargeted");
        self.refresh_total();
        Ok(update)
    }

    /// Push a newly accepted rate through every chain subscribed to `key`.
    ///
    /// Returns the updates whose base price actually moved, in attach order.
    pub fn on_accepted_changed(&mut self, key: &CurrencyKey, rate: f64) -> Vec<ChainUpdate> {
        let Some(ids) = self.subscribers.get(key) else {
            return Vec::new();
        };

        let mut updates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chain) = self.chains.get_mut(id) {
                chain.rate = rate;
                let previous = chain.recompute();
                updates.push((
                    chain.position,
                    ChainUpdate {
                        id: *id,
                        previous,
                        base_price: chain.base_price,
                    },
                ));
            }
        }
        updates.sort_by_key(|(position, _)| *position);

        let changed: Vec<ChainUpdate> = updates
            .into_iter()
            .map(|(_, u)| u)
            .filter(ChainUpdate::changed)
            .collect();
        if !changed.is_empty() {
            self.refresh_total();
        }
        debug!(currency = %key, rate, changed = changed.len(), "accepted rate fanned out");
        changed
    }

    pub fn base_price(&self, id: &OrderId) -> Option<f64> {
        self.chains.get(id).map(|c| c.base_price)
    }

    pub fn handle(&self, id: &OrderId) -> Option<&SubscriptionHandle> {
        self.chains.get(id).map(|c| &c.handle)
    }

    /// Orders currently subscribed to `key`, in attach order.
    pub fn subscribers_of(&self, key: &CurrencyKey) -> Vec<OrderId> {
        let mut ids: Vec<(usize, OrderId)> = self
            .subscribers
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.chains.get(id).map(|c| (c.position, *id)))
            .collect();
        ids.sort_by_key(|(position, _)| *position);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Sum of every chain's base price, accumulated in attach order.
    pub fn total(&self) -> f64 {
        self.total
    }

    fn subscribe(&mut self, order: OrderId, key: CurrencyKey) -> SubscriptionHandle {
        self.subscribers.entry(key.clone()).or_default().insert(order);
        SubscriptionHandle { order, key }
    }

    fn unsubscribe(&mut self, handle: &SubscriptionHandle) {
        if let Some(set) = self.subscribers.get_mut(&handle.key) {
            set.remove(&handle.order);
            if set.is_empty() {
                self.subscribers.remove(&handle.key);
            }
        }
    }

    fn refresh_total(&mut self) {
        self.total = self
            .sequence
            .iter()
            .filter_map(|id| self.chains.get(id))
            .map(|c| c.base_price)
            .sum();
    }
}

fn lookup<R: AcceptedRates + ?Sized>(
    rates: &R,
    order: OrderId,
    key: &CurrencyKey,
) -> Result<f64, DerivationError> {
    rates
        .accepted_rate(key)
        .ok_or_else(|| DerivationError::UnknownCurrency {
            order,
            key: key.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rates(HashMap<CurrencyKey, f64>);

    impl AcceptedRates for Rates {
        fn accepted_rate(&self, key: &CurrencyKey) -> Option<f64> {
            self.0.get(key).copied()
        }
    }

    fn key(s: &str) -> CurrencyKey {
        CurrencyKey::parse(s).unwrap()
    }

    fn rates() -> Rates {
        Rates(HashMap::from([
            (key("eur"), 1.12),
            (key("usd"), 1.33),
            (key("aus"), 1.75),
        ]))
    }

    fn order(price: f64, currency: &str) -> Order {
        Order {
            id: OrderId::generate(),
            title: "t".to_string(),
            price,
            currency: key(currency),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn attach_seeds_with_current_rate() {
        let mut graph = DerivationGraph::new();
        let o = order(8.0, "usd");
        let update = graph.attach(&o, &rates()).unwrap();
        assert!(close(update.base_price, 8.0 / 1.33));
        assert!(close(graph.total(), 8.0 / 1.33));
        assert_eq!(graph.subscribers_of(&key("usd")), vec![o.id]);
    }

    #[test]
    fn attach_unknown_currency_fails_without_side_effects() {
        let mut graph = DerivationGraph::new();
        let o = order(8.0, "cad");
        assert_eq!(
            graph.attach(&o, &rates()).unwrap_err(),
            DerivationError::UnknownCurrency {
                order: o.id,
                key: key("cad")
            }
        );
        assert!(graph.is_empty());
        assert!(graph.subscribers_of(&key("cad")).is_empty());
    }

    #[test]
    fn attach_twice_is_refused() {
        let mut graph = DerivationGraph::new();
        let o = order(1.0, "eur");
        graph.attach(&o, &rates()).unwrap();
        assert!(matches!(
            graph.attach(&o, &rates()),
            Err(DerivationError::AlreadyAttached { .. })
        ));
    }

    #[test]
    fn reprice_recomputes_and_updates_total() {
        let mut graph = DerivationGraph::new();
        let mut o = order(8.0, "usd");
        graph.attach(&o, &rates()).unwrap();
        o.price = 13.3;
        let update = graph.reprice(&o).unwrap();
        assert!(update.changed());
        assert!(close(graph.base_price(&o.id).unwrap(), 10.0));
        assert!(close(graph.total(), 10.0));
    }

    #[test]
    fn retarget_disposes_old_subscription_first() {
        let mut graph = DerivationGraph::new();
        let mut o = order(100.0, "eur");
        graph.attach(&o, &rates()).unwrap();

        o.currency = key("usd");
        graph.retarget(&o, &rates()).unwrap();
        assert!(graph.subscribers_of(&key("eur")).is_empty());
        assert_eq!(graph.subscribers_of(&key("usd")), vec![o.id]);
        assert!(close(graph.base_price(&o.id).unwrap(), 100.0 / 1.33));

        // Old currency moving must not touch the chain.
        assert!(graph.on_accepted_changed(&key("eur"), 2.0).is_empty());
        assert!(close(graph.base_price(&o.id).unwrap(), 100.0 / 1.33));

        let updates = graph.on_accepted_changed(&key("usd"), 2.0);
        assert_eq!(updates.len(), 1);
        assert!(close(graph.base_price(&o.id).unwrap(), 50.0));
        assert_eq!(graph.handle(&o.id).unwrap().key, key("usd"));
    }

    #[test]
    fn retarget_to_unknown_keeps_old_subscription() {
        let mut graph = DerivationGraph::new();
        let mut o = order(100.0, "eur");
        graph.attach(&o, &rates()).unwrap();
        o.currency = key("cad");
        assert!(graph.retarget(&o, &rates()).is_err());
        assert_eq!(graph.subscribers_of(&key("eur")), vec![o.id]);
    }

    #[test]
    fn fan_out_reaches_every_subscriber_in_attach_order() {
        let mut graph = DerivationGraph::new();
        let a = order(1.0, "eur");
        let b = order(2.0, "usd");
        let c = order(3.0, "eur");
        for o in [&a, &b, &c] {
            graph.attach(o, &rates()).unwrap();
        }

        let ids: Vec<OrderId> = graph
            .on_accepted_changed(&key("eur"), 1.0)
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(close(graph.total(), 1.0 + 2.0 / 1.33 + 3.0));
    }

    #[test]
    fn zero_price_order_has_zero_base() {
        let mut graph = DerivationGraph::new();
        let o = order(0.0, "aus");
        let update = graph.attach(&o, &rates()).unwrap();
        assert_eq!(update.base_price, 0.0);
        assert!(!update.changed());
        assert_eq!(graph.total(), 0.0);
    }
}
