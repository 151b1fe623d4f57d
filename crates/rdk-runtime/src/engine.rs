//! Synchronous desk engine.
//!
//! Composes the field registry, the order set and the derivation graph.
//! Every input is processed to completion and reports:
//! - the effects the event loop must perform (timers, oracle calls)
//! - the notifications to fan out to subscribers
//!
//! No clock, no tasks, no channels. [`crate::runtime`] owns those.

use rdk_config::DeskConfig;
use rdk_field::{
    AcceptedRates, AcceptedValueStream, CurrencyKey, FieldEffect, FieldEvent, FieldRegistry,
    Generation, Outcome,
};
use rdk_orders::{ChainUpdate, DerivationGraph, MembershipChange, OrderDraft, OrderId, OrderSet};
use tracing::{debug, info, warn};

use crate::error::DeskError;
use crate::notify::DeskNotification;
use crate::views::{DeskSnapshot, FieldView, OrderView};

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// User-intent inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum DeskCommand {
    EditField { key: CurrencyKey, value: f64 },
    CancelField { key: CurrencyKey },
    EditOrderPrice { id: OrderId, price: f64 },
    EditOrderCurrency { id: OrderId, currency: CurrencyKey },
    /// `None` adds a random order in the default currency.
    AddOrder { draft: Option<OrderDraft> },
}

/// Direct answer to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Field(FieldView),
    Order(OrderView),
}

/// Side effect the event loop must carry out, keyed by field.
#[derive(Debug, Clone, PartialEq)]
pub enum DeskEffect {
    ArmDebounce {
        key: CurrencyKey,
        generation: Generation,
    },
    DisarmDebounce {
        key: CurrencyKey,
    },
    Validate {
        key: CurrencyKey,
        generation: Generation,
        candidate: f64,
    },
}

/// Everything produced while processing one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeskStep {
    pub effects: Vec<DeskEffect>,
    pub notifications: Vec<DeskNotification>,
}

// ---------------------------------------------------------------------------
// DeskEngine
// ---------------------------------------------------------------------------

pub struct DeskEngine {
    fields: FieldRegistry,
    orders: OrderSet,
    graph: DerivationGraph,
    default_currency: CurrencyKey,
}

impl DeskEngine {
    /// Empty order book over the given rates.
    pub fn new<I>(seeds: I, default_currency: CurrencyKey) -> Result<Self, DeskError>
    where
        I: IntoIterator<Item = (CurrencyKey, f64)>,
    {
        let fields = FieldRegistry::new(seeds)?;
        if !fields.contains(&default_currency) {
            return Err(DeskError::UnknownCurrency {
                key: default_currency,
            });
        }
        Ok(Self {
            fields,
            orders: OrderSet::new(),
            graph: DerivationGraph::new(),
            default_currency,
        })
    }

    /// Engine seeded with the configured rates and starter orders.
    pub fn from_config(cfg: &DeskConfig) -> Result<Self, DeskError> {
        let mut engine = Self::new(cfg.seeds(), cfg.new_orders.default_currency.clone())?;
        for entry in &cfg.orders {
            let draft = OrderDraft::new(entry.title.clone(), entry.price, entry.currency.clone());
            engine.add_order(Some(draft))?;
        }
        Ok(engine)
    }

    pub fn default_currency(&self) -> &CurrencyKey {
        &self.default_currency
    }

    pub fn total(&self) -> f64 {
        self.graph.total()
    }

    pub fn field_view(&self, key: &CurrencyKey) -> Result<FieldView, DeskError> {
        Ok(self.fields.require(key)?.into())
    }

    pub fn order_view(&self, id: &OrderId) -> Result<OrderView, DeskError> {
        let order = self.orders.require(id)?;
        let base = self
            .graph
            .base_price(id)
            .ok_or(rdk_orders::DerivationError::UnknownOrder { id: *id })?;
        Ok(OrderView::new(order, base))
    }

    /// Zero-based position to id.
    pub fn order_id_at(&self, position: usize) -> Option<OrderId> {
        self.orders.id_at(position)
    }

    pub fn accepted_value_stream(
        &self,
        key: &CurrencyKey,
    ) -> Result<AcceptedValueStream, DeskError> {
        Ok(self.fields.accepted_value_stream(key)?)
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        DeskSnapshot {
            fields: self
                .fields
                .snapshots()
                .into_iter()
                .map(FieldView::from)
                .collect(),
            orders: self
                .orders
                .iter()
                .map(|o| OrderView::new(o, self.graph.base_price(&o.id).unwrap_or(0.0)))
                .collect(),
            total: self.graph.total(),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn execute(&mut self, cmd: DeskCommand) -> Result<(CommandReply, DeskStep), DeskError> {
        let result = match cmd {
            DeskCommand::EditField { key, value } => self
                .apply_field(&key, FieldEvent::Edit { value })
                .map(|(view, _, step)| (CommandReply::Field(view), step)),
            DeskCommand::CancelField { key } => self
                .apply_field(&key, FieldEvent::Cancel)
                .map(|(view, _, step)| (CommandReply::Field(view), step)),
            DeskCommand::EditOrderPrice { id, price } => self
                .edit_order_price(&id, price)
                .map(|(view, step)| (CommandReply::Order(view), step)),
            DeskCommand::EditOrderCurrency { id, currency } => self
                .edit_order_currency(&id, currency)
                .map(|(view, step)| (CommandReply::Order(view), step)),
            DeskCommand::AddOrder { draft } => self
                .add_order(draft)
                .map(|(view, step)| (CommandReply::Order(view), step)),
        };
        if let Err(e) = &result {
            warn!(error = %e, "desk command refused");
        }
        result
    }

    fn edit_order_price(
        &mut self,
        id: &OrderId,
        price: f64,
    ) -> Result<(OrderView, DeskStep), DeskError> {
        self.orders.set_price(id, price)?;
        let order = self.orders.require(id)?;
        let update = self.graph.reprice(order)?;
        debug!(order = %id, price, base_price = update.base_price, "order repriced");
        let step = self.order_updates(&[update])?;
        Ok((self.order_view(id)?, step))
    }

    fn edit_order_currency(
        &mut self,
        id: &OrderId,
        currency: CurrencyKey,
    ) -> Result<(OrderView, DeskStep), DeskError> {
        self.orders.require(id)?;
        if !self.fields.contains(&currency) {
            return Err(DeskError::UnknownCurrency { key: currency });
        }
        self.orders.set_currency(id, currency)?;
        let order = self.orders.require(id)?;
        let update = self.graph.retarget(order, &self.fields)?;
        let step = self.order_updates(&[update])?;
        Ok((self.order_view(id)?, step))
    }

    fn add_order(&mut self, draft: Option<OrderDraft>) -> Result<(OrderView, DeskStep), DeskError> {
        let draft = draft.unwrap_or_else(|| OrderDraft::random(self.default_currency.clone()));
        // Currency first: nothing may be inserted for an unknown key.
        if !self.fields.contains(&draft.currency) {
            return Err(DeskError::UnknownCurrency {
                key: draft.currency,
            });
        }
        let MembershipChange::Added { id, position } = self.orders.add(draft)?;
        let order = self.orders.require(&id)?;
        self.graph.attach(order, &self.fields)?;

        let view = self.order_view(&id)?;
        let step = DeskStep {
            effects: Vec::new(),
            notifications: vec![
                DeskNotification::OrderAdded {
                    order: view.clone(),
                    position,
                },
                DeskNotification::TotalChanged {
                    total: self.graph.total(),
                },
            ],
        };
        Ok((view, step))
    }

    // -----------------------------------------------------------------------
    // Event-loop completions
    // -----------------------------------------------------------------------

    /// A debounce timer armed under `generation` fired.
    pub fn on_debounce_elapsed(
        &mut self,
        key: &CurrencyKey,
        generation: Generation,
    ) -> Result<(Outcome, DeskStep), DeskError> {
        self.apply_field(key, FieldEvent::DebounceTimeout { generation })
            .map(|(_, outcome, step)| (outcome, step))
    }

    /// The oracle answered the request stamped with `generation`.
    pub fn on_validation_settled(
        &mut self,
        key: &CurrencyKey,
        generation: Generation,
        ok: bool,
    ) -> Result<(Outcome, DeskStep), DeskError> {
        self.apply_field(key, FieldEvent::ValidationResult { generation, ok })
            .map(|(_, outcome, step)| (outcome, step))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn apply_field(
        &mut self,
        key: &CurrencyKey,
        event: FieldEvent,
    ) -> Result<(FieldView, Outcome, DeskStep), DeskError> {
        let transition = self.fields.apply(key, &event)?;
        let view = self.field_view(key)?;

        match transition.outcome {
            Outcome::Applied => debug!(
                field = %key,
                from = %transition.from,
                to = %transition.to,
                generation = %view.generation,
                ?event,
                "field transition"
            ),
            Outcome::Stale => debug!(field = %key, ?event, "stale completion discarded"),
            Outcome::Ignored => {
                debug!(field = %key, status = %view.status, ?event, "event ignored")
            }
        }

        let mut step = DeskStep::default();
        if !transition.is_applied() {
            return Ok((view, transition.outcome, step));
        }

        step.effects = transition
            .effects
            .iter()
            .map(|effect| match *effect {
                FieldEffect::ArmDebounce { generation } => DeskEffect::ArmDebounce {
                    key: key.clone(),
                    generation,
                },
                FieldEffect::DisarmDebounce => DeskEffect::DisarmDebounce { key: key.clone() },
                FieldEffect::Validate {
                    generation,
                    candidate,
                } => DeskEffect::Validate {
                    key: key.clone(),
                    generation,
                    candidate,
                },
            })
            .collect();
        step.notifications
            .push(DeskNotification::FieldChanged(view.clone()));

        if let Some(rate) = transition.accepted_changed {
            info!(field = %key, rate, "accepted value changed");
            let updates = self.graph.on_accepted_changed(key, rate);
            let derived = self.order_updates(&updates)?;
            step.notifications.extend(derived.notifications);
        }

        Ok((view, transition.outcome, step))
    }

    /// Notifications for chains that moved, plus the new total if any did.
    fn order_updates(&self, updates: &[ChainUpdate]) -> Result<DeskStep, DeskError> {
        let mut step = DeskStep::default();
        for update in updates.iter().filter(|u| u.changed()) {
            step.notifications
                .push(DeskNotification::OrderChanged(self.order_view(&update.id)?));
        }
        if !step.notifications.is_empty() {
            step.notifications.push(DeskNotification::TotalChanged {
                total: self.graph.total(),
            });
        }
        Ok(step)
    }
}
