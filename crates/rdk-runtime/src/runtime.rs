//! Single-task event loop around [`DeskEngine`].
//!
//! One tokio task owns the engine and drains one unbounded queue. User
//! commands, snapshot requests, debounce expiries and oracle answers are all
//! messages on that queue, so every input is processed in arrival order and
//! the engine is never touched concurrently.
//!
//! Debounce timers and oracle calls run as separate tasks holding only a
//! weak sender. A timer is aborted and re-armed on every edit; an oracle
//! call is never aborted, its answer simply arrives stale. Dropping every
//! [`DeskHandle`] closes the queue and ends the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rdk_field::{AcceptedValueStream, CurrencyKey, Generation, Outcome, ValidationOracle};
use rdk_orders::{OrderDraft, OrderId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{CommandReply, DeskCommand, DeskEffect, DeskEngine, DeskStep};
use crate::error::DeskError;
use crate::notify::DeskNotification;
use crate::views::{DeskSnapshot, FieldView, OrderView};

/// Event-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub debounce: Duration,
    pub notification_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(rdk_field::DEFAULT_DEBOUNCE_MS),
            notification_capacity: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue messages
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<T, DeskError>>;

enum Msg {
    Command {
        cmd: DeskCommand,
        reply: Reply<CommandReply>,
    },
    Snapshot {
        reply: oneshot::Sender<DeskSnapshot>,
    },
    AcceptedStream {
        key: CurrencyKey,
        reply: Reply<AcceptedValueStream>,
    },
    DebounceElapsed {
        key: CurrencyKey,
        generation: Generation,
    },
    ValidationSettled {
        key: CurrencyKey,
        generation: Generation,
        ok: bool,
    },
}

// ---------------------------------------------------------------------------
// DeskHandle
// ---------------------------------------------------------------------------

/// Cloneable client of a running desk.
#[derive(Clone)]
pub struct DeskHandle {
    tx: mpsc::UnboundedSender<Msg>,
    notify: broadcast::Sender<DeskNotification>,
}

impl DeskHandle {
    pub async fn edit_field(&self, key: CurrencyKey, value: f64) -> Result<FieldView, DeskError> {
        self.command(DeskCommand::EditField { key, value })
            .await
            .and_then(expect_field)
    }

    pub async fn cancel_field(&self, key: CurrencyKey) -> Result<FieldView, DeskError> {
        self.command(DeskCommand::CancelField { key })
            .await
            .and_then(expect_field)
    }

    pub async fn edit_order_price(&self, id: OrderId, price: f64) -> Result<OrderView, DeskError> {
        self.command(DeskCommand::EditOrderPrice { id, price })
            .await
            .and_then(expect_order)
    }

    pub async fn edit_order_currency(
        &self,
        id: OrderId,
        currency: CurrencyKey,
    ) -> Result<OrderView, DeskError> {
        self.command(DeskCommand::EditOrderCurrency { id, currency })
            .await
            .and_then(expect_order)
    }

    /// `None` adds a random order in the desk's default currency.
    pub async fn add_order(&self, draft: Option<OrderDraft>) -> Result<OrderView, DeskError> {
        self.command(DeskCommand::AddOrder { draft })
            .await
            .and_then(expect_order)
    }

    pub async fn snapshot(&self) -> Result<DeskSnapshot, DeskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Snapshot { reply })?;
        rx.await.map_err(|_| DeskError::Closed)
    }

    /// Receiver that only wakes when `key`'s accepted value changes.
    pub async fn accepted_value_stream(
        &self,
        key: CurrencyKey,
    ) -> Result<AcceptedValueStream, DeskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::AcceptedStream { key, reply })?;
        rx.await.map_err(|_| DeskError::Closed)?
    }

    /// Notifications published after every processed input.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskNotification> {
        self.notify.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn command(&self, cmd: DeskCommand) -> Result<CommandReply, DeskError> {
        let (reply, rx) = oneshot::channel();
        self.send(Msg::Command { cmd, reply })?;
        rx.await.map_err(|_| DeskError::Closed)?
    }

    fn send(&self, msg: Msg) -> Result<(), DeskError> {
        self.tx.send(msg).map_err(|_| DeskError::Closed)
    }
}

// The engine always answers a field command with a field view and an order
// command with an order view; a mismatch is treated as a dead loop.
fn expect_field(reply: CommandReply) -> Result<FieldView, DeskError> {
    match reply {
        CommandReply::Field(view) => Ok(view),
        CommandReply::Order(_) => Err(DeskError::Closed),
    }
}

fn expect_order(reply: CommandReply) -> Result<OrderView, DeskError> {
    match reply {
        CommandReply::Order(view) => Ok(view),
        CommandReply::Field(_) => Err(DeskError::Closed),
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Start the event loop. Must be called inside a tokio runtime.
///
/// The returned task finishes once every [`DeskHandle`] is dropped.
pub fn spawn_desk(
    engine: DeskEngine,
    oracle: Arc<dyn ValidationOracle>,
    settings: RuntimeSettings,
) -> (DeskHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (notify, _rx) = broadcast::channel(settings.notification_capacity.max(1));

    let actor = DeskActor {
        engine,
        oracle,
        debounce: settings.debounce,
        timers: HashMap::new(),
        tx: tx.downgrade(),
        notify: notify.clone(),
    };
    info!(
        oracle = actor.oracle.name(),
        debounce_ms = settings.debounce.as_millis() as u64,
        "desk runtime starting"
    );
    let task = tokio::spawn(actor.run(rx));

    (DeskHandle { tx, notify }, task)
}

struct DeskActor {
    engine: DeskEngine,
    oracle: Arc<dyn ValidationOracle>,
    debounce: Duration,
    /// At most one live debounce timer per field.
    timers: HashMap<CurrencyKey, JoinHandle<()>>,
    tx: mpsc::WeakUnboundedSender<Msg>,
    notify: broadcast::Sender<DeskNotification>,
}

impl DeskActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        info!("desk runtime stopped");
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Command { cmd, reply } => {
                let result = self.engine.execute(cmd).map(|(answer, step)| {
                    self.perform(step);
                    answer
                });
                let _ = reply.send(result);
            }
            Msg::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            Msg::AcceptedStream { key, reply } => {
                let _ = reply.send(self.engine.accepted_value_stream(&key));
            }
            Msg::DebounceElapsed { key, generation } => {
                match self.engine.on_debounce_elapsed(&key, generation) {
                    Ok((outcome, step)) => {
                        if outcome == Outcome::Applied {
                            self.timers.remove(&key);
                        }
                        self.perform(step);
                    }
                    Err(e) => warn!(field = %key, error = %e, "debounce expiry for unknown field"),
                }
            }
            Msg::ValidationSettled {
                key,
                generation,
                ok,
            } => match self.engine.on_validation_settled(&key, generation, ok) {
                Ok((outcome, step)) => {
                    debug!(field = %key, %generation, ok, ?outcome, "validation settled");
                    self.perform(step);
                }
                Err(e) => warn!(field = %key, error = %e, "validation result for unknown field"),
            },
        }
    }

    fn perform(&mut self, step: DeskStep) {
        for effect in step.effects {
            match effect {
                DeskEffect::ArmDebounce { key, generation } => self.arm(key, generation),
                DeskEffect::DisarmDebounce { key } => self.disarm(&key),
                DeskEffect::Validate {
                    key,
                    generation,
                    candidate,
                } => self.validate(key, generation, candidate),
            }
        }
        for note in step.notifications {
            // No subscribers is fine.
            let _ = self.notify.send(note);
        }
    }

    fn arm(&mut self, key: CurrencyKey, generation: Generation) {
        self.disarm(&key);
        let tx = self.tx.clone();
        // Deadline is fixed at arm time, not when the task is first polled.
        let deadline = tokio::time::Instant::now() + self.debounce;
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Msg::DebounceElapsed {
                    key: timer_key,
                    generation,
                });
            }
        });
        self.timers.insert(key, timer);
    }

    fn disarm(&mut self, key: &CurrencyKey) {
        if let Some(timer) = self.timers.remove(key) {
            timer.abort();
        }
    }

    fn validate(&mut self, key: CurrencyKey, generation: Generation, candidate: f64) {
        debug!(
            field = %key,
            %generation,
            candidate,
            oracle = self.oracle.name(),
            "validation requested"
        );
        let oracle = Arc::clone(&self.oracle);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ok = oracle.validate(&key, candidate).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Msg::ValidationSettled {
                    key,
                    generation,
                    ok,
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdk_field::{FieldStatus, FixedOracle};

    fn key(s: &str) -> CurrencyKey {
        CurrencyKey::parse(s).unwrap()
    }

    fn start(oracle: FixedOracle) -> (DeskHandle, JoinHandle<()>) {
        let engine = DeskEngine::new([(key("eur"), 1.12), (key("usd"), 1.33)], key("usd")).unwrap();
        spawn_desk(engine, Arc::new(oracle), RuntimeSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn edit_is_validated_after_debounce() {
        let (desk, _task) = start(FixedOracle::approve_all());
        let mut accepted = desk.accepted_value_stream(key("eur")).await.unwrap();

        let view = desk.edit_field(key("eur"), 100.0).await.unwrap();
        assert_eq!(view.status, FieldStatus::Dirty);

        // Paused clock: sleeping lets the debounce and the oracle run.
        tokio::time::sleep(Duration::from_millis(600)).await;
        accepted.changed().await.unwrap();
        assert_eq!(*accepted.borrow(), 100.0);

        let snap = desk.snapshot().await.unwrap();
        let eur = snap.field(&key("eur")).unwrap();
        assert_eq!(eur.status, FieldStatus::Accepted);
        assert_eq!(eur.accepted_value, 100.0);
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_loop() {
        let (desk, task) = start(FixedOracle::approve_all());
        let other = desk.clone();
        drop(desk);
        assert!(!other.is_closed());
        drop(other);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn errors_come_back_typed() {
        let (desk, _task) = start(FixedOracle::reject_all());
        let err = desk.edit_field(key("cad"), 1.0).await.unwrap_err();
        assert_eq!(err.kind(), crate::DeskErrorKind::NotFound);
        let err = desk.edit_field(key("eur"), 0.0).await.unwrap_err();
        assert_eq!(err.kind(), crate::DeskErrorKind::Invalid);
    }

    #[tokio::test]
    async fn notifications_are_broadcast() {
        let (desk, _task) = start(FixedOracle::approve_all());
        let mut rx = desk.subscribe();
        let order = desk.add_order(None).await.unwrap();
        match rx.recv().await.unwrap() {
            DeskNotification::OrderAdded { order: added, position } => {
                assert_eq!(added.id, order.id);
                assert_eq!(position, 0);
            }
            other => panic!("unexpected notification {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            DeskNotification::TotalChanged { .. }
        ));
    }
}
