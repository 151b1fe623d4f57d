//! A desk wired to a [`ScriptedOracle`] on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rdk_config::load_desk_config_from_strings;
use rdk_field::CurrencyKey;
use rdk_runtime::{
    spawn_desk_from_config, DeskHandle, DeskNotification, DeskSnapshot, FieldView, OrderView,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::oracle::ScriptedOracle;

pub struct DeskHarness {
    pub desk: DeskHandle,
    pub oracle: Arc<ScriptedOracle>,
    pub task: JoinHandle<()>,
    notifications: broadcast::Receiver<DeskNotification>,
}

impl DeskHarness {
    /// Built-in desk (stock rates, four starter orders) plus `overlays`.
    pub fn start(overlays: &[&str]) -> Result<Self> {
        let loaded = load_desk_config_from_strings(overlays).context("harness config")?;
        let oracle = ScriptedOracle::new();
        let (desk, task) = spawn_desk_from_config(&loaded.desk, oracle.clone())
            .context("harness desk failed to start")?;
        let notifications = desk.subscribe();
        Ok(Self {
            desk,
            oracle,
            task,
            notifications,
        })
    }

    /// Rates only, no starter orders.
    pub fn start_empty() -> Result<Self> {
        Self::start(&["orders: []"])
    }

    pub async fn snapshot(&self) -> Result<DeskSnapshot> {
        Ok(self.desk.snapshot().await?)
    }

    pub async fn field(&self, key: &str) -> Result<FieldView> {
        let key = currency(key)?;
        self.snapshot()
            .await?
            .field(&key)
            .cloned()
            .with_context(|| format!("no field '{key}' in snapshot"))
    }

    pub async fn order_at(&self, position: usize) -> Result<OrderView> {
        self.snapshot()
            .await?
            .orders
            .get(position)
            .cloned()
            .with_context(|| format!("no order at position {position}"))
    }

    pub async fn edit(&self, key: &str, value: f64) -> Result<FieldView> {
        Ok(self.desk.edit_field(currency(key)?, value).await?)
    }

    pub async fn cancel(&self, key: &str) -> Result<FieldView> {
        Ok(self.desk.cancel_field(currency(key)?).await?)
    }

    /// Everything published since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<DeskNotification> {
        let mut out = Vec::new();
        while let Ok(note) = self.notifications.try_recv() {
            out.push(note);
        }
        out
    }
}

pub fn currency(key: &str) -> Result<CurrencyKey> {
    CurrencyKey::parse(key).with_context(|| format!("bad currency key '{key}'"))
}

/// Let spawned timer, oracle and event-loop tasks run to quiescence.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward by `ms` and settle.
pub async fn advance_ms(ms: u64) {
    settle().await;
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}
