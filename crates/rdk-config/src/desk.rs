//! Typed desk configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rdk_field::CurrencyKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base layer under every desk config: the stock rates and starter orders.
pub const BUILTIN_DESK_YAML: &str = r#"
desk:
  debounce_ms: 500
  notification_capacity: 1024
rates:
  - { key: eur, seed: 1.12 }
  - { key: usd, seed: 1.33 }
  - { key: rup, seed: 97.45 }
  - { key: aus, seed: 1.75 }
  - { key: can, seed: 1.75 }
orders:
  - { title: "The LEGO Movie 2: The Second Part", price: 8, currency: usd }
  - { title: "Kangaroo, 2yo 🦘", price: 750, currency: aus }
  - { title: "Old Amsterdam 🧀", price: 12.99, currency: eur }
  - { title: "Old Football boots Virgil van Dijk", price: 1200, currency: eur }
new_orders:
  default_currency: usd
oracle:
  kind: random
  approve_probability: 0.5
  max_latency_ms: 2000
  latency_ms: 0
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeskConfig {
    pub desk: DeskSection,
    pub rates: Vec<RateEntry>,
    #[serde(default)]
    pub orders: Vec<OrderEntry>,
    pub new_orders: NewOrdersSection,
    pub oracle: OracleSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeskSection {
    /// Quiet period after the last edit before a field is validated.
    pub debounce_ms: u64,
    /// Capacity of the notification broadcast channel.
    pub notification_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateEntry {
    pub key: CurrencyKey,
    pub seed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderEntry {
    pub title: String,
    pub price: f64,
    pub currency: CurrencyKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrdersSection {
    pub default_currency: CurrencyKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    Approve,
    Reject,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleSection {
    pub kind: OracleKind,
    /// `random` only.
    pub approve_probability: f64,
    /// `random` only: upper bound of the uniform delay.
    pub max_latency_ms: u64,
    /// `approve` / `reject` only: fixed delay.
    #[serde(default)]
    pub latency_ms: u64,
}

impl DeskConfig {
    /// Decode a merged config document and validate it.
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: DeskConfig = serde_json::from_value(v.clone())
            .context("CONFIG_INVALID: desk config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.desk.debounce_ms == 0 {
            bail!("CONFIG_INVALID: desk.debounce_ms must be > 0");
        }
        if self.desk.notification_capacity == 0 {
            bail!("CONFIG_INVALID: desk.notification_capacity must be > 0");
        }

        if self.rates.is_empty() {
            bail!("CONFIG_INVALID: rates must name at least one currency");
        }
        let mut keys = BTreeSet::new();
        for rate in &self.rates {
            if !keys.insert(&rate.key) {
                bail!("CONFIG_INVALID: duplicate rate key '{}'", rate.key);
            }
            if !(rate.seed.is_finite() && rate.seed > 0.0) {
                bail!(
                    "CONFIG_INVALID: rate '{}' seed must be finite and > 0, got {}",
                    rate.key,
                    rate.seed
                );
            }
        }

        for (i, order) in self.orders.iter().enumerate() {
            if !keys.contains(&order.currency) {
                bail!(
                    "CONFIG_INVALID: orders[{i}] references unknown currency '{}'",
                    order.currency
                );
            }
            if !(order.price.is_finite() && order.price >= 0.0) {
                bail!(
                    "CONFIG_INVALID: orders[{i}] price must be finite and >= 0, got {}",
                    order.price
                );
            }
        }

        if !keys.contains(&self.new_orders.default_currency) {
            bail!(
                "CONFIG_INVALID: new_orders.default_currency '{}' is not a configured rate",
                self.new_orders.default_currency
            );
        }

        let p = self.oracle.approve_probability;
        if !(0.0..=1.0).contains(&p) {
            bail!("CONFIG_INVALID: oracle.approve_probability must be within [0, 1], got {p}");
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.desk.debounce_ms)
    }

    /// `(key, seed)` pairs in configured order.
    pub fn seeds(&self) -> Vec<(CurrencyKey, f64)> {
        self.rates.iter().map(|r| (r.key.clone(), r.seed)).collect()
    }
}

impl OracleSection {
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
