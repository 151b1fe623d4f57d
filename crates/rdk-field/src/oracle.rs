//! Validation oracle boundary.
//!
//! The oracle is the remote authority that confirms or rejects a candidate
//! rate. Only the contract lives here plus two in-process implementations;
//! transport is somebody else's problem.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::types::CurrencyKey;

/// Asynchronous yes/no authority for candidate rates.
///
/// `false` is an ordinary verdict, not a failure. Latency is unbounded and
/// completion order across calls is unspecified; the runtime calls
/// `validate` at most once per (key, generation).
#[async_trait]
pub trait ValidationOracle: Send + Sync {
    /// Human-readable name used in logs (e.g. `"random"`).
    fn name(&self) -> &'static str;

    async fn validate(&self, key: &CurrencyKey, candidate: f64) -> bool;
}

// ---------------------------------------------------------------------------
// FixedOracle
// ---------------------------------------------------------------------------

/// Always answers `verdict` after `latency`.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle {
    verdict: bool,
    latency: Duration,
}

impl FixedOracle {
    pub fn new(verdict: bool, latency: Duration) -> Self {
        Self { verdict, latency }
    }

    pub fn approve_all() -> Self {
        Self::new(true, Duration::ZERO)
    }

    pub fn reject_all() -> Self {
        Self::new(false, Duration::ZERO)
    }
}

#[async_trait]
impl ValidationOracle for FixedOracle {
    fn name(&self) -> &'static str {
        if self.verdict {
            "approve"
        } else {
            "reject"
        }
    }

    async fn validate(&self, _key: &CurrencyKey, _candidate: f64) -> bool {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.verdict
    }
}

// ---------------------------------------------------------------------------
// RandomOracle
// ---------------------------------------------------------------------------

/// Coin-flip oracle with a random delay, used for demos.
///
/// Approves with `approve_probability` after a uniformly random delay in
/// `0..=max_latency`.
#[derive(Debug, Clone, Copy)]
pub struct RandomOracle {
    approve_probability: f64,
    max_latency: Duration,
}

impl RandomOracle {
    pub fn new(approve_probability: f64, max_latency: Duration) -> Self {
        Self {
            approve_probability: approve_probability.clamp(0.0, 1.0),
            max_latency,
        }
    }

    pub fn approve_probability(&self) -> f64 {
        self.approve_probability
    }

    fn draw_latency(&self) -> Duration {
        let max_ms = u64::try_from(self.max_latency.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(fastrand::u64(0..=max_ms))
    }
}

impl Default for RandomOracle {
    fn default() -> Self {
        Self::new(0.5, Duration::from_millis(2000))
    }
}

#[async_trait]
impl ValidationOracle for RandomOracle {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn validate(&self, key: &CurrencyKey, candidate: f64) -> bool {
        // Draw both up front so the verdict does not depend on scheduling.
        let verdict = fastrand::f64() < self.approve_probability;
        let latency = self.draw_latency();
        debug!(field = %key, candidate, verdict, latency_ms = latency.as_millis() as u64, "random oracle draw");
        tokio::time::sleep(latency).await;
        verdict
    }
}
