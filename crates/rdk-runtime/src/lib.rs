//! rdk-runtime
//!
//! Drives the desk:
//! - `engine`: synchronous composition of fields, orders and derivations
//! - `runtime`: the single event loop that owns the engine, runs debounce
//!   timers and oracle calls, and publishes notifications
//!
//! Render boundaries (daemon, CLI) talk to a [`DeskHandle`] only.

mod error;
mod notify;
mod views;

pub mod engine;
pub mod runtime;

use std::sync::Arc;

use rdk_config::{DeskConfig, OracleKind, OracleSection};
use rdk_field::{FixedOracle, RandomOracle, ValidationOracle};
use tokio::task::JoinHandle;

pub use engine::{CommandReply, DeskCommand, DeskEffect, DeskEngine, DeskStep};
pub use error::{DeskError, DeskErrorKind};
pub use notify::DeskNotification;
pub use runtime::{spawn_desk, DeskHandle, RuntimeSettings};
pub use views::{DeskSnapshot, FieldView, OrderView};

impl RuntimeSettings {
    pub fn from_config(cfg: &DeskConfig) -> Self {
        Self {
            debounce: cfg.debounce(),
            notification_capacity: cfg.desk.notification_capacity,
        }
    }
}

/// Build the oracle named by the `oracle` config section.
pub fn oracle_from_config(section: &OracleSection) -> Arc<dyn ValidationOracle> {
    match section.kind {
        OracleKind::Approve => Arc::new(FixedOracle::new(true, section.latency())),
        OracleKind::Reject => Arc::new(FixedOracle::new(false, section.latency())),
        OracleKind::Random => Arc::new(RandomOracle::new(
            section.approve_probability,
            section.max_latency(),
        )),
    }
}

/// Seed an engine from `cfg` and start it with `oracle`.
pub fn spawn_desk_from_config(
    cfg: &DeskConfig,
    oracle: Arc<dyn ValidationOracle>,
) -> Result<(DeskHandle, JoinHandle<()>), DeskError> {
    let engine = DeskEngine::from_config(cfg)?;
    Ok(spawn_desk(engine, oracle, RuntimeSettings::from_config(cfg)))
}
