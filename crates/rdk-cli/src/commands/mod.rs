//! Command handler modules for rdk-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod session;

use anyhow::{Context, Result};
use rdk_config::{DeskConfig, OracleKind};
use rdk_runtime::DeskHandle;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// `--oracle` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OracleArg {
    Approve,
    Reject,
    Random,
}

impl From<OracleArg> for OracleKind {
    fn from(arg: OracleArg) -> Self {
        match arg {
            OracleArg::Approve => OracleKind::Approve,
            OracleArg::Reject => OracleKind::Reject,
            OracleArg::Random => OracleKind::Random,
        }
    }
}

/// Start a desk from `cfg`, optionally overriding the oracle kind.
///
/// The runtime task is detached; it ends when the returned handle is dropped.
pub fn start_desk(cfg: &DeskConfig, oracle: Option<OracleArg>) -> Result<DeskHandle> {
    let mut section = cfg.oracle;
    if let Some(arg) = oracle {
        section.kind = arg.into();
    }
    let oracle = rdk_runtime::oracle_from_config(&section);
    let (desk, _task) =
        rdk_runtime::spawn_desk_from_config(cfg, oracle).context("desk runtime failed to start")?;
    Ok(desk)
}
