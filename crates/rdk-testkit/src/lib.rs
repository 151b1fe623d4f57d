//! rdk-testkit
//!
//! Test support for desk scenarios:
//! - [`ScriptedOracle`]: records validation calls and answers them on demand
//! - [`DeskHarness`]: a running desk wired to a scripted oracle
//! - [`settle`] / [`advance_ms`]: drive tokio's paused clock
//!
//! Scenarios under `tests/` run with `#[tokio::test(start_paused = true)]`.

mod harness;
mod oracle;

pub use harness::{advance_ms, currency, settle, DeskHarness};
pub use oracle::{OracleCall, ScriptedOracle};
