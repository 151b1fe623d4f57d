//! rdk-field
//!
//! Debounced, asynchronously validated rate fields.
//! - `machine`: pure per-field state machine (ACCEPTED / DIRTY / IN_PROGRESS)
//! - `registry`: fixed key set plus the accepted-value read model
//! - `oracle`: the async yes/no authority and two in-process implementations
//!
//! No timers or tasks live here; `rdk-runtime` drives them.

mod types;

pub mod machine;
pub mod oracle;
pub mod registry;

pub use machine::{
    FieldEffect, FieldEvent, FieldSnapshot, FieldValidationMachine, Outcome, Transition,
};
pub use oracle::{FixedOracle, RandomOracle, ValidationOracle};
pub use registry::{AcceptedRates, AcceptedValueStream, FieldRegistry};
pub use types::{CurrencyKey, FieldError, FieldStatus, Generation};

/// Quiet period between the last edit and the validation request.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
