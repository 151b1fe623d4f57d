//! rdk-orders
//!
//! Orders and the values derived from them.
//! - `OrderSet`: insertion-ordered, grow-only storage
//! - `DerivationGraph`: `basePrice = price / acceptedRate(currency)` per
//!   order, with re-subscription on currency change and a running total
//!
//! Pure data structures; the runtime decides when to call them.

mod order;

pub mod derivation;
pub mod order_set;

pub use derivation::{ChainUpdate, DerivationError, DerivationGraph, SubscriptionHandle};
pub use order::{check_price, Order, OrderDraft, OrderError, OrderId};
pub use order_set::{MembershipChange, OrderSet};
