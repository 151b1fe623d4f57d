use std::fmt;

use rdk_field::{CurrencyKey, FieldError};
use rdk_orders::{DerivationError, OrderError};

/// Errors returned to callers of the desk.
#[derive(Debug, Clone, PartialEq)]
pub enum DeskError {
    Field(FieldError),
    Order(OrderError),
    Derivation(DerivationError),
    /// An order would reference a currency with no field.
    UnknownCurrency { key: CurrencyKey },
    /// The event loop has stopped.
    Closed,
}

/// Coarse classification used by render boundaries to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskErrorKind {
    NotFound,
    Invalid,
    Unavailable,
}

impl DeskErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeskErrorKind::NotFound => "not_found",
            DeskErrorKind::Invalid => "invalid",
            DeskErrorKind::Unavailable => "unavailable",
        }
    }
}

impl DeskError {
    pub fn kind(&self) -> DeskErrorKind {
        match self {
            DeskError::Field(FieldError::UnknownField { .. })
            | DeskError::Order(OrderError::UnknownOrder { .. })
            | DeskError::Derivation(DerivationError::UnknownOrder { .. }) => {
                DeskErrorKind::NotFound
            }
            DeskError::Closed => DeskErrorKind::Unavailable,
            // A currency named in a request body is invalid input, not a
            // missing resource.
            DeskError::UnknownCurrency { .. }
            | DeskError::Field(_)
            | DeskError::Order(_)
            | DeskError::Derivation(_) => DeskErrorKind::Invalid,
        }
    }
}

impl fmt::Display for DeskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeskError::Field(e) => write!(f, "{e}"),
            DeskError::Order(e) => write!(f, "{e}"),
            DeskError::Derivation(e) => write!(f, "{e}"),
            DeskError::UnknownCurrency { key } => write!(f, "unknown currency '{key}'"),
            DeskError::Closed => write!(f, "desk runtime is not running"),
        }
    }
}

impl std::error::Error for DeskError {}

impl From<FieldError> for DeskError {
    fn from(e: FieldError) -> Self {
        DeskError::Field(e)
    }
}

impl From<OrderError> for DeskError {
    fn from(e: OrderError) -> Self {
        DeskError::Order(e)
    }
}

impl From<DerivationError> for DeskError {
    fn from(e: DerivationError) -> Self {
        DeskError::Derivation(e)
    }
}
