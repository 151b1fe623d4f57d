use std::fmt;
use std::str::FromStr;

use rdk_field::CurrencyKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Immutable order identifier (UUID v4 when generated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for OrderId {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| OrderError::InvalidId {
                input: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Order / OrderDraft
// ---------------------------------------------------------------------------

/// A line in the desk. `id` and `title` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub title: String,
    pub price: f64,
    pub currency: CurrencyKey,
}

/// Input to [`crate::OrderSet::add`]. A missing id is generated on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    #[serde(default)]
    pub id: Option<OrderId>,
    pub title: String,
    pub price: f64,
    pub currency: CurrencyKey,
}

impl OrderDraft {
    pub fn new(title: impl Into<String>, price: f64, currency: CurrencyKey) -> Self {
        Self {
            id: None,
            title: title.into(),
            price,
            currency,
        }
    }

    /// Filler order for the "add" action: `"Item N"` with a whole-number
    /// price, both drawn from `0..=1000`.
    pub fn random(currency: CurrencyKey) -> Self {
        let n = fastrand::u32(0..=1000);
        let price = f64::from(fastrand::u32(0..=1000));
        Self::new(format!("Item {n}"), price, currency)
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Prices must be finite and non-negative.
pub fn check_price(id: Option<OrderId>, price: f64) -> Result<(), OrderError> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(OrderError::InvalidPrice { id, price })
    }
}

// ---------------------------------------------------------------------------
// OrderError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum OrderError {
    /// No order with this id is in the set.
    UnknownOrder { id: OrderId },
    /// An order with this id was already added.
    DuplicateOrder { id: OrderId },
    /// Price was NaN, infinite or negative.
    InvalidPrice { id: Option<OrderId>, price: f64 },
    /// Input did not parse as a UUID.
    InvalidId { input: String },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::UnknownOrder { id } => write!(f, "unknown order '{id}'"),
            OrderError::DuplicateOrder { id } => write!(f, "duplicate order '{id}'"),
            OrderError::InvalidPrice { id: Some(id), price } => {
                write!(f, "order '{id}' price must be finite and >= 0, got {price}")
            }
            OrderError::InvalidPrice { id: None, price } => {
                write!(f, "order price must be finite and >= 0, got {price}")
            }
            OrderError::InvalidId { input } => write!(f, "'{input}' is not a valid order id"),
        }
    }
}

impl std::error::Error for OrderError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> CurrencyKey {
        CurrencyKey::parse("usd").unwrap()
    }

    #[test]
    fn random_draft_stays_in_range() {
        for _ in 0..200 {
            let draft = OrderDraft::random(usd());
            assert!(draft.id.is_none());
            assert!((0.0..=1000.0).contains(&draft.price));
            assert_eq!(draft.price.fract(), 0.0);
            let n: u32 = draft
                .title
                .strip_prefix("Item ")
                .expect("title prefix")
                .parse()
                .expect("numeric suffix");
            assert!(n <= 1000);
            assert_eq!(draft.currency, usd());
        }
    }

    #[test]
    fn order_id_parses_and_displays() {
        let id = OrderId::generate();
        let parsed: OrderId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!(matches!(
            "not-a-uuid".parse::<OrderId>(),
            Err(OrderError::InvalidId { .. })
        ));
    }

    #[test]
    fn price_check() {
        assert!(check_price(None, 0.0).is_ok());
        assert!(check_price(None, 12.99).is_ok());
        assert!(check_price(None, -0.01).is_err());
        assert!(check_price(None, f64::NAN).is_err());
        assert!(check_price(None, f64::INFINITY).is_err());
    }

    #[test]
    fn draft_deserializes_without_id() {
        let draft: OrderDraft =
            serde_json::from_str(r#"{"title":"Old Amsterdam","price":12.99,"currency":"EUR"}"#)
                .unwrap();
        assert_eq!(draft.id, None);
        assert_eq!(draft.currency.as_str(), "eur");
    }
}
