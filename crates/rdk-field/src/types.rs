use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CurrencyKey
// ---------------------------------------------------------------------------

/// Stable identifier of a rate field (e.g. `"eur"`).
///
/// Keys are normalised to lowercase and must be non-empty ASCII
/// alphanumerics, so `" EUR "` and `"eur"` name the same field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyKey(String);

impl CurrencyKey {
    pub fn parse(input: &str) -> Result<Self, FieldError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FieldError::EmptyKey);
        }
        if let Some(ch) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(FieldError::InvalidKey {
                key: trimmed.to_string(),
                ch,
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyKey {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for CurrencyKey {
    type Error = FieldError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CurrencyKey> for String {
    fn from(value: CurrencyKey) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// FieldStatus
// ---------------------------------------------------------------------------

/// Validation status of a single rate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldStatus {
    /// Candidate equals the last validated value. Input is editable.
    Accepted,
    /// User edited the value; waiting for the debounce window to close.
    Dirty,
    /// Candidate submitted to the oracle. Input is locked; cancel is offered.
    InProgress,
}

impl FieldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStatus::Accepted => "ACCEPTED",
            FieldStatus::Dirty => "DIRTY",
            FieldStatus::InProgress => "IN_PROGRESS",
        }
    }

    /// `true` while the render boundary must lock the input.
    pub fn is_locked(&self) -> bool {
        matches!(self, FieldStatus::InProgress)
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Per-field edit counter used to stamp timers and oracle requests.
///
/// A stamped completion is only honoured while the field still carries the
/// same generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FieldError
// ---------------------------------------------------------------------------

/// Errors surfaced by field machines and the registry.
///
/// A rejected oracle verdict and a stale oracle result are *not* errors;
/// both are ordinary transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Key string was empty after trimming.
    EmptyKey,
    /// Key contained a character outside `[A-Za-z0-9]`.
    InvalidKey { key: String, ch: char },
    /// Rate values must be finite and strictly positive.
    InvalidValue { key: CurrencyKey, value: f64 },
    /// The key is not part of the registry's fixed key set.
    UnknownField { key: CurrencyKey },
    /// The same key was supplied twice at registry construction.
    DuplicateField { key: CurrencyKey },
    /// A registry needs at least one field.
    NoFields,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::EmptyKey => write!(f, "field key cannot be empty"),
            FieldError::InvalidKey { key, ch } => {
                write!(f, "field key '{key}' contains invalid character '{ch}'")
            }
            FieldError::InvalidValue { key, value } => {
                write!(f, "field '{key}' value must be finite and > 0, got {value}")
            }
            FieldError::UnknownField { key } => write!(f, "unknown field '{key}'"),
            FieldError::DuplicateField { key } => write!(f, "duplicate field '{key}'"),
            FieldError::NoFields => write!(f, "registry requires at least one field"),
        }
    }
}

impl std::error::Error for FieldError {}

/// Rate values must be finite and strictly positive.
pub(crate) fn check_rate(key: &CurrencyKey, value: f64) -> Result<(), FieldError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidValue {
            key: key.clone(),
            value,
        })
    }
}
