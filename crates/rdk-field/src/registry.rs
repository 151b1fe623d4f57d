//! Fixed set of field machines plus the accepted-value read model.
//!
//! Dependents never see a machine directly. They read accepted values through
//! [`AcceptedRates`] (synchronous, inside the event loop) or subscribe to an
//! [`AcceptedValueStream`] (a `watch` receiver that only wakes when the
//! accepted value actually changes).

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::debug;

use crate::machine::{FieldEvent, FieldSnapshot, FieldValidationMachine, Transition};
use crate::types::{CurrencyKey, FieldError};

/// Receiver side of a field's accepted-value channel.
pub type AcceptedValueStream = watch::Receiver<f64>;

/// Read-only view over the last validated rate per key.
pub trait AcceptedRates {
    fn accepted_rate(&self, key: &CurrencyKey) -> Option<f64>;

    fn contains(&self, key: &CurrencyKey) -> bool {
        self.accepted_rate(key).is_some()
    }
}

struct FieldSlot {
    machine: FieldValidationMachine,
    accepted_tx: watch::Sender<f64>,
}

pub struct FieldRegistry {
    /// Keys in construction order; drives snapshot ordering.
    keys: Vec<CurrencyKey>,
    slots: HashMap<CurrencyKey, FieldSlot>,
}

impl FieldRegistry {
    /// Build a registry from `(key, seed)` pairs. The key set is fixed for
    /// the registry's lifetime.
    pub fn new<I>(seeds: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = (CurrencyKey, f64)>,
    {
        let mut keys = Vec::new();
        let mut slots = HashMap::new();

        for (key, seed) in seeds {
            if slots.contains_key(&key) {
                return Err(FieldError::DuplicateField { key });
            }
            let machine = FieldValidationMachine::new(key.clone(), seed)?;
            let (accepted_tx, _rx) = watch::channel(seed);
            keys.push(key.clone());
            slots.insert(
                key,
                FieldSlot {
                    machine,
                    accepted_tx,
                },
            );
        }

        if keys.is_empty() {
            return Err(FieldError::NoFields);
        }

        Ok(Self { keys, slots })
    }

    pub fn keys(&self) -> &[CurrencyKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &CurrencyKey) -> Option<FieldSnapshot> {
        self.slots.get(key).map(|s| s.machine.snapshot())
    }

    /// Like [`get`](Self::get), but an unknown key is an error.
    pub fn require(&self, key: &CurrencyKey) -> Result<FieldSnapshot, FieldError> {
        self.get(key)
            .ok_or_else(|| FieldError::UnknownField { key: key.clone() })
    }

    pub fn accepted_value(&self, key: &CurrencyKey) -> Option<f64> {
        self.slots.get(key).map(|s| s.machine.accepted_value())
    }

    /// Subscribe to accepted-value changes for `key`.
    ///
    /// The receiver starts out holding the current accepted value and is only
    /// notified when a validation promotes a different value. DIRTY and
    /// IN_PROGRESS candidates never reach it.
    pub fn accepted_value_stream(
        &self,
        key: &CurrencyKey,
    ) -> Result<AcceptedValueStream, FieldError> {
        self.slots
            .get(key)
            .map(|s| s.accepted_tx.subscribe())
            .ok_or_else(|| FieldError::UnknownField { key: key.clone() })
    }

    /// Route `event` to the machine owning `key`.
    pub fn apply(&mut self, key: &CurrencyKey, event: &FieldEvent) -> Result<Transition, FieldError> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| FieldError::UnknownField { key: key.clone() })?;

        let transition = slot.machine.apply(event)?;

        if let Some(value) = transition.accepted_changed {
            slot.accepted_tx.send_if_modified(|current| {
                if *current == value {
                    false
                } else {
                    *current = value;
                    true
                }
            });
            debug!(field = %key, value, "accepted value published");
        }

        Ok(transition)
    }

    /// Snapshots of every field in construction order.
    pub fn snapshots(&self) -> Vec<FieldSnapshot> {
        self.keys
            .iter()
            .filter_map(|k| self.slots.get(k))
            .map(|s| s.machine.snapshot())
            .collect()
    }
}

impl AcceptedRates for FieldRegistry {
    fn accepted_rate(&self, key: &CurrencyKey) -> Option<f64> {
        self.accepted_value(key)
    }
}
