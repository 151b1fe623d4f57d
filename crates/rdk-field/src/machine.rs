//! Field validation state machine.
//!
//! # Design
//!
//! One [`FieldValidationMachine`] per rate key. Every input is applied via
//! [`FieldValidationMachine::apply`], which returns a [`Transition`]
//! describing what changed and which side effects the runtime must perform.
//! The machine itself is pure: no timers, no IO, no clock. The runtime owns
//! the debounce timer and the oracle call and feeds their completions back
//! in as stamped events.
//!
//! # State diagram
//!
//! ```text
//!            Edit(v != accepted)            DebounceTimeout(gen)
//!  ACCEPTED ─────────────────────► DIRTY ──────────────────────► IN_PROGRESS
//!     ▲  ▲                         │  ▲ Edit(v != accepted)          │   │
//!     │  │   Edit(v == accepted)   │  └── (restarts debounce) ◄──────┘   │
//!     │  └─────────────────────────┘                                     │
//!     │                                                                  │
//!     └──── Cancel | ValidationResult(gen == generation, ok) ────────────┘
//! ```
//!
//! # Staleness
//!
//! Every edit and every cancel bumps the generation. Timers and oracle
//! requests carry the generation they were issued under; a completion whose
//! stamp no longer matches is reported as [`Outcome::Stale`] and changes
//! nothing. The oracle call is never aborted.

use serde::Serialize;

use crate::types::{check_rate, CurrencyKey, FieldError, FieldStatus, Generation};

// ---------------------------------------------------------------------------
// Events and effects
// ---------------------------------------------------------------------------

/// Inputs accepted by a field machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldEvent {
    /// User typed a new value.
    Edit { value: f64 },
    /// The debounce timer armed under `generation` fired.
    DebounceTimeout { generation: Generation },
    /// User asked to abandon the in-flight validation.
    Cancel,
    /// The oracle answered the request stamped with `generation`.
    ValidationResult { generation: Generation, ok: bool },
}

/// Work the runtime must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldEffect {
    /// (Re)start the debounce timer. Any timer already running for this
    /// field must be dropped first.
    ArmDebounce { generation: Generation },
    /// Drop the debounce timer for this field, if any.
    DisarmDebounce,
    /// Call the oracle with `candidate` and report back under `generation`.
    Validate {
        generation: Generation,
        candidate: f64,
    },
}

/// How an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was legal and the machine moved (possibly to the same state).
    Applied,
    /// A stamped completion arrived for a superseded generation; discarded.
    Stale,
    /// The event is meaningless in the current state (e.g. cancel while
    /// DIRTY); discarded.
    Ignored,
}

/// Result of applying a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: FieldStatus,
    pub to: FieldStatus,
    pub outcome: Outcome,
    pub effects: Vec<FieldEffect>,
    /// New accepted value, present only when this event changed it.
    pub accepted_changed: Option<f64>,
}

impl Transition {
    fn unchanged(status: FieldStatus, outcome: Outcome) -> Self {
        Self {
            from: status,
            to: status,
            outcome,
            effects: Vec::new(),
            accepted_changed: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only copy of a field's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSnapshot {
    pub key: CurrencyKey,
    pub status: FieldStatus,
    pub accepted_value: f64,
    pub candidate_value: f64,
    /// Candidate while DIRTY/IN_PROGRESS, accepted while ACCEPTED.
    pub display_value: f64,
    pub generation: Generation,
    /// Generation of the outstanding oracle request, if any.
    pub in_flight: Option<Generation>,
}

// ---------------------------------------------------------------------------
// FieldValidationMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FieldValidationMachine {
    key: CurrencyKey,
    accepted: f64,
    candidate: f64,
    status: FieldStatus,
    generation: Generation,
    /// Generation the live debounce timer was armed under.
    pending_debounce: Option<Generation>,
    /// Generation of the one oracle request whose answer would be honoured.
    in_flight: Option<Generation>,
}

impl FieldValidationMachine {
    /// Create a machine in ACCEPTED with `seed` as the accepted value.
    pub fn new(key: CurrencyKey, seed: f64) -> Result<Self, FieldError> {
        check_rate(&key, seed)?;
        Ok(Self {
            key,
            accepted: seed,
            candidate: seed,
            status: FieldStatus::Accepted,
            generation: Generation::default(),
            pending_debounce: None,
            in_flight: None,
        })
    }

    pub fn key(&self) -> &CurrencyKey {
        &self.key
    }

    pub fn status(&self) -> FieldStatus {
        self.status
    }

    pub fn accepted_value(&self) -> f64 {
        self.accepted
    }

    pub fn candidate_value(&self) -> f64 {
        self.candidate
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn display_value(&self) -> f64 {
        match self.status {
            FieldStatus::Accepted => self.accepted,
            FieldStatus::Dirty | FieldStatus::InProgress => self.candidate,
        }
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            key: self.key.clone(),
            status: self.status,
            accepted_value: self.accepted,
            candidate_value: self.candidate,
            display_value: self.display_value(),
            generation: self.generation,
            in_flight: self.in_flight,
        }
    }

    /// `candidate == accepted` whenever the field is ACCEPTED, and only
    /// IN_PROGRESS may carry an in-flight request.
    pub fn is_consistent(&self) -> bool {
        let accepted_ok = self.status != FieldStatus::Accepted || self.candidate == self.accepted;
        let in_flight_ok = self.in_flight.is_none() || self.status == FieldStatus::InProgress;
        let debounce_ok = self.pending_debounce.is_none() || self.status == FieldStatus::Dirty;
        accepted_ok && in_flight_ok && debounce_ok
    }

    /// Apply one event.
    ///
    /// # Errors
    /// Only [`FieldEvent::Edit`] can fail, and only for a non-finite or
    /// non-positive value. The machine is left untouched in that case.
    pub fn apply(&mut self, event: &FieldEvent) -> Result<Transition, FieldError> {
        let from = self.status;
        let transition = match *event {
            FieldEvent::Edit { value } => self.on_edit(value)?,
            FieldEvent::DebounceTimeout { generation } => self.on_debounce(generation),
            FieldEvent::Cancel => self.on_cancel(),
            FieldEvent::ValidationResult { generation, ok } => self.on_result(generation, ok),
        };
        debug_assert!(self.is_consistent(), "field {} inconsistent", self.key);
        debug_assert_eq!(transition.from, from);
        Ok(transition)
    }

    fn on_edit(&mut self, value: f64) -> Result<Transition, FieldError> {
        check_rate(&self.key, value)?;

        let from = self.status;
        self.generation = self.generation.next();
        // Whatever request was outstanding can no longer be honoured.
        self.in_flight = None;

        let mut effects = Vec::with_capacity(1);
        if value == self.accepted {
            self.status = FieldStatus::Accepted;
            self.candidate = self.accepted;
            if self.pending_debounce.take().is_some() {
                effects.push(FieldEffect::DisarmDebounce);
            }
        } else {
            self.status = FieldStatus::Dirty;
            self.candidate = value;
            self.pending_debounce = Some(self.generation);
            effects.push(FieldEffect::ArmDebounce {
                generation: self.generation,
            });
        }

        Ok(Transition {
            from,
            to: self.status,
            outcome: Outcome::Applied,
            effects,
            accepted_changed: None,
        })
    }

    fn on_debounce(&mut self, generation: Generation) -> Transition {
        if generation != self.generation {
            return Transition::unchanged(self.status, Outcome::Stale);
        }
        if self.status != FieldStatus::Dirty || self.pending_debounce != Some(generation) {
            return Transition::unchanged(self.status, Outcome::Ignored);
        }

        self.pending_debounce = None;
        self.in_flight = Some(generation);
        self.status = FieldStatus::InProgress;

        Transition {
            from: FieldStatus::Dirty,
            to: FieldStatus::InProgress,
            outcome: Outcome::Applied,
            effects: vec![FieldEffect::Validate {
                generation,
                candidate: self.candidate,
            }],
            accepted_changed: None,
        }
    }

    fn on_cancel(&mut self) -> Transition {
        if self.status != FieldStatus::InProgress {
            return Transition::unchanged(self.status, Outcome::Ignored);
        }

        self.in_flight = None;
        self.candidate = self.accepted;
        self.generation = self.generation.next();
        self.status = FieldStatus::Accepted;

        Transition {
            from: FieldStatus::InProgress,
            to: FieldStatus::Accepted,
            outcome: Outcome::Applied,
            effects: Vec::new(),
            accepted_changed: None,
        }
    }

    fn on_result(&mut self, generation: Generation, ok: bool) -> Transition {
        let current = self.status == FieldStatus::InProgress
            && self.in_flight == Some(generation)
            && self.generation == generation;
        if !current {
            return Transition::unchanged(self.status, Outcome::Stale);
        }

        self.in_flight = None;
        self.status = FieldStatus::Accepted;

        let mut accepted_changed = None;
        if ok {
            if self.candidate != self.accepted {
                accepted_changed = Some(self.candidate);
            }
            self.accepted = self.candidate;
        } else {
            self.candidate = self.accepted;
        }

        Transition {
            from: FieldStatus::InProgress,
            to: FieldStatus::Accepted,
            outcome: Outcome::Applied,
            effects: Vec::new(),
            accepted_changed,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
