//! Key-scoped rounding of float money amounts.
//!
//! Every amount is rounded through a [`RoundingKey`] (an owning scope such as
//! a merchant id, plus a field name). The precision for a key is resolved
//! from an immutable [`RoundingPolicy`] the first time the key is seen and
//! then cached, so the same (scope, field) pair rounds identically for the
//! life of the rounder.

use crate::core::currency::{decimal_from_f64, decimal_to_f64, DEFAULT_PRECISION};
use log::{error, trace};
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Identifies a named rounding slot, e.g. `(merchant_id, "gross_total_amount")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundingKey {
    pub scope_id: String,
    pub field_key: String,
}

impl RoundingKey {
    pub fn new(scope_id: impl Into<String>, field_key: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            field_key: field_key.into(),
        }
    }
}

impl fmt::Display for RoundingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope_id, self.field_key)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RoundingError {
    #[error("invalid amount {value} for rounding key {key}")]
    InvalidAmount { key: RoundingKey, value: f64 },
}

/// Precision and mode applied to every amount rounded under one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingSlot {
    pub precision: u32,
    pub strategy: RoundingStrategy,
}

impl RoundingSlot {
    pub fn with_precision(precision: u32) -> Self {
        Self {
            precision,
            strategy: RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

/// Fixed mapping from rounding keys to precision, built once at startup.
///
/// Keys without an override get `default_precision`. Resolution is a pure
/// function of the policy, which is never mutated after construction.
#[derive(Debug, Clone)]
pub struct RoundingPolicy {
    default_precision: u32,
    overrides: HashMap<RoundingKey, u32>,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl RoundingPolicy {
    pub fn new(default_precision: u32) -> Self {
        Self {
            default_precision,
            overrides: HashMap::new(),
        }
    }

    /// Pin a specific key to a precision (e.g. a merchant settling in JPY).
    pub fn with_override(mut self, key: RoundingKey, precision: u32) -> Self {
        self.overrides.insert(key, precision);
        self
    }

    pub fn resolve(&self, key: &RoundingKey) -> RoundingSlot {
        let precision = self
            .overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_precision);
        RoundingSlot::with_precision(precision)
    }
}

/// Thread-safe, key-scoped rounder.
///
/// # Examples
///
/// ```
/// use royalty_settlement::core::rounding::{MoneyRounder, RoundingKey};
///
/// let rounder = MoneyRounder::default();
/// let key = RoundingKey::new("merchant-1", "total_fees");
/// assert_eq!(rounder.round(&key, 10.005).unwrap(), 10.01);
/// assert!(rounder.round(&key, f64::NAN).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MoneyRounder {
    policy: Arc<RoundingPolicy>,
    slots: RwLock<HashMap<RoundingKey, RoundingSlot>>,
}

impl MoneyRounder {
    pub fn new(policy: Arc<RoundingPolicy>) -> Self {
        Self {
            policy,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Round `value` with the slot configured for `key`.
    pub fn round(&self, key: &RoundingKey, value: f64) -> Result<f64, RoundingError> {
        let Some(amount) = decimal_from_f64(value) else {
            error!("refusing to round invalid amount {} for key {}", value, key);
            return Err(RoundingError::InvalidAmount {
                key: key.clone(),
                value,
            });
        };

        let slot = self.slot(key);
        let rounded = amount.round_dp_with_strategy(slot.precision, slot.strategy);
        trace!("rounded {} -> {} for key {}", value, rounded, key);
        Ok(decimal_to_f64(rounded))
    }

    /// The cached slot for `key`, if it has been used already.
    pub fn cached_slot(&self, key: &RoundingKey) -> Option<RoundingSlot> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(key).copied()
    }

    /// Number of keys with a cached slot.
    pub fn cached_len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn slot(&self, key: &RoundingKey) -> RoundingSlot {
        if let Some(slot) = self.cached_slot(key) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        *slots
            .entry(key.clone())
            .or_insert_with(|| self.policy.resolve(key))
    }
}
