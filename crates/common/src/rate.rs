//! Rate value types
//!
//! A `Rate` is a named quote plus its lifecycle flags. All three types are
//! plain values: an update always produces a new `Rate`, so history entries
//! never share state.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single quote: bid, ask and the source timestamp in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateFields {
    pub bid: f64,
    pub ask: f64,
    pub timestamp: i64,
}

impl RateFields {
    pub fn new(bid: f64, ask: f64, timestamp: i64) -> Self {
        Self { bid, ask, timestamp }
    }

    /// Quote stamped with the current wall-clock time
    pub fn now(bid: f64, ask: f64) -> Self {
        Self::new(bid, ask, Utc::now().timestamp_millis())
    }

    /// True when both prices are finite numbers
    pub fn is_finite(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite()
    }

    /// Timestamp as a UTC date-time, if representable
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// Lifecycle flags of a cached rate
///
/// * `active` - still valid; `false` once consumed or reported stale
/// * `updated` - written by an update tick rather than being a first value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateStatus {
    pub active: bool,
    pub updated: bool,
}

impl RateStatus {
    /// Status of the first value seen for a key
    pub const FIRST: Self = Self {
        active: true,
        updated: false,
    };

    /// Status of an accepted update or a calculated result
    pub const FRESH: Self = Self {
        active: true,
        updated: true,
    };

    /// Status reported by a provider for a stale instrument
    pub const INACTIVE: Self = Self {
        active: false,
        updated: false,
    };

    pub fn new(active: bool, updated: bool) -> Self {
        Self { active, updated }
    }

    /// Usable as a calculation input
    pub fn is_fresh(&self) -> bool {
        self.active && self.updated
    }
}

impl Default for RateStatus {
    fn default() -> Self {
        Self::FIRST
    }
}

/// A named quote with its status
///
/// Raw rates are named `<PLATFORMPREFIX>_<INSTRUMENT>` (e.g. `PF1_USDTRY`),
/// calculated rates carry the bare instrument (e.g. `EURTRY`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub name: String,
    pub fields: RateFields,
    pub status: RateStatus,
}

impl Rate {
    pub fn new(name: impl Into<String>, fields: RateFields, status: RateStatus) -> Self {
        Self {
            name: name.into(),
            fields,
            status,
        }
    }

    /// First value for a key: active, not yet updated
    pub fn first(name: impl Into<String>, fields: RateFields) -> Self {
        Self::new(name, fields, RateStatus::FIRST)
    }

    /// Freshly updated value
    pub fn updated(name: impl Into<String>, fields: RateFields) -> Self {
        Self::new(name, fields, RateStatus::FRESH)
    }

    /// Result of a calculation, stamped now
    pub fn calculated(name: impl Into<String>, bid: f64, ask: f64) -> Self {
        Self::new(name, RateFields::now(bid, ask), RateStatus::FRESH)
    }

    /// Copy of this rate carrying new fields, marked active and updated
    pub fn with_fields(&self, fields: RateFields) -> Self {
        Self::new(self.name.clone(), fields, RateStatus::FRESH)
    }

    /// Identity used for membership checks: same name and same source timestamp
    pub fn same_tick(&self, other: &Rate) -> bool {
        self.name == other.name && self.fields.timestamp == other.fields.timestamp
    }

    pub fn is_active(&self) -> bool {
        self.status.active
    }

    pub fn deactivate(&mut self) {
        self.status.active = false;
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bid={} ask={} ts={} active={} updated={}",
            self.name,
            self.fields.bid,
            self.fields.ask,
            self.fields.timestamp,
            self.status.active,
            self.status.updated
        )
    }
}
