//! Logical terminal slots.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of terminal slots, including the primary.
pub const MAX_UNITS: usize = 8;

/// Wire value addressing every unit at once (used by pings).
pub const BROADCAST_UNIT: i32 = -1;

/// Unit error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("Unit out of range: {0} (expected 0..8)")]
    OutOfRange(i64),
}

/// A logical terminal slot in `[0, MAX_UNITS)`.
///
/// Unit 0 is permanently owned by the primary context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Unit(u8);

impl Unit {
    /// The device-owning unit.
    pub const PRIMARY: Self = Self(0);

    /// Create a unit, validating the range.
    ///
    /// # Errors
    /// Returns error if `n` is not in `[0, MAX_UNITS)`.
    pub fn new(n: i64) -> Result<Self, UnitError> {
        u8::try_from(n)
            .ok()
            .filter(|v| usize::from(*v) < MAX_UNITS)
            .map(Self)
            .ok_or(UnitError::OutOfRange(n))
    }

    /// Raw slot number.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is the primary's unit.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }

    /// Display name, e.g. `TTY3`.
    #[must_use]
    pub fn label(self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }

    /// Every unit, ascending.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..MAX_UNITS).filter_map(|n| u8::try_from(n).ok()).map(Self)
    }

    /// Units available to secondaries (`1..MAX_UNITS`), ascending.
    pub fn secondaries() -> impl Iterator<Item = Self> {
        Self::all().filter(|u| !u.is_primary())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for Unit {
    type Error = UnitError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Unit> for i32 {
    fn from(unit: Unit) -> Self {
        Self::from(unit.0)
    }
}
