//! Execution context roles and the spawn binding parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Unit, UnitError};

/// Query parameter carrying the bound unit.
const UNIT_PARAM: &str = "unit";

/// Role of an execution context.
///
/// Fixed at construction: the boot context is primary, everything
/// spawned afterwards is secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns the device connection and unit 0.
    Primary,
    /// Proxies one unit's I/O over the bus.
    Secondary,
}

/// Binding error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Missing `unit` parameter")]
    MissingUnit,
    #[error("Invalid unit parameter: {0:?}")]
    InvalidUnit(String),
    #[error(transparent)]
    OutOfRange(#[from] UnitError),
    #[error("Unit {0} is reserved for the primary")]
    ReservedUnit(Unit),
}

/// Creation parameters handed to a freshly spawned context.
///
/// The only bootstrap value is the unit the new context binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingParams {
    pub unit: Unit,
}

impl BindingParams {
    #[must_use]
    pub const fn new(unit: Unit) -> Self {
        Self { unit }
    }

    /// Render as a query string, e.g. `unit=3`.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{UNIT_PARAM}={}", self.unit)
    }

    /// Parse from a query string such as `?unit=3&theme=dark`.
    ///
    /// Unrelated parameters are ignored.
    ///
    /// # Errors
    /// Returns error if the unit parameter is absent, malformed or out of range.
    pub fn from_query(query: &str) -> Result<Self, BindingError> {
        let raw = query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == UNIT_PARAM)
            .map(|(_, value)| value)
            .ok_or(BindingError::MissingUnit)?;

        let n: i64 = raw
            .parse()
            .map_err(|_| BindingError::InvalidUnit(raw.to_string()))?;
        Ok(Self::new(Unit::new(n)?))
    }

    /// Ensure the params bind a secondary unit.
    ///
    /// # Errors
    /// Returns error if the params name unit 0.
    pub const fn require_secondary(self) -> Result<Self, BindingError> {
        if self.unit.is_primary() {
            Err(BindingError::ReservedUnit(self.unit))
        } else {
            Ok(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[test]
    fn test_query_roundtrip() {
        let params = BindingParams::new(Unit::new(5).unwrap());
        assert_eq!(params.to_query(), "unit=5");
        assert_eq!(BindingParams::from_query(&params.to_query()), Ok(params));
    }

    #[test]
    fn test_query_ignores_other_params() {
        let params = assert_ok!(BindingParams::from_query("?era=v6&unit=2&debug"));
        assert_eq!(params.unit, Unit::new(2).unwrap());
    }

    #[test]
    fn test_query_errors() {
        assert_eq!(
            BindingParams::from_query("era=v6"),
            Err(BindingError::MissingUnit)
        );
        assert_eq!(
            BindingParams::from_query("unit=two"),
            Err(BindingError::InvalidUnit("two".into()))
        );
        assert_eq!(
            BindingParams::from_query("unit=9"),
            Err(BindingError::OutOfRange(UnitError::OutOfRange(9)))
        );
    }

    #[test]
    fn test_primary_unit_rejected_for_secondaries() {
        let params = assert_ok!(BindingParams::from_query("unit=0"));
        assert_eq!(
            params.require_secondary(),
            Err(BindingError::ReservedUnit(Unit::PRIMARY))
        );
    }
}
