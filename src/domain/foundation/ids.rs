//! Strongly-typed identifier value objects.
//!
//! Stop, driver and queue identifiers are assigned by the server and arrive
//! as JSON numbers. The client never mints them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Identifier of a physical stop (zone) with its own waiting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(i64);

impl StopId {
    /// Creates a StopId, rejecting non-positive values.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::out_of_range("stop_id", 1, i64::MAX, id));
        }
        Ok(Self(id))
    }

    /// Returns the raw numeric id.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StopId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| ValidationError::invalid_format("stop_id", "expected an integer"))?;
        Self::new(raw)
    }
}

/// Identifier of a driver, as carried in queue entries and session claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(i64);

impl DriverId {
    /// Wraps a server-assigned driver id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DriverId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| ValidationError::invalid_format("driver_id", "expected an integer"))
    }
}

/// Identifier of a single queue membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(i64);

impl QueueId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_id_rejects_zero_and_negative() {
        assert!(StopId::new(0).is_err());
        assert!(StopId::new(-3).is_err());
        assert_eq!(StopId::new(5).unwrap().value(), 5);
    }

    #[test]
    fn stop_id_error_reports_the_full_value() {
        let err = StopId::new(i64::MIN).unwrap_err();
        assert_eq!(
            err,
            ValidationError::out_of_range("stop_id", 1, i64::MAX, i64::MIN)
        );
        assert!(err.to_string().ends_with(&format!("got {}", i64::MIN)));

        let err = StopId::new(-4_294_967_296).unwrap_err();
        assert!(err.to_string().ends_with("got -4294967296"));
    }

    #[test]
    fn stop_id_parses_from_str() {
        let id: StopId = " 7 ".parse().unwrap();
        assert_eq!(id.value(), 7);
        assert!("seven".parse::<StopId>().is_err());
    }

    #[test]
    fn stop_id_serializes_as_bare_number() {
        let id = StopId::new(12).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "12");
        let back: StopId = serde_json::from_str("12").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn driver_id_display_and_parse() {
        let id = DriverId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<DriverId>().unwrap(), id);
    }
}
