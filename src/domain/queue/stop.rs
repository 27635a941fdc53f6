//! Stop (zone) read model.
//!
//! Stops are created and edited by the administration API. Here they are
//! read-only labels for the queue a driver is looking at or standing in.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StopId;

/// Operational status of a stop as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    #[serde(other)]
    Unknown,
}

impl StopStatus {
    /// Returns true if drivers may join this stop's queue.
    pub fn accepts_vehicles(&self) -> bool {
        matches!(self, StopStatus::Active)
    }
}

/// A physical waiting zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: StopStatus,
}

impl Stop {
    /// An active stop with no address.
    pub fn new(id: StopId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: String::new(),
            status: StopStatus::Active,
        }
    }

    pub fn with_status(mut self, status: StopStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let stop: Stop = serde_json::from_str(r#"{"id":5,"name":"Toquepala"}"#).unwrap();
        assert_eq!(stop.id.value(), 5);
        assert_eq!(stop.address, "");
        assert_eq!(stop.status, StopStatus::Active);
    }

    #[test]
    fn unknown_status_does_not_fail_decoding() {
        let stop: Stop =
            serde_json::from_str(r#"{"id":5,"name":"X","address":"","status":"archived"}"#)
                .unwrap();
        assert_eq!(stop.status, StopStatus::Unknown);
        assert!(!stop.status.accepts_vehicles());
    }
}
