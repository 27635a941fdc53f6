//! Stop roster snapshot.
//!
//! A roster is always a full replacement of a stop's queue, never a diff.
//! Consumers keep the last applied snapshot per stop and throw the old one
//! away wholesale.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DriverId, StopId, ValidationError};

use super::QueueEntry;

/// Full roster for one stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopQueue {
    pub stop_id: StopId,
    pub vehicles: Vec<QueueEntry>,
    pub total_vehicles: u32,
}

impl StopQueue {
    /// Builds an empty roster for a stop.
    pub fn empty(stop_id: StopId) -> Self {
        Self {
            stop_id,
            vehicles: Vec::new(),
            total_vehicles: 0,
        }
    }

    /// Checks the snapshot invariants.
    ///
    /// - `total_vehicles` equals the number of entries
    /// - entries are ordered by position and positions are exactly `1..=N`
    /// - no driver appears twice
    pub fn validate(&self) -> Result<(), ValidationError> {
        let stop = self.stop_id.value();
        if self.total_vehicles as usize != self.vehicles.len() {
            return Err(ValidationError::inconsistent_roster(
                stop,
                format!(
                    "totalVehicles is {} but {} entries were sent",
                    self.total_vehicles,
                    self.vehicles.len()
                ),
            ));
        }

        for (index, entry) in self.vehicles.iter().enumerate() {
            let expected = index as u32 + 1;
            if entry.position != expected {
                return Err(ValidationError::inconsistent_roster(
                    stop,
                    format!("expected position {} but found {}", expected, entry.position),
                ));
            }
        }

        let mut drivers: Vec<DriverId> = self.vehicles.iter().map(|e| e.driver.id).collect();
        drivers.sort_by_key(|d| d.value());
        if drivers.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ValidationError::inconsistent_roster(
                stop,
                "a driver appears more than once",
            ));
        }

        Ok(())
    }

    /// Finds the entry that belongs to `driver_id`, if any.
    pub fn entry_for(&self, driver_id: DriverId) -> Option<&QueueEntry> {
        self.vehicles.iter().find(|e| e.belongs_to(driver_id))
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::queue::fixtures::entry;
    use proptest::prelude::*;

    fn stop(id: i64) -> StopId {
        StopId::new(id).unwrap()
    }

    fn roster(stop_id: i64, drivers: &[i64]) -> StopQueue {
        let vehicles: Vec<QueueEntry> = drivers
            .iter()
            .enumerate()
            .map(|(i, d)| entry(*d, i as u32 + 1))
            .collect();
        StopQueue {
            stop_id: stop(stop_id),
            total_vehicles: vehicles.len() as u32,
            vehicles,
        }
    }

    #[test]
    fn valid_roster_passes() {
        assert!(roster(5, &[3, 1, 2]).validate().is_ok());
        assert!(StopQueue::empty(stop(5)).validate().is_ok());
    }

    #[test]
    fn total_mismatch_is_rejected() {
        let mut queue = roster(5, &[1, 2]);
        queue.total_vehicles = 3;
        assert!(queue.validate().is_err());
    }

    #[test]
    fn position_gap_is_rejected() {
        let mut queue = roster(5, &[1, 2, 3]);
        queue.vehicles[2].position = 4;
        let err = queue.validate().unwrap_err();
        assert!(err.to_string().contains("expected position 3"));
    }

    #[test]
    fn duplicate_driver_is_rejected() {
        let queue = roster(5, &[1, 2, 1]);
        assert!(queue.validate().is_err());
    }

    #[test]
    fn entry_for_finds_by_driver_not_index() {
        let queue = roster(5, &[9, 4, 7]);
        let mine = queue.entry_for(DriverId::new(4)).unwrap();
        assert_eq!(mine.position, 2);
        assert!(queue.entry_for(DriverId::new(100)).is_none());
    }

    #[test]
    fn decodes_wire_snapshot() {
        let json = r#"{"stopId":7,"vehicles":[],"totalVehicles":0}"#;
        let queue: StopQueue = serde_json::from_str(json).unwrap();
        assert_eq!(queue.stop_id, stop(7));
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn dense_rosters_always_validate(n in 0usize..40) {
            let drivers: Vec<i64> = (1..=n as i64).collect();
            prop_assert!(roster(3, &drivers).validate().is_ok());
        }

        #[test]
        fn any_shifted_position_fails(n in 1usize..40, idx in 0usize..40, bump in 1u32..5) {
            let drivers: Vec<i64> = (1..=n as i64).collect();
            let mut queue = roster(3, &drivers);
            let i = idx % n;
            queue.vehicles[i].position += bump;
            prop_assert!(queue.validate().is_err());
        }
    }
}
