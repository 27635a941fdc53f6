//! Queue entry: one driver's live membership in a stop's line.
//!
//! Entries are only ever received from the server and rendered. The client
//! never constructs or edits one to reflect a local action.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DriverId, QueueId, Timestamp};

/// Driver details shown in a roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

impl Driver {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Vehicle details shown in a roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub license_plate: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_number: Option<String>,
}

impl Vehicle {
    /// Short label such as `"ABC-123 (#14)"`.
    pub fn label(&self) -> String {
        match &self.internal_number {
            Some(number) if !number.is_empty() => format!("{} (#{})", self.license_plate, number),
            _ => self.license_plate.clone(),
        }
    }
}

/// One ranked slot in a stop's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub queue_id: QueueId,
    /// 1-based rank, oldest entry first.
    pub position: u32,
    pub driver: Driver,
    pub vehicle: Vehicle,
    pub entry_time: Timestamp,
    /// Minutes waited, as computed by the server at snapshot time.
    #[serde(default)]
    pub wait_time: u32,
}

impl QueueEntry {
    /// Renders the wait time as `"Nm"` below an hour, `"Hh Mm"` above.
    pub fn wait_label(&self) -> String {
        let hours = self.wait_time / 60;
        let minutes = self.wait_time % 60;
        if hours == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }

    pub fn belongs_to(&self, driver_id: DriverId) -> bool {
        self.driver.id == driver_id
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Builds an entry for `driver` at `position` with deterministic details.
    pub fn entry(driver: i64, position: u32) -> QueueEntry {
        QueueEntry {
            queue_id: QueueId::new(1000 + driver),
            position,
            driver: Driver {
                id: DriverId::new(driver),
                first_name: format!("Driver{}", driver),
                last_name: "Test".to_string(),
                phone: "555-0100".to_string(),
            },
            vehicle: Vehicle {
                license_plate: format!("PLT-{:03}", driver),
                brand: "Toyota".to_string(),
                model: "Hiace".to_string(),
                color: "white".to_string(),
                internal_number: None,
            },
            entry_time: Timestamp::from_datetime(
                Utc.with_ymd_and_hms(2024, 3, 1, 8, position, 0).unwrap(),
            ),
            wait_time: 10 * position,
        }
    }
}
