//! Personal queue position.
//!
//! Sourced only by explicit pull. It is not derived from whichever roster is
//! on screen, because the driver's own stop may not be the viewed one.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StopId;

use super::Stop;

/// "Am I in a queue, where, and at what rank."
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPosition {
    pub in_queue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_in_queue: Option<u32>,
}

impl MyPosition {
    /// Position for a driver standing in no queue.
    pub fn not_in_queue() -> Self {
        Self::default()
    }

    /// Position for a driver ranked `position` of `total` at `stop`.
    pub fn at(stop: Stop, position: u32, total: u32) -> Self {
        Self {
            in_queue: true,
            stop: Some(stop),
            position: Some(position),
            total_in_queue: Some(total),
        }
    }

    /// Stop the driver is queued at, only when `in_queue` is set.
    pub fn stop_id(&self) -> Option<StopId> {
        if !self.in_queue {
            return None;
        }
        self.stop.as_ref().map(|s| s.id)
    }

    /// Returns true if the driver is queued at `stop_id`.
    pub fn is_at(&self, stop_id: StopId) -> bool {
        self.stop_id() == Some(stop_id)
    }
}
