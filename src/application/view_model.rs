//! Queue view model - Render-ready state derived from the other components.
//!
//! Pure functions only: nothing here talks to the network.
//!
//! ```text
//!   not connected ─┐
//!   not loaded ────┴──► Connecting
//!   loaded, not in queue ──────────────► CanEnter          [Enter]
//!   in queue, my stop == viewed stop ──► InQueueHere       [Exit]
//!   in queue, my stop != viewed stop ──► InQueueElsewhere  [Change stop]
//!   in queue, stop not reported ───────► InQueueElsewhere  [Exit]
//! ```

use crate::domain::foundation::{DriverId, StopId};
use crate::domain::queue::{MyPosition, QueueEntry};
use crate::ports::ConnectionStatus;

use super::position::PositionState;
use super::subscription::RosterState;

/// The four mutually exclusive presentation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueUiState {
    Connecting,
    CanEnter,
    InQueueHere,
    InQueueElsewhere,
}

impl QueueUiState {
    pub fn derive(
        is_connected: bool,
        position_loaded: bool,
        my_position: &MyPosition,
        viewed: Option<StopId>,
    ) -> Self {
        if !is_connected || !position_loaded {
            return QueueUiState::Connecting;
        }
        if !my_position.in_queue {
            return QueueUiState::CanEnter;
        }
        // an in-queue position with no stop attached counts as elsewhere
        match my_position.stop_id() {
            Some(mine) if Some(mine) == viewed => QueueUiState::InQueueHere,
            _ => QueueUiState::InQueueElsewhere,
        }
    }
}

/// The one action the screen offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    Enter(StopId),
    Exit,
    ChangeStop(StopId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionButton {
    pub action: PrimaryAction,
    /// False while another action is outstanding.
    pub enabled: bool,
}

/// A roster entry and whether it belongs to the signed-in driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub entry: QueueEntry,
    pub is_mine: bool,
}

/// Everything a screen needs to render the viewed stop.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueView {
    pub state: QueueUiState,
    pub viewed_stop: Option<StopId>,
    pub primary_action: Option<ActionButton>,
    pub busy: bool,
    /// `None` until the first snapshot for the viewed stop arrives.
    pub rows: Option<Vec<RosterRow>>,
    pub total_vehicles: u32,
    /// Only meaningful outside `Connecting`.
    pub my_position: MyPosition,
    pub last_error: Option<String>,
}

impl QueueView {
    pub fn derive(
        connection: &ConnectionStatus,
        position: &PositionState,
        roster: &RosterState,
        driver: Option<DriverId>,
        busy: bool,
    ) -> Self {
        let state = QueueUiState::derive(
            connection.is_connected,
            position.loaded,
            &position.position,
            roster.viewed,
        );

        let action = match state {
            QueueUiState::Connecting => None,
            QueueUiState::CanEnter => roster.viewed.map(PrimaryAction::Enter),
            QueueUiState::InQueueHere => Some(PrimaryAction::Exit),
            // stop unknown: leaving is the only action that cannot misfire
            QueueUiState::InQueueElsewhere if position.position.stop.is_none() => {
                Some(PrimaryAction::Exit)
            }
            QueueUiState::InQueueElsewhere => roster.viewed.map(PrimaryAction::ChangeStop),
        };

        let rows = roster
            .roster
            .as_ref()
            .map(|queue| mark_rows(&queue.vehicles, driver));

        Self {
            state,
            viewed_stop: roster.viewed,
            primary_action: action.map(|action| ActionButton {
                action,
                enabled: !busy,
            }),
            busy,
            total_vehicles: roster.roster.as_ref().map_or(0, |q| q.total_vehicles),
            rows,
            my_position: position.position.clone(),
            last_error: connection.last_error.clone(),
        }
    }

    /// The signed-in driver's row in the viewed roster, if present.
    pub fn my_row(&self) -> Option<&RosterRow> {
        self.rows.as_ref()?.iter().find(|row| row.is_mine)
    }
}

/// Flags rows by driver identity, never by position or index.
pub fn mark_rows(entries: &[QueueEntry], driver: Option<DriverId>) -> Vec<RosterRow> {
    entries
        .iter()
        .map(|entry| RosterRow {
            is_mine: driver.is_some_and(|id| entry.belongs_to(id)),
            entry: entry.clone(),
        })
        .collect()
}
