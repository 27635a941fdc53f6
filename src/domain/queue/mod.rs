//! Queue domain module.
//!
//! Types for stops, queue entries, roster snapshots and the driver's own
//! position, plus the vocabulary of membership actions.
//!
//! # Module Structure
//!
//! - `stop` - Stop read model
//! - `entry` - QueueEntry with driver and vehicle details
//! - `roster` - StopQueue full-replacement snapshot and its invariants
//! - `position` - MyPosition personal view
//! - `action` - ExitReason, ActionKind, ActionOutcome

mod action;
mod entry;
mod position;
mod roster;
mod stop;

pub use action::{ActionKind, ActionOutcome, ExitReason};
pub use entry::{Driver, QueueEntry, Vehicle};
pub use position::MyPosition;
pub use roster::StopQueue;
pub use stop::{Stop, StopStatus};

#[cfg(test)]
pub(crate) use entry::fixtures;
