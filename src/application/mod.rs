//! Application layer - Queue membership orchestration.
//!
//! Components talk to the queue server only through the `QueueChannel`
//! port:
//! - `SubscriptionManager` - the one stop whose roster is being watched
//! - `PositionResolver` - "where am I", refreshed on demand
//! - `MembershipCoordinator` - enter / exit / change stop, one at a time
//! - `QueueView` - pure derivation of what the screen shows
//! - `QueueSession` - wires the above to channel events

pub mod coordinator;
pub mod notices;
pub mod position;
pub mod session;
pub mod subscription;
pub mod view_model;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{MembershipCoordinator, ALREADY_QUEUED_MESSAGE, BUSY_MESSAGE};
pub use notices::{Notice, Notifier};
pub use position::{PositionResolver, PositionState};
pub use session::QueueSession;
pub use subscription::{RosterState, SubscriptionManager};
pub use view_model::{mark_rows, ActionButton, PrimaryAction, QueueUiState, QueueView, RosterRow};
