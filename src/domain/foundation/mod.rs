//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the queue membership domain.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedDriver};
pub use errors::ValidationError;
pub use ids::{DriverId, QueueId, StopId};
pub use timestamp::Timestamp;
