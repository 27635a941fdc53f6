//! Domain layer containing queue membership types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, identity)
//! - `queue` - Stops, roster snapshots, personal position, membership actions

pub mod foundation;
pub mod queue;
