//! Authentication adapters.
//!
//! - `claims` - Reads the driver identity out of the session token

mod claims;

pub use claims::driver_from_token;
