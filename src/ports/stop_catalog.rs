//! StopCatalog port - Read-only access to the stop administration API.
//!
//! Stops are managed through a separate CRUD API. The queue client only
//! lists them to label screens and pick a stop to view.

use async_trait::async_trait;

use crate::domain::foundation::StopId;
use crate::domain::queue::Stop;

/// Errors from the stop catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("stop {0} not found")]
    NotFound(StopId),

    #[error("not authorized to read stops")]
    Unauthorized,

    #[error("stop API request failed: {0}")]
    Request(String),

    #[error("stop API returned an unreadable body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait StopCatalog: Send + Sync {
    /// All stops visible to the session.
    async fn list_stops(&self) -> Result<Vec<Stop>, CatalogError>;

    /// A single stop by id.
    async fn get_stop(&self, id: StopId) -> Result<Stop, CatalogError>;
}
