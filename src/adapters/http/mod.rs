//! HTTP adapters - REST API clients.

pub mod stop_catalog;

pub use stop_catalog::HttpStopCatalog;
