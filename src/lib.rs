//! Zone Queue - Real-time vehicle queue membership client
//!
//! Keeps a driver's view of a stop's waiting line in sync with the queue
//! server over one long-lived channel, and lets the driver enter, leave or
//! move between queues.

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod ports;

pub use client::QueueClient;
