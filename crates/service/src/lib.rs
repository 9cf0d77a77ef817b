//! Shared runtime for SeaSync binaries.
//!
//! This crate provides the pieces that sit between a store transport and a
//! session:
//! - Config (session and logging settings, with defaults)
//! - Worker (drains transport deliveries into a session until shutdown)

pub mod config;
pub mod worker;

// Re-export key types for convenience
pub use config::Config;
pub use worker::{run_worker, DeliveryStream, WorkerSummary};
