//! Test utilities for the Shizou command queue
//!
//! This crate provides a scripted UDP transport, a recording command executor
//! and fixtures for databases, configs and AniDB response bodies.

pub mod executor;
pub mod fixtures;
pub mod transport;

// Re-export commonly used types
pub use executor::RecordingExecutor;
pub use fixtures::{FileBody, instant_limiter, temp_database, test_udp_config};
pub use transport::{Reply, ScriptedDatagramTransport};
