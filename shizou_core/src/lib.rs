//! Shizou core library
//!
//! The command queue and AniDB protocol clients behind the `shizou` binary:
//! rate limiters per transport, a durable priority queue with dedupe and
//! scheduling, one processor per queue, and the UDP/HTTP/image envelopes used
//! by the closed set of commands.

pub mod commands;
pub mod database;
pub mod error;
pub mod hashing;
pub mod processor;
pub mod protocol;
pub mod ratelimit;
pub mod service;

// Re-export main types
pub use commands::{CommandArgs, CommandContext, CommandExecutor, CommandSettings, FileTarget};
pub use database::{Database, DatabaseStats, Priority, QueueType};
pub use error::{Error, Result};
pub use hashing::{Ed2kHashService, FileDigest, HashService};
pub use processor::{CommandProcessor, ProcessorConfig, ProcessorState, ProcessorStatus, RunResult};
pub use protocol::{BanGate, BanInfo, Outcome};
pub use ratelimit::{RateLimitConfig, RateLimitGuard, RateLimiter};
pub use service::CommandService;
