//! Repository pattern implementation for database access
//!
//! This module provides repository interfaces for each entity type,
//! handling all database operations with proper error handling.

pub mod command_request;
pub mod file_result;
pub mod scheduled_command;
pub mod timer;

use crate::Result;
use async_trait::async_trait;

// Re-export repository implementations
pub use command_request::{CommandRequestRepository, QueueStats};
pub use file_result::FileResultRepository;
pub use scheduled_command::ScheduledCommandRepository;
pub use timer::TimerRepository;

/// Base repository trait for rows addressed by a numeric id
#[async_trait]
pub trait Repository<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<T>>;

    /// Delete an entity by ID
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count all entities
    async fn count(&self) -> Result<i64>;
}
