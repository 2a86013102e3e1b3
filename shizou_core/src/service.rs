//! Entry point for enqueueing work
//!
//! `CommandService` is the only writer that inserts queue rows. Each insert
//! wakes the processor that owns the target queue.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::Result;
use crate::commands::CommandArgs;
use crate::database::{
    CommandRequest, Database, NewScheduledCommand, Priority, QueueStats, QueueType, Repository,
    ScheduledCommand,
};
use crate::error::{InternalError, ValidationError};

#[derive(Debug, Clone)]
pub struct CommandService {
    db: Database,
    notifiers: Arc<HashMap<QueueType, Arc<Notify>>>,
}

impl CommandService {
    pub fn new(db: Database) -> Self {
        let notifiers = QueueType::ALL
            .into_iter()
            .map(|queue| (queue, Arc::new(Notify::new())))
            .collect();
        Self {
            db,
            notifiers: Arc::new(notifiers),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Wake-up handle of a queue's processor
    pub fn notifier(&self, queue: QueueType) -> Arc<Notify> {
        self.notifiers
            .get(&queue)
            .cloned()
            .unwrap_or_else(|| Arc::new(Notify::new()))
    }

    fn wake(&self, queue: QueueType) {
        if let Some(notify) = self.notifiers.get(&queue) {
            notify.notify_one();
        }
    }

    /// Enqueue at the command's own priority
    ///
    /// Returns `false` when a request with the same CommandId is already pending.
    pub async fn dispatch(&self, args: &CommandArgs) -> Result<bool> {
        self.dispatch_with_priority(args, args.priority()).await
    }

    pub async fn dispatch_with_priority(
        &self,
        args: &CommandArgs,
        priority: Priority,
    ) -> Result<bool> {
        let request = args.to_request(priority)?;
        let inserted = self.db.command_requests().insert_if_absent(&request).await?;
        if inserted {
            debug!(
                "Dispatched {} to {} at {priority}",
                request.command_id, request.queue_type
            );
            self.wake(request.queue_type);
        } else {
            debug!("{} already pending", request.command_id);
        }
        Ok(inserted)
    }

    /// Batch dispatch; returns the number of new rows
    pub async fn dispatch_range(&self, args: &[CommandArgs]) -> Result<u64> {
        let requests = args
            .iter()
            .map(|args| args.to_request(args.priority()))
            .collect::<Result<Vec<_>>>()?;
        let inserted = self.db.command_requests().insert_many(&requests).await?;

        let queues: HashSet<QueueType> = requests.iter().map(|r| r.queue_type).collect();
        for queue in queues {
            self.wake(queue);
        }
        debug!("Dispatched {inserted} of {} commands", requests.len());
        Ok(inserted)
    }

    /// Add a future or recurring trigger
    ///
    /// `runs` counts dispatches including the first; `None` repeats until
    /// removed. Without an interval the trigger fires once. A command that is
    /// already scheduled keeps its existing trigger, whose id is returned.
    pub async fn schedule_command(
        &self,
        args: &CommandArgs,
        runs: Option<u32>,
        first_run: DateTime<Utc>,
        interval: Option<Duration>,
    ) -> Result<i64> {
        if runs == Some(0) {
            return Err(ValidationError::invalid_parameter("runs", "must be at least 1").into());
        }
        let interval_ms = match interval {
            Some(interval) if interval.is_zero() => {
                return Err(
                    ValidationError::invalid_parameter("interval", "must be positive").into(),
                );
            }
            Some(interval) => Some(i64::try_from(interval.as_millis()).map_err(|_| {
                ValidationError::invalid_parameter("interval", "too large")
            })?),
            None => None,
        };

        let scheduled = NewScheduledCommand {
            command_id: args.command_id(),
            queue_type: args.queue_type(),
            args: args.to_json()?,
            runs_left: runs.map(i64::from),
            next_run_time: first_run,
            interval_ms,
        };
        let repo = self.db.scheduled_commands();
        if let Some(id) = repo.insert_if_absent(&scheduled).await? {
            match runs {
                Some(runs) => info!(
                    "Scheduled {} at {} ({runs} runs)",
                    scheduled.command_id,
                    first_run.to_rfc3339()
                ),
                None => info!(
                    "Scheduled {} at {} (unlimited runs)",
                    scheduled.command_id,
                    first_run.to_rfc3339()
                ),
            }
            return Ok(id);
        }

        warn!(
            "Command {} already scheduled, ignoring",
            scheduled.command_id
        );
        let existing = repo
            .find_by_command_id(&scheduled.command_id)
            .await?
            .ok_or_else(|| {
                InternalError::invariant(format!(
                    "Scheduled command {} vanished after a conflicting insert",
                    scheduled.command_id
                ))
            })?;
        Ok(existing.id)
    }

    /// Dispatch every due trigger of a queue once
    ///
    /// Recurring triggers move forward by their interval; spent ones are
    /// deleted. Returns the number of triggers that fired.
    pub async fn create_scheduled_commands(&self, queue: QueueType) -> Result<usize> {
        let repo = self.db.scheduled_commands();
        let due = repo.find_due(queue, Utc::now()).await?;
        let mut fired = 0;

        for scheduled in due {
            let args = match CommandArgs::from_json(&scheduled.args) {
                Ok(args) => args,
                Err(e) => {
                    warn!(
                        "Dropping scheduled command {} with unreadable args: {e}",
                        scheduled.command_id
                    );
                    repo.delete(scheduled.id).await?;
                    continue;
                }
            };

            self.dispatch(&args).await?;
            fired += 1;

            if scheduled.is_last_run() {
                repo.delete(scheduled.id).await?;
            } else {
                repo.advance(&scheduled).await?;
            }
        }

        Ok(fired)
    }

    pub async fn pending(&self, queue: Option<QueueType>) -> Result<Vec<CommandRequest>> {
        self.db.command_requests().list(queue).await
    }

    pub async fn scheduled(&self) -> Result<Vec<ScheduledCommand>> {
        self.db.scheduled_commands().list().await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.db.command_requests().get_stats().await
    }
}
