//! Executor that records commands and answers from a script

use async_trait::async_trait;
use shizou_core::database::QueueType;
use shizou_core::{CommandArgs, CommandExecutor, Outcome, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every executed command
///
/// Outcomes are taken from the script in order; once it runs out every
/// command succeeds.
#[derive(Default)]
pub struct RecordingExecutor {
    outcomes: Mutex<VecDeque<Outcome<()>>>,
    executed: Mutex<Vec<CommandArgs>>,
    idle_calls: Mutex<Vec<QueueType>>,
    shutdown_calls: Mutex<Vec<QueueType>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Outcome<()>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn push_outcome(&self, outcome: Outcome<()>) {
        lock(&self.outcomes).push_back(outcome);
    }

    pub fn executed(&self) -> Vec<CommandArgs> {
        lock(&self.executed).clone()
    }

    /// CommandIds in execution order
    pub fn executed_ids(&self) -> Vec<String> {
        lock(&self.executed)
            .iter()
            .map(CommandArgs::command_id)
            .collect()
    }

    pub fn idle_calls(&self) -> usize {
        lock(&self.idle_calls).len()
    }

    pub fn shutdown_calls(&self) -> Vec<QueueType> {
        lock(&self.shutdown_calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, args: &CommandArgs) -> Result<Outcome<()>> {
        lock(&self.executed).push(args.clone());
        Ok(lock(&self.outcomes)
            .pop_front()
            .unwrap_or(Outcome::Success(())))
    }

    async fn on_idle(&self, queue: QueueType) -> Result<()> {
        lock(&self.idle_calls).push(queue);
        Ok(())
    }

    async fn on_shutdown(&self, queue: QueueType) -> Result<()> {
        lock(&self.shutdown_calls).push(queue);
        Ok(())
    }
}
