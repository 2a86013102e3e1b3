//! Per-queue command processors
//!
//! One `CommandProcessor` drains one queue, one command at a time. It owns the
//! queue's pause flag and mirrors the transport's `BanGate` into its observable
//! state, persisting ban deadlines so a restart keeps honoring them.

mod state;

pub use state::{ProcessorState, ProcessorStatus};

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::commands::{CommandArgs, CommandExecutor};
use crate::database::{CommandRequest, QueueType, Repository, Timer};
use crate::protocol::{BanGate, Outcome};
use crate::service::CommandService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Idle wait between polls of the queue
    pub poll_interval: Duration,
    pub start_paused: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            start_paused: false,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Executed,
    /// Queue empty
    Idle,
    /// Paused or banned
    Blocked,
}

pub struct CommandProcessor {
    queue: QueueType,
    config: ProcessorConfig,
    service: CommandService,
    executor: Arc<dyn CommandExecutor>,
    ban: BanGate,
    wake: Arc<Notify>,
    state: watch::Sender<ProcessorState>,
}

impl CommandProcessor {
    pub fn new(
        queue: QueueType,
        config: ProcessorConfig,
        service: CommandService,
        executor: Arc<dyn CommandExecutor>,
        ban: BanGate,
    ) -> Self {
        let mut initial = ProcessorState::new(queue);
        if config.start_paused {
            initial.paused = true;
            initial.pause_reason = Some("Started paused".to_string());
        }
        let (state, _) = watch::channel(initial);
        let wake = service.notifier(queue);
        Self {
            queue,
            config,
            service,
            executor,
            ban,
            wake,
            state,
        }
    }

    pub fn queue(&self) -> QueueType {
        self.queue
    }

    pub fn ban_gate(&self) -> &BanGate {
        &self.ban
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessorState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ProcessorState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ProcessorStatus {
        self.state.borrow().status()
    }

    /// Stop executing until `unpause`
    pub fn pause(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{} processor paused: {reason}", self.queue);
        self.state.send_modify(|state| {
            state.paused = true;
            state.pause_reason = Some(reason);
        });
    }

    /// Resume execution; ignored while banned
    pub fn unpause(&self) -> bool {
        if self.ban.is_banned() {
            info!("{} processor is banned, unpause ignored", self.queue);
            return false;
        }
        self.state.send_modify(|state| {
            state.paused = false;
            state.pause_reason = None;
        });
        info!("{} processor unpaused", self.queue);
        self.wake.notify_one();
        true
    }

    /// Drop every pending command of this queue
    pub async fn clear_queue(&self) -> Result<u64> {
        let removed = self
            .service
            .database()
            .command_requests()
            .clear_queue(self.queue)
            .await?;
        info!("{} queue cleared, {removed} commands removed", self.queue);
        Ok(removed)
    }

    fn ban_timer(&self) -> String {
        format!("{}_ban", self.ban.name())
    }

    /// Re-arm a ban persisted by an earlier run
    pub async fn restore_ban(&self) -> Result<()> {
        let timers = self.service.database().timers();
        let name = self.ban_timer();
        if let Some(timer) = timers.get(&name).await? {
            let reason = timer.reason.as_deref().unwrap_or("Banned");
            if !self.ban.restore(reason, timer.expires_at) {
                timers.delete(&name).await?;
            }
        }
        self.refresh_ban().await
    }

    /// Mirror the gate into the published state, persisting changes
    pub async fn refresh_ban(&self) -> Result<()> {
        let current = self.ban.current();
        let previous = self.state.borrow().ban.clone();
        if current == previous {
            return Ok(());
        }

        let timers = self.service.database().timers();
        match &current {
            Some(ban) => {
                warn!(
                    "{} processor banned until {}: {}",
                    self.queue,
                    ban.until_wall.to_rfc3339(),
                    ban.reason
                );
                timers
                    .set(&Timer {
                        name: self.ban_timer(),
                        expires_at: ban.until_wall,
                        reason: Some(ban.reason.clone()),
                    })
                    .await?;
            }
            None => {
                info!("{} processor unbanned", self.queue);
                timers.delete(&self.ban_timer()).await?;
                self.wake.notify_one();
            }
        }
        self.state.send_modify(|state| state.ban = current);
        Ok(())
    }

    /// One tick: ban refresh, due-scan, then at most one command
    pub async fn run_once(&self) -> Result<RunResult> {
        self.refresh_ban().await?;
        self.service.create_scheduled_commands(self.queue).await?;

        if self.state.borrow().is_blocked() {
            return Ok(RunResult::Blocked);
        }

        let Some(request) = self
            .service
            .database()
            .command_requests()
            .next(self.queue)
            .await?
        else {
            self.executor.on_idle(self.queue).await?;
            return Ok(RunResult::Idle);
        };

        self.execute(request).await?;
        Ok(RunResult::Executed)
    }

    async fn execute(&self, request: CommandRequest) -> Result<()> {
        let command_id = request.command_id.clone();
        self.state
            .send_modify(|state| state.current = Some(command_id.clone()));
        debug!("{} processor executing {command_id}", self.queue);

        let result = match CommandArgs::from_json(&request.args) {
            Ok(args) => self.executor.execute(&args).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Outcome::Success(())) => debug!("{command_id} completed"),
            Ok(Outcome::Negative(reason)) => info!("{command_id} completed: {reason}"),
            Ok(Outcome::Ban { reason }) => {
                warn!("{command_id} failed, transport banned: {reason}");
                if !self.ban.is_banned() {
                    self.ban.ban(&reason);
                }
            }
            Ok(Outcome::Fatal(reason)) => {
                warn!("{command_id} failed: {reason}");
                self.pause(reason);
            }
            Ok(Outcome::TransientError(reason)) => warn!("{command_id} failed: {reason}"),
            Err(e) => warn!("{command_id} failed: {e}"),
        }

        self.service
            .database()
            .command_requests()
            .delete(request.id)
            .await?;
        self.state.send_modify(|state| state.current = None);
        self.refresh_ban().await
    }

    /// Tick until cancelled, then let the executor shut down
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("{} processor started", self.queue);
        if let Err(e) = self.restore_ban().await {
            error!("{} processor could not restore ban: {e}", self.queue);
        }

        loop {
            let result = match self.run_once().await {
                Ok(result) => result,
                Err(e) => {
                    error!("{} processor tick failed: {e}", self.queue);
                    RunResult::Idle
                }
            };
            if shutdown.is_cancelled() {
                break;
            }
            if result == RunResult::Executed {
                continue;
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        if let Err(e) = self.executor.on_shutdown(self.queue).await {
            warn!("{} processor shutdown hook failed: {e}", self.queue);
        }
        info!("{} processor stopped", self.queue);
    }
}
