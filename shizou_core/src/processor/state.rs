//! Observable processor state

use chrono::{DateTime, Utc};
use std::fmt;

use crate::database::QueueType;
use crate::protocol::BanInfo;

/// Snapshot published to subscribers on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorState {
    pub queue: QueueType,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub ban: Option<BanInfo>,
    /// CommandId being executed
    pub current: Option<String>,
}

impl ProcessorState {
    pub fn new(queue: QueueType) -> Self {
        Self {
            queue,
            paused: false,
            pause_reason: None,
            ban: None,
            current: None,
        }
    }

    /// Whether execution is blocked
    pub fn is_blocked(&self) -> bool {
        self.paused || self.ban.is_some()
    }

    /// Collapsed view; a ban outranks a pause
    pub fn status(&self) -> ProcessorStatus {
        if let Some(ban) = &self.ban {
            return ProcessorStatus::Banned {
                reason: ban.reason.clone(),
                until: ban.until_wall,
            };
        }
        if self.paused {
            return ProcessorStatus::Paused(
                self.pause_reason
                    .clone()
                    .unwrap_or_else(|| "Paused".to_string()),
            );
        }
        ProcessorStatus::Running
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorStatus {
    Running,
    Paused(String),
    Banned {
        reason: String,
        until: DateTime<Utc>,
    },
}

impl fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Paused(reason) => write!(f, "paused: {reason}"),
            Self::Banned { reason, until } => {
                write!(f, "banned until {}: {reason}", until.to_rfc3339())
            }
        }
    }
}
