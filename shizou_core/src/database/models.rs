//! Rows of the queue, schedule, timer and FILE result tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Queue ordering; lower values are served first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i32)]
pub enum Priority {
    Urgent = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(ValidationError::invalid_parameter(
                "priority",
                "expected urgent, high, normal or low",
            )),
        }
    }
}

/// Which processor drains a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum QueueType {
    #[sqlx(rename = "anidb_udp")]
    AniDbUdp,
    #[sqlx(rename = "anidb_http")]
    AniDbHttp,
    #[sqlx(rename = "hash")]
    Hash,
    #[sqlx(rename = "image")]
    Image,
    #[sqlx(rename = "general")]
    General,
}

impl QueueType {
    /// Every queue, in display order
    pub const ALL: [QueueType; 5] = [
        QueueType::AniDbUdp,
        QueueType::AniDbHttp,
        QueueType::Hash,
        QueueType::Image,
        QueueType::General,
    ];

    /// Name used in storage, logs and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AniDbUdp => "anidb_udp",
            Self::AniDbHttp => "anidb_http",
            Self::Hash => "hash",
            Self::Image => "image",
            Self::General => "general",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "anidb_udp" | "udp" => Ok(Self::AniDbUdp),
            "anidb_http" | "http" => Ok(Self::AniDbHttp),
            "hash" => Ok(Self::Hash),
            "image" => Ok(Self::Image),
            "general" => Ok(Self::General),
            _ => Err(ValidationError::invalid_parameter(
                "queue",
                "expected anidb_udp, anidb_http, hash, image or general",
            )),
        }
    }
}

/// Pending unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub id: i64,
    pub command_id: String,
    pub priority: Priority,
    pub queue_type: QueueType,
    /// Serialized command arguments
    pub args: String,
    pub created_at: DateTime<Utc>,
}

/// Row to insert into the command queue
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommandRequest {
    pub command_id: String,
    pub priority: Priority,
    pub queue_type: QueueType,
    pub args: String,
}

/// Future or recurring trigger for a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub id: i64,
    pub command_id: String,
    pub queue_type: QueueType,
    pub args: String,
    /// Dispatches left, including the next one; `None` repeats forever
    pub runs_left: Option<i64>,
    pub next_run_time: DateTime<Utc>,
    pub interval_ms: Option<i64>,
}

impl ScheduledCommand {
    /// Whether the row must be deleted after its next dispatch
    pub fn is_last_run(&self) -> bool {
        self.interval_ms.is_none() || self.runs_left.is_some_and(|runs| runs <= 1)
    }
}

/// Row to insert into the schedule
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledCommand {
    pub command_id: String,
    pub queue_type: QueueType,
    pub args: String,
    pub runs_left: Option<i64>,
    pub next_run_time: DateTime<Utc>,
    pub interval_ms: Option<i64>,
}

/// Named wall-clock deadline that survives restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Cached FILE lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFileResult {
    pub fid: i64,
    pub anime_id: Option<i64>,
    pub ed2k: Option<String>,
    pub size: Option<i64>,
    pub mylist_id: Option<i64>,
    /// Full result as JSON
    pub data: String,
    pub fetched_at: DateTime<Utc>,
}

/// Time conversion helpers
pub mod time_utils {
    use crate::Result;
    use crate::error::InternalError;
    use chrono::{DateTime, Utc};

    /// Convert a timestamp to milliseconds since Unix epoch
    pub fn to_millis(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    /// Convert milliseconds since Unix epoch to a timestamp
    pub fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            InternalError::invariant(format!("Timestamp out of range: {millis}")).into()
        })
    }

    /// Get current time as milliseconds since Unix epoch
    pub fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![Priority::Low, Priority::Urgent, Priority::Normal];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Urgent, Priority::Normal, Priority::Low]
        );
        assert_eq!(Priority::Urgent as i32, 1);
        assert_eq!(Priority::Low as i32, 4);
    }

    #[test]
    fn test_queue_type_parsing() {
        assert_eq!("udp".parse::<QueueType>().unwrap(), QueueType::AniDbUdp);
        assert_eq!("anidb-http".parse::<QueueType>().unwrap(), QueueType::AniDbHttp);
        assert_eq!("IMAGE".parse::<QueueType>().unwrap(), QueueType::Image);
        assert!("tcp".parse::<QueueType>().is_err());

        for queue in QueueType::ALL {
            assert_eq!(queue.as_str().parse::<QueueType>().unwrap(), queue);
        }
    }

    #[test]
    fn test_queue_type_serialization() {
        assert_eq!(
            serde_json::to_string(&QueueType::AniDbUdp).unwrap(),
            "\"anidb_udp\""
        );
    }

    #[test]
    fn test_scheduled_last_run() {
        let mut scheduled = ScheduledCommand {
            id: 1,
            command_id: "NoopCommand_1".to_string(),
            queue_type: QueueType::General,
            args: "{}".to_string(),
            runs_left: Some(3),
            next_run_time: Utc::now(),
            interval_ms: Some(60_000),
        };
        assert!(!scheduled.is_last_run());

        scheduled.runs_left = Some(1);
        assert!(scheduled.is_last_run());

        scheduled.runs_left = None;
        assert!(!scheduled.is_last_run());

        scheduled.runs_left = Some(3);
        scheduled.interval_ms = None;
        assert!(scheduled.is_last_run());

        scheduled.runs_left = None;
        assert!(scheduled.is_last_run());
    }

    #[test]
    fn test_time_round_trip() {
        let millis = 1_700_000_000_123;
        let time = time_utils::from_millis(millis).unwrap();
        assert_eq!(time_utils::to_millis(time), millis);
    }
}
