//! Rendering of queue listings and status reports

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use shizou_core::QueueType;
use shizou_core::database::{CommandRequest, QueueStats, ScheduledCommand, Timer};
use std::fmt::Write;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Pending requests, in queue order
pub fn format_requests(requests: &[CommandRequest], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(requests)?),
        OutputFormat::Text => {
            if requests.is_empty() {
                return Ok("No pending commands".to_string());
            }
            let mut out = String::new();
            for request in requests {
                writeln!(
                    out,
                    "{:>6}  {:<10}  {:<7}  {}  {}",
                    request.id,
                    request.queue_type.as_str(),
                    request.priority.to_string(),
                    request.created_at.format("%Y-%m-%d %H:%M:%S"),
                    request.command_id.bold()
                )?;
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Pending count per queue
pub fn format_stats(stats: &QueueStats) -> String {
    let mut out = String::new();
    for queue in QueueType::ALL {
        let _ = writeln!(out, "{:<10}  {}", queue.as_str(), stats.pending_for(queue));
    }
    let _ = write!(out, "{:<10}  {}", "total", stats.total());
    out
}

#[derive(Serialize)]
struct StatusReport<'a> {
    pending: Vec<(&'static str, u64)>,
    scheduled: &'a [ScheduledCommand],
    bans: Vec<&'a Timer>,
}

/// Pending counts, scheduled commands and bans still in force at `now`
pub fn format_status(
    stats: &QueueStats,
    scheduled: &[ScheduledCommand],
    timers: &[Timer],
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<String> {
    let bans: Vec<&Timer> = timers
        .iter()
        .filter(|timer| timer.name.ends_with("_ban") && timer.expires_at > now)
        .collect();

    if format == OutputFormat::Json {
        let report = StatusReport {
            pending: QueueType::ALL
                .iter()
                .map(|queue| (queue.as_str(), stats.pending_for(*queue)))
                .collect(),
            scheduled,
            bans,
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut out = String::new();
    writeln!(out, "{}", "Pending".bold())?;
    for line in format_stats(stats).lines() {
        writeln!(out, "  {line}")?;
    }

    writeln!(out, "{}", "Scheduled".bold())?;
    if scheduled.is_empty() {
        writeln!(out, "  none")?;
    }
    for command in scheduled {
        let runs_left = command
            .runs_left
            .map_or_else(|| "unlimited".to_string(), |runs| runs.to_string());
        writeln!(
            out,
            "  {}  next {}  runs left {runs_left}",
            command.command_id,
            command.next_run_time.format("%Y-%m-%d %H:%M:%S"),
        )?;
    }

    writeln!(out, "{}", "Bans".bold())?;
    if bans.is_empty() {
        writeln!(out, "  {}", "none".green())?;
    }
    for ban in bans {
        let transport = ban.name.trim_end_matches("_ban");
        writeln!(
            out,
            "  {} until {} ({})",
            transport.red(),
            ban.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ban.reason.as_deref().unwrap_or("no reason given")
        )?;
    }
    Ok(out.trim_end().to_string())
}
