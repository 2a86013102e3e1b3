//! SQL of every schema version, oldest first

/// One schema step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "command queue, schedule, timers and FILE results",
        sql: QUEUE_TABLES,
    },
    Migration {
        version: 2,
        description: "unlimited scheduled runs",
        sql: NULLABLE_RUNS_LEFT,
    },
];

/// Version a fully migrated database reports
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Bookkeeping table, created before any migration runs
pub const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
)";

const QUEUE_TABLES: &str = r#"
-- Pending commands; command_id is the dedupe key
CREATE TABLE IF NOT EXISTS command_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command_id TEXT NOT NULL UNIQUE,
    priority INTEGER NOT NULL,
    queue_type TEXT NOT NULL,
    args TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Future and recurring triggers
CREATE TABLE IF NOT EXISTS scheduled_commands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command_id TEXT NOT NULL UNIQUE,
    queue_type TEXT NOT NULL,
    args TEXT NOT NULL,
    runs_left INTEGER NOT NULL DEFAULT 1,
    next_run_time INTEGER NOT NULL,
    interval_ms INTEGER
);

-- Named deadlines (ban expiry)
CREATE TABLE IF NOT EXISTS timers (
    name TEXT PRIMARY KEY,
    expires_at INTEGER NOT NULL,
    reason TEXT
);

-- FILE lookups
CREATE TABLE IF NOT EXISTS anidb_file_results (
    fid INTEGER PRIMARY KEY,
    anime_id INTEGER,
    ed2k TEXT,
    size INTEGER,
    mylist_id INTEGER,
    data TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_command_requests_queue ON command_requests(queue_type, priority, id);
CREATE INDEX IF NOT EXISTS idx_scheduled_commands_due ON scheduled_commands(queue_type, next_run_time);
CREATE INDEX IF NOT EXISTS idx_file_results_hash ON anidb_file_results(ed2k, size);
"#;

// SQLite cannot relax NOT NULL in place, so the table is rebuilt
const NULLABLE_RUNS_LEFT: &str = r#"
CREATE TABLE scheduled_commands_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command_id TEXT NOT NULL UNIQUE,
    queue_type TEXT NOT NULL,
    args TEXT NOT NULL,
    runs_left INTEGER,
    next_run_time INTEGER NOT NULL,
    interval_ms INTEGER
);

INSERT INTO scheduled_commands_new (id, command_id, queue_type, args, runs_left, next_run_time, interval_ms)
SELECT id, command_id, queue_type, args, runs_left, next_run_time, interval_ms
FROM scheduled_commands;

DROP TABLE scheduled_commands;
ALTER TABLE scheduled_commands_new RENAME TO scheduled_commands;

CREATE INDEX IF NOT EXISTS idx_scheduled_commands_due ON scheduled_commands(queue_type, next_run_time);
"#;
