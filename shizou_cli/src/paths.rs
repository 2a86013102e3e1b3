//! Default locations of the configuration file, database and cache

use std::path::PathBuf;

const APP_DIR: &str = "shizou";

const CACHE_SUBDIR: &str = "cache";

const DATABASE_FILE: &str = "shizou.db";

const CONFIG_FILE: &str = "config.toml";

/// Base data directory
///
/// `$XDG_DATA_HOME/shizou` (or the platform data directory). Falls back to
/// `.shizou` in the current directory when no home can be determined.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".shizou"))
}

/// SQLite database holding the queue, the schedule and timers
pub fn database_path() -> PathBuf {
    data_dir().join(DATABASE_FILE)
}

/// Anime documents and images
pub fn cache_dir() -> PathBuf {
    data_dir().join(CACHE_SUBDIR)
}

/// Configuration directory
///
/// `XDG_CONFIG_HOME` wins on every Unix, including macOS where `dirs` would
/// otherwise answer `~/Library/Application Support`.
pub fn config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg_config).join(APP_DIR);
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".shizou"))
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}
