//! Layered configuration: defaults, then the TOML file, then `SHIZOU_*`
//! environment variables (`__` separates sections, e.g. `SHIZOU_ANIDB__USERNAME`)

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use shizou_core::protocol::http::HttpConfig;
use shizou_core::protocol::image::{DEFAULT_IMAGE_SERVER, ImageConfig};
use shizou_core::protocol::udp::{MyListState, UdpConfig};
use shizou_core::protocol::{DEFAULT_HTTP_PORT, DEFAULT_SERVER, DEFAULT_UDP_PORT, MAX_BAN_PERIOD};
use shizou_core::{CommandSettings, ProcessorConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

const ENV_PREFIX: &str = "SHIZOU_";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub anidb: AniDbSettings,

    #[serde(default)]
    pub processor: ProcessorSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub mylist: MyListSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AniDbSettings {
    pub username: String,
    pub password: String,
    pub udp_client_name: String,
    pub http_client_name: String,
    pub client_version: String,
    pub udp_host: String,
    pub udp_port: u16,
    pub http_host: String,
    pub http_port: u16,
    pub local_port: u16,
    pub image_server: String,
    pub receive_timeout_seconds: u64,
    pub ban_hours: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorSettings {
    pub poll_interval_ms: u64,
    pub start_paused: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MyListSettings {
    /// Add processed files that are not in mylist yet
    pub add_files: bool,
    pub state: MyListState,
}

impl Default for AniDbSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            udp_client_name: "shizouudp".to_string(),
            http_client_name: "shizouhttp".to_string(),
            client_version: "1".to_string(),
            udp_host: DEFAULT_SERVER.to_string(),
            udp_port: DEFAULT_UDP_PORT,
            http_host: DEFAULT_SERVER.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            local_port: 4556,
            image_server: DEFAULT_IMAGE_SERVER.to_string(),
            receive_timeout_seconds: 10,
            ban_hours: 12,
        }
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            start_paused: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: paths::database_path(),
            cache_dir: paths::cache_dir(),
        }
    }
}

impl Default for MyListSettings {
    fn default() -> Self {
        Self {
            add_files: false,
            state: MyListState::Internal,
        }
    }
}

impl AppConfig {
    pub fn udp_config(&self) -> UdpConfig {
        UdpConfig {
            host: self.anidb.udp_host.clone(),
            port: self.anidb.udp_port,
            local_port: self.anidb.local_port,
            username: self.anidb.username.clone(),
            password: self.anidb.password.clone(),
            client_name: self.anidb.udp_client_name.clone(),
            client_version: self.anidb.client_version.clone(),
            receive_timeout: Duration::from_secs(self.anidb.receive_timeout_seconds),
            ..Default::default()
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            host: self.anidb.http_host.clone(),
            port: self.anidb.http_port,
            username: self.anidb.username.clone(),
            password: self.anidb.password.clone(),
            client_name: self.anidb.http_client_name.clone(),
            client_version: self.anidb.client_version.clone(),
            ..Default::default()
        }
    }

    pub fn image_config(&self) -> ImageConfig {
        ImageConfig {
            base_url: self.anidb.image_server.clone(),
            ..Default::default()
        }
    }

    /// `start_paused` from the command line wins over the file
    pub fn processor_config(&self, start_paused: bool) -> ProcessorConfig {
        ProcessorConfig {
            poll_interval: Duration::from_millis(self.processor.poll_interval_ms),
            start_paused: start_paused || self.processor.start_paused,
        }
    }

    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            cache_dir: self.storage.cache_dir.clone(),
            add_to_mylist: self.mylist.add_files,
            mylist_state: self.mylist.state,
        }
    }

    /// Configured ban length, never longer than `MAX_BAN_PERIOD`
    pub fn ban_period(&self) -> Duration {
        self.anidb
            .ban_hours
            .checked_mul(60 * 60)
            .map_or(MAX_BAN_PERIOD, Duration::from_secs)
            .min(MAX_BAN_PERIOD)
    }
}

/// Reads and writes the configuration file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: paths::config_path(),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }
        figment
    }

    /// Load with priority ENV > file > defaults
    pub fn load(&self) -> Result<AppConfig> {
        self.figment()
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")
    }

    /// Value of a dotted key (e.g. `anidb.username`)
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let value = toml::Value::try_from(&config)?;

        let mut current = &value;
        for part in key.split('.') {
            current = match current {
                toml::Value::Table(table) => table
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Key '{key}' not found"))?,
                _ => anyhow::bail!("Invalid key path: {key}"),
            };
        }

        scalar_to_string(current)
            .ok_or_else(|| anyhow::anyhow!("Value at '{key}' is not a simple type"))
    }

    /// Write a dotted key into the file, keeping everything else in it
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let defaults = toml::Value::try_from(AppConfig::default())?;
        let Some((section, field)) = key.split_once('.') else {
            anyhow::bail!("Key '{key}' must be of the form section.field");
        };
        let template = defaults
            .get(section)
            .and_then(|table| table.get(field))
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key '{key}'"))?;
        let parsed = parse_like(template, key, value)?;
        validate_value(key, &parsed)?;

        let mut document = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path).with_context(|| {
                format!("Failed to read {}", self.config_path.display())
            })?;
            toml::from_str::<toml::Table>(&content)
                .with_context(|| format!("Invalid TOML in {}", self.config_path.display()))?
        } else {
            toml::Table::new()
        };

        let table = document
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(table) = table else {
            anyhow::bail!("Invalid key path: expected table at '{section}'");
        };
        table.insert(field.to_string(), parsed);

        // Reject files the loader could not read back
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(&toml::to_string(&document)?))
            .extract::<AppConfig>()
            .with_context(|| format!("Invalid value for '{key}'"))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.config_path, toml::to_string_pretty(&document)?)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Every effective value, sorted by key
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let config = self.load()?;
        let value = toml::Value::try_from(&config)?;

        let mut items = Vec::new();
        collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
    if let toml::Value::Table(table) = value {
        for (key, val) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            collect_values(val, path, items);
        }
    } else if let Some(text) = scalar_to_string(value) {
        items.push((prefix, text));
    }
}

/// Parse `value` as the same TOML type as the default at `key`
fn parse_like(template: &toml::Value, key: &str, value: &str) -> Result<toml::Value> {
    Ok(match template {
        toml::Value::Integer(_) => toml::Value::Integer(
            value
                .parse::<u64>()
                .with_context(|| format!("{key} must be a non-negative integer"))?
                .try_into()
                .with_context(|| format!("{key} is out of range"))?,
        ),
        toml::Value::Boolean(_) => toml::Value::Boolean(
            value
                .parse()
                .with_context(|| format!("{key} must be 'true' or 'false'"))?,
        ),
        _ => toml::Value::String(value.to_string()),
    })
}

const MAX_BAN_HOURS: i64 = (MAX_BAN_PERIOD.as_secs() / 3600) as i64;

fn validate_value(key: &str, value: &toml::Value) -> Result<()> {
    match (key, value) {
        ("anidb.udp_port" | "anidb.http_port", toml::Value::Integer(port))
            if !(1..=i64::from(u16::MAX)).contains(port) =>
        {
            anyhow::bail!("{key} must be between 1 and 65535")
        }
        ("anidb.local_port", toml::Value::Integer(port)) if *port > i64::from(u16::MAX) => {
            anyhow::bail!("{key} must be at most 65535")
        }
        (
            "anidb.receive_timeout_seconds" | "anidb.ban_hours" | "processor.poll_interval_ms",
            toml::Value::Integer(0),
        ) => anyhow::bail!("{key} must be greater than 0"),
        ("anidb.ban_hours", toml::Value::Integer(hours)) if *hours > MAX_BAN_HOURS => {
            anyhow::bail!("{key} must be at most {MAX_BAN_HOURS} (one week)")
        }
        ("mylist.state", toml::Value::String(state)) => {
            state
                .parse::<MyListState>()
                .with_context(|| format!("Invalid mylist state '{state}'"))?;
            Ok(())
        }
        _ => Ok(()),
    }
}
