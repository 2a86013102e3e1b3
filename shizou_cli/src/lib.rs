//! Library half of the `shizou` binary: configuration, paths and output

pub mod config;
pub mod output;
pub mod paths;
pub mod terminal;

pub use config::{AppConfig, ConfigManager};
pub use output::OutputFormat;
