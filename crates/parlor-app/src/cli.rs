//! CLI argument definitions for the Parlor application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use parlor_core::config::ParlorConfig;

/// Parlor: an interactive terminal chat over the canned assistant.
#[derive(Parser, Debug)]
#[command(name = "parlor", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Upload tick interval in milliseconds.
    #[arg(long = "tick-ms")]
    pub tick_ms: Option<u64>,

    /// Extension for the first chat (farm, personal, bank, ...).
    #[arg(short = 'e', long = "extension")]
    pub extension: Option<String>,

    /// Print every chat event as a JSON line.
    #[arg(long = "events")]
    pub events: bool,

    /// Start with the connection reported as disconnected.
    #[arg(long = "offline")]
    pub offline: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLOR_CONFIG env var > ~/.parlor/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLOR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Apply flag overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut ParlorConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ms) = self.tick_ms {
            config.chat.upload.tick_interval_ms = ms;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parlor").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parlor").join("config.toml");
    }
    PathBuf::from("config.toml")
}
