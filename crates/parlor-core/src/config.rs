use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParlorError, Result};

/// Top-level configuration for Parlor.
///
/// Loaded from `~/.parlor/config.toml` by default. Every section falls back
/// to its defaults when absent, so a partial file is always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParlorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ParlorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParlorConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParlorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Resolution of the real-time clock driver in milliseconds.
    pub clock_resolution_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            clock_resolution_ms: 50,
        }
    }
}

/// Chat session and message lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether sending messages is allowed at all.
    pub enabled: bool,
    /// Maximum message length in characters.
    pub max_message_length: usize,
    /// Model label assigned to newly created sessions.
    pub default_model: String,
    /// Origin used when minting attachment URLs (`blob:<origin>/<id>`).
    pub url_origin: String,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 4000,
            default_model: "parlor-canned-1".to_string(),
            url_origin: "parlor".to_string(),
            upload: UploadConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Simulated attachment upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Interval between progress ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Percentage added on every tick (1-100).
    pub progress_step: u8,
    /// Largest accepted attachment payload in bytes.
    pub max_attachment_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 300,
            progress_step: 10,
            max_attachment_bytes: 25 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Progress step clamped into `1..=100` so uploads always terminate.
    pub fn step(&self) -> u8 {
        self.progress_step.clamp(1, 100)
    }
}

/// Simulated assistant timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// "AI is typing" delay before the reply is appended, in milliseconds.
    pub typing_delay_ms: u64,
    /// Delay before an appended reply flips from sending to delivered.
    pub settle_delay_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: 1500,
            settle_delay_ms: 500,
        }
    }
}

impl AssistantConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
