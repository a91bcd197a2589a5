//! Tracker configuration.
//!
//! The host may hand over a new snapshot between any two notifications; the
//! tracker re-derives its channel flags from it (see [`crate::Tracker::apply_config`]).
//! On disk the configuration is TOML, every field optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AttendanceError, Result};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = "clan-event-attendance/config.toml";

/// Which chat channel(s) an event is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    #[default]
    Primary,
    Secondary,
    Both,
}

impl ChannelMode {
    pub fn primary_enabled(self) -> bool {
        matches!(self, ChannelMode::Primary | ChannelMode::Both)
    }

    pub fn secondary_enabled(self) -> bool {
        matches!(self, ChannelMode::Secondary | ChannelMode::Both)
    }
}

/// What the export collaborator produces from a final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    pub channel_mode: ChannelMode,
    /// Seconds a member must accumulate to be listed as present.
    pub present_threshold_secs: u32,
    pub late_tracking: bool,
    /// Arrival offsets above this many seconds are late.
    pub late_threshold_secs: u32,
    pub output_format: OutputFormat,
    /// Fence final text reports in a markdown code block.
    pub markdown_code_block: bool,
    pub list_prefix: String,
    pub list_suffix: String,
    pub present_color: String,
    pub absent_color: String,
    pub block_copy_while_running: bool,
    pub save_locally: bool,
    /// Minutes between autosaves; 0 disables.
    pub autosave_interval_minutes: u32,
    /// Extra re-scan every N ticks while running; 0 disables.
    pub rescan_interval_ticks: u32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            channel_mode: ChannelMode::default(),
            present_threshold_secs: 60 * 10,
            late_tracking: true,
            late_threshold_secs: 60 * 5,
            output_format: OutputFormat::default(),
            markdown_code_block: true,
            list_prefix: "Event name: \nHosted by: ".to_string(),
            list_suffix: "Thanks for coming!".to_string(),
            present_color: "#00ff00".to_string(),
            absent_color: "#ff0000".to_string(),
            block_copy_while_running: true,
            save_locally: false,
            autosave_interval_minutes: 1,
            rescan_interval_ticks: 0,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or(AttendanceError::HomeDirNotFound)?;
    Ok(config_dir.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the configuration, returning defaults if the file doesn't exist.
pub fn load_config(path: Option<PathBuf>) -> Result<AttendanceConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config file; using defaults");
        return Ok(AttendanceConfig::default());
    }

    let content =
        fs_err::read_to_string(&config_path).map_err(|source| AttendanceError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;
    parse_config(&config_path, &content)
}

fn parse_config(path: &Path, content: &str) -> Result<AttendanceConfig> {
    toml::from_str::<AttendanceConfig>(content).map_err(|source| AttendanceError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
