// relaycard/src/settings.rs
//
// JSON settings: which port and card to drive, transport and queue options,
// and the resolved button definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::actions::{default_buttons, ButtonDefinition};
use crate::error::{RelayError, Result};
use crate::io::serial::transport::{TransportOptions, DEFAULT_MAX_DISCARDED_CHUNKS, DEFAULT_PACE};
use crate::io::{channel_index, CHANNEL_COUNT};
use crate::pipeline::{Backpressure, PipelineConfig, DEFAULT_QUEUE_CAPACITY, POLL_INTERVAL};

/// Settings file looked up in the working directory.
pub const CONFIG_NAME: &str = "relay_config.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub card_id: u8,
    #[serde(default)]
    pub verify_checksum: bool,
    #[serde(default = "default_max_discarded_chunks")]
    pub max_discarded_chunks: Option<usize>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub backpressure: Backpressure,
    /// Log to a file in the default reports directory when `log_dir` is unset
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Display names for channels 1-8
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_buttons")]
    pub buttons: Vec<ButtonDefinition>,
}

fn default_max_discarded_chunks() -> Option<usize> {
    Some(DEFAULT_MAX_DISCARDED_CHUNKS)
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            port: None,
            card_id: 0,
            verify_checksum: false,
            max_discarded_chunks: default_max_discarded_chunks(),
            queue_capacity: default_queue_capacity(),
            backpressure: Backpressure::default(),
            file_logging: false,
            log_dir: None,
            labels: Vec::new(),
            buttons: default_buttons(),
        }
    }
}

impl AppSettings {
    /// Check what the types alone cannot: target channels and label count.
    pub fn validate(&self) -> Result<()> {
        if self.labels.len() > CHANNEL_COUNT {
            return Err(RelayError::configuration(format!(
                "{} labels given, the card has {} channels",
                self.labels.len(),
                CHANNEL_COUNT
            )));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::configuration("queue_capacity must be at least 1"));
        }
        for button in &self.buttons {
            if button.targets.is_empty() {
                return Err(RelayError::configuration(format!(
                    "button '{}' has no targets",
                    button.label
                )));
            }
            for &target in &button.targets {
                channel_index(target).map_err(|_| {
                    RelayError::configuration(format!(
                        "button '{}' targets channel {}, expected 1..={}",
                        button.label, target, CHANNEL_COUNT
                    ))
                })?;
            }
        }
        Ok(())
    }

    pub fn button(&self, label: &str) -> Option<&ButtonDefinition> {
        self.buttons.iter().find(|b| b.label == label)
    }

    /// Label for a 0-based channel, falling back to its 1-based number.
    pub fn channel_label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("{}", index + 1))
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            verify_checksum: self.verify_checksum,
            max_discarded_chunks: self.max_discarded_chunks,
            pace: DEFAULT_PACE,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            card_id: self.card_id,
            queue_capacity: self.queue_capacity,
            backpressure: self.backpressure,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Directory to write log files to, or None when file logging is off.
    /// An explicit `log_dir` always enables it; `file_logging` alone falls
    /// back to the platform data directory.
    pub fn reports_dir(&self) -> Option<PathBuf> {
        match &self.log_dir {
            Some(dir) => Some(dir.clone()),
            None if self.file_logging => default_reports_dir(),
            None => None,
        }
    }
}

/// `<data dir>/relaycard/reports`, where the platform has a data directory.
pub fn default_reports_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("relaycard").join("reports"))
}

/// Default settings path: `relay_config.json` in the working directory.
pub fn default_settings_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(CONFIG_NAME))
}

/// Read settings from `path`. A missing file yields the defaults, which are
/// written out when `allow_write` is set.
pub fn load_settings(path: &Path, allow_write: bool) -> Result<AppSettings> {
    let settings = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::configuration(format!("Failed to read settings {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            RelayError::configuration(format!("Failed to parse settings {}: {}", path.display(), e))
        })?
    } else {
        let settings = AppSettings::default();
        if allow_write {
            save_settings(path, &settings)?;
        }
        settings
    };

    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
