use crate::domain::models::{AuthKey, CallbackDelivery};
use crate::domain::sample_queue::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "miband_stream".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Timing and buffering of a band session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Notification wait per streaming iteration
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Re-arm period of the raw stream
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// Notification wait per handshake iteration
    #[serde(default = "default_auth_poll_interval_ms")]
    pub auth_poll_interval_ms: u64,
    /// Overall handshake deadline
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Wait after enabling auth notifications on connect
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub callback_delivery: CallbackDelivery,
    #[serde(default)]
    pub auth_key: AuthKey,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            auth_poll_interval_ms: default_auth_poll_interval_ms(),
            auth_timeout_ms: default_auth_timeout_ms(),
            settle_ms: default_settle_ms(),
            callback_delivery: CallbackDelivery::default(),
            auth_key: AuthKey::default(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_keepalive_interval_secs() -> u64 {
    60
}
fn default_auth_poll_interval_ms() -> u64 {
    100
}
fn default_auth_timeout_ms() -> u64 {
    10_000
}
fn default_settle_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Bluetooth address of the band, e.g. "C8:0F:10:AA:BB:CC"
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub device: DeviceSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory, falling back to defaults
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults if it is missing or invalid
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("MiBandStream");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Remember the band address for the next run
    pub fn set_address(&mut self, address: &str) -> anyhow::Result<()> {
        if self.settings.device.address.as_deref() != Some(address) {
            self.settings.device.address = Some(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}
