//! Application configuration
//!
//! Stored as TOML. Every section falls back to the firmware defaults, so a
//! partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub transfer: TransferConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub trigger: TriggerConfig,
}

/// Wireless link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Advertised name
    pub device_name: String,
    pub service_uuid: String,
    pub keep_awake_uuid: String,
    pub psm: u16,
    /// Largest chunk the link delivers in one read
    pub mtu: u16,
    /// Address the TCP stand-in link listens on
    pub listen_addr: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            service_uuid: SERVICE_UUID.to_string(),
            keep_awake_uuid: KEEP_AWAKE_UUID.to_string(),
            psm: DEFAULT_PSM,
            mtu: DEFAULT_MTU,
            listen_addr: "127.0.0.1:7150".to_string(),
        }
    }
}

/// Inbound reassembly limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Headers announcing more than this are rejected as out of memory
    pub max_payload_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub queue_capacity: usize,
    pub push_timeout_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Output device ID (`output:<name>`); None for the system default
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            output_device: None,
        }
    }
}

impl AudioConfig {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}

/// Image capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub keep_awake_delay_ms: u64,
    pub frame_pool_size: usize,
    /// Directory of JPEG files served as camera frames; None for a test pattern
    pub image_dir: Option<PathBuf>,
    /// Keep the device busy after a send until the host's audio reply has played
    pub await_reply: bool,
    /// Re-arm after this long without a reply; 0 waits forever
    pub reply_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            keep_awake_delay_ms: DEFAULT_KEEP_AWAKE_DELAY_MS,
            frame_pool_size: DEFAULT_FRAME_POOL_SIZE,
            image_dir: None,
            await_reply: true,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
        }
    }
}

impl CaptureConfig {
    pub fn keep_awake_delay(&self) -> Duration {
        Duration::from_millis(self.keep_awake_delay_ms)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        if self.reply_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.reply_timeout_ms))
        }
    }
}

/// Trigger surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Text command that triggers a capture (matched case-insensitively)
    pub command: String,
    pub poll_interval_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            command: "send".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl TriggerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Default config file location (`<config dir>/glimpse-glass/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "glimpse", "glimpse-glass")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path or the default location
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) => Self::load(&p),
                None => Ok(Self::default()),
            },
        }
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio.queue_capacity == 0 {
            return Err(Error::Config("audio.queue_capacity must be at least 1".into()));
        }
        if self.link.mtu == 0 {
            return Err(Error::Config("link.mtu must be non-zero".into()));
        }
        if self.transfer.max_payload_bytes == 0 {
            return Err(Error::Config("transfer.max_payload_bytes must be non-zero".into()));
        }
        if self.capture.frame_pool_size == 0 {
            return Err(Error::Config("capture.frame_pool_size must be at least 1".into()));
        }
        if self.audio.channels == 0 || self.audio.sample_rate == 0 {
            return Err(Error::Config("audio format must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = AppConfig::default();
        assert_eq!(config.audio.queue_capacity, 2);
        assert_eq!(config.audio.push_timeout(), Duration::from_millis(100));
        assert_eq!(config.link.mtu, 1251);
        assert_eq!(config.link.psm, 150);
        assert_eq!(config.capture.keep_awake_delay(), Duration::from_millis(50));
        assert!(config.capture.await_reply);
        assert_eq!(config.trigger.command, "send");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [audio]
            sample_rate = 16000
            channels = 1

            [capture]
            await_reply = false
            reply_timeout_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(!config.capture.await_reply);
        assert_eq!(config.capture.reply_timeout(), None);
        assert_eq!(config.link, LinkConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml("[audio]\nqueue_capacity = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = AppConfig::from_toml("[link]\nmtu = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = AppConfig::from_toml("[audio\nqueue_capacity = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("glimpse-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.link.listen_addr = "0.0.0.0:9000".to_string();
        config.capture.frame_pool_size = 3;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("glimpse-does-not-exist/config.toml");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
