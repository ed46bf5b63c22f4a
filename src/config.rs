//! Configuration management for the Bravia bridge
//!
//! Handles loading, parsing, and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Refresh interval used when `sync_seconds` is absent or negative
pub const DEFAULT_SYNC_SECONDS: u64 = 60;

/// Longest accepted refresh interval (one week)
pub const MAX_SYNC_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    /// Status refresh interval in seconds (0 disables the periodic refresh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_seconds: Option<i64>,
    /// Prefix of every state id owned by this bridge
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Television connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub ip: String,
    /// Pre-shared key configured on the TV (Network > IP control)
    pub psk: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    /// Connect/response timeout for every API call
    #[serde(default = "default_device_timeout_ms")]
    pub timeout_ms: u64,
}

/// Reachability probe settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_device_port")]
    pub port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: default_device_port(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Rolling file log settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the configuration file without validating it
    ///
    /// Lets the caller apply command-line overrides before validation.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let ip = self.device.ip.trim();
        if ip.is_empty() || ip == "0.0.0.0" {
            anyhow::bail!("Please configure the Sony Bravia bridge: device.ip is not set");
        }
        if self.device.psk.trim().is_empty() {
            anyhow::bail!("Please configure the Sony Bravia bridge: device.psk is not set");
        }
        if self.device.timeout_ms == 0 {
            anyhow::bail!("device.timeout_ms must be greater than zero");
        }
        if self.probe.timeout_ms == 0 {
            anyhow::bail!("probe.timeout_ms must be greater than zero");
        }

        if let Some(seconds) = self.sync_seconds {
            if seconds > MAX_SYNC_SECONDS as i64 {
                anyhow::bail!(
                    "sync_seconds {} is too large (maximum {})",
                    seconds,
                    MAX_SYNC_SECONDS
                );
            }
        }

        let namespace = self.namespace.trim();
        if namespace.is_empty() || namespace.ends_with('.') || namespace.starts_with('.') {
            anyhow::bail!("namespace '{}' is invalid", self.namespace);
        }

        Ok(())
    }

    /// Periodic status refresh interval, `None` when disabled
    ///
    /// Absent or negative `sync_seconds` fall back to the 60 second default.
    /// Values above [`MAX_SYNC_SECONDS`] are capped.
    pub fn refresh_interval(&self) -> Option<Duration> {
        let seconds = match self.sync_seconds {
            Some(s) if s >= 0 => (s as u64).min(MAX_SYNC_SECONDS),
            _ => DEFAULT_SYNC_SECONDS,
        };

        if seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(seconds))
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// Default value functions
fn default_namespace() -> String { "sony-bravia.0".to_string() }
fn default_device_port() -> u16 { 80 }
fn default_device_timeout_ms() -> u64 { 5000 }
fn default_probe_timeout_ms() -> u64 { 1000 }
fn default_log_file_prefix() -> String { "bravia-bridge.log".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
device:
  ip: "192.168.1.40"
  psk: "0000"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.device.port, 80);
        assert_eq!(config.device.timeout(), Duration::from_millis(5000));
        assert_eq!(config.namespace, "sony-bravia.0");
        assert_eq!(config.probe.port, 80);
        assert_eq!(config.probe.timeout(), Duration::from_millis(1000));
        assert!(config.logging.is_none());
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_refresh_interval() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();

        config.sync_seconds = Some(15);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(15)));

        config.sync_seconds = Some(0);
        assert_eq!(config.refresh_interval(), None);

        config.sync_seconds = Some(-5);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_huge_sync_seconds() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();

        config.sync_seconds = Some(i64::MAX);
        assert!(config.validate().is_err());
        assert_eq!(
            config.refresh_interval(),
            Some(Duration::from_secs(MAX_SYNC_SECONDS))
        );

        config.sync_seconds = Some(MAX_SYNC_SECONDS as i64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unconfigured_ip() {
        let yaml = r#"
device:
  ip: "0.0.0.0"
  psk: "0000"
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("device.ip"));

        let yaml = r#"
device:
  ip: ""
  psk: "0000"
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_missing_psk() {
        let yaml = r#"
device:
  ip: "192.168.1.40"
  psk: "  "
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("device.psk"));
    }

    #[test]
    fn test_rejects_bad_namespace() {
        let yaml = r#"
device:
  ip: "192.168.1.40"
  psk: "0000"
namespace: "sony-bravia."
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        let contents = r#"
device:
  ip: "tv.local"
  psk: "sony"
  port: 8080
  timeout_ms: 2500
sync_seconds: 30
namespace: "living-room.0"
probe:
  port: 8080
logging:
  directory: "logs"
"#;
        fs::write(&config_path, contents)?;

        let config = AppConfig::load(&config_path).await?;
        assert_eq!(config.device.ip, "tv.local");
        assert_eq!(config.device.port, 8080);
        assert_eq!(config.device.timeout(), Duration::from_millis(2500));
        assert_eq!(config.namespace, "living-room.0");
        assert_eq!(config.probe.port, 8080);
        assert_eq!(config.probe.timeout_ms, 1000);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30)));

        let logging = config.logging.expect("logging section");
        assert_eq!(logging.directory, PathBuf::from("logs"));
        assert_eq!(logging.file_prefix, "bravia-bridge.log");

        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let err = AppConfig::load("/nonexistent/bravia.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
