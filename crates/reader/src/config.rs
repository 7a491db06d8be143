//! Reader configuration management

use crate::usb::{DetachPolicy, SessionOptions};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub reader: ReaderSettings,
    #[serde(default)]
    pub usb: UsbSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSettings {
    #[serde(default = "ReaderSettings::default_log_level")]
    pub log_level: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl ReaderSettings {
    fn default_log_level() -> String {
        "warn".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Timeout for each control and interrupt transfer
    #[serde(default = "UsbSettings::default_timeout_ms")]
    pub timeout_ms: u32,
    /// When to detach kernel drivers (always, auto)
    #[serde(default)]
    pub detach_policy: DetachPolicy,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            detach_policy: DetachPolicy::default(),
        }
    }
}

impl UsbSettings {
    fn default_timeout_ms() -> u32 {
        1000 // 1 second
    }
}

impl ReaderConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/temper2/reader.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate TOML configuration
    pub fn parse(content: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("temper2").join("reader.toml")
        } else {
            PathBuf::from(".config/temper2/reader.toml")
        }
    }

    /// Session options derived from the `[usb]` section
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            timeout: Duration::from_millis(u64::from(self.usb.timeout_ms)),
            detach_policy: self.usb.detach_policy,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.reader.log_level)?;

        if self.usb.timeout_ms == 0 {
            return Err(anyhow!("Invalid timeout_ms 0, must be greater than 0"));
        }

        Ok(())
    }
}

/// Check a log level against the levels accepted by the reader
pub fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&level) {
        return Err(anyhow!(
            "Invalid log level '{}', must be one of: {}",
            level,
            valid_levels.join(", ")
        ));
    }
    Ok(())
}

/// Expand `~` in a user-supplied config path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.reader.log_level, "warn");
        assert_eq!(config.usb.timeout_ms, 1000);
        assert_eq!(config.usb.detach_policy, DetachPolicy::Always);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_options_from_config() {
        let mut config = ReaderConfig::default();
        config.usb.timeout_ms = 2500;
        config.usb.detach_policy = DetachPolicy::Auto;

        let options = config.session_options();
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert_eq!(options.detach_policy, DetachPolicy::Auto);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ReaderConfig::default();
        config.reader.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.reader.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout() {
        let mut config = ReaderConfig::default();
        config.usb.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = ReaderConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = ReaderConfig::parse(&toml_str).unwrap();

        assert_eq!(config.reader.log_level, parsed.reader.log_level);
        assert_eq!(config.usb.timeout_ms, parsed.usb.timeout_ms);
    }

    #[test]
    fn test_expand_path_keeps_absolute() {
        assert_eq!(
            expand_path("/etc/temper2/reader.toml"),
            PathBuf::from("/etc/temper2/reader.toml")
        );
    }
}
