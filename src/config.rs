//! Configuration management for Forecourt
//!
//! This module handles loading, validation, and management of the kiosk
//! configuration from YAML files. Every tunable that used to be a
//! process-wide constant or flag lives here and is handed to the state
//! machine and scheduler constructors explicitly.

use crate::error::{ForecourtError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "FORECOURT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pump pricing and flow settings
    pub pump: PumpConfig,

    /// Polling loop intervals
    pub polling: PollingConfig,

    /// Deferred transition and debounce timings
    pub timing: TimingConfig,

    /// Pump trigger pin
    pub gpio: GpioConfig,

    /// Contactless card reader
    pub rfid: RfidConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Pricing and flow parameters for a pump session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Lowest price per litre a session may be rolled at
    pub min_price_per_litre: f64,

    /// Highest price per litre a session may be rolled at
    pub max_price_per_litre: f64,

    /// Litres added per trigger-active tick
    pub increment_rate: f64,

    /// Symbol prefixed to money labels
    pub currency_symbol: String,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Trigger sampling interval in milliseconds
    pub trigger_interval_ms: u64,

    /// Card presence sampling interval in milliseconds
    pub card_interval_ms: u64,

    /// Minimum spacing between two accepted card detections
    pub card_cooldown_ms: u64,

    /// Upper bound for a single presence check + UID read
    pub card_read_timeout_ms: u64,
}

/// Timings for deferred transitions and the keyboard debounce
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the payment success screen stays up before returning to idle
    pub payment_success_ms: u64,

    /// Delay between a cancel and the session reset
    pub cancel_grace_ms: u64,

    /// Keyboard mode: the trigger auto-releases when no press was seen for this long
    pub key_release_timeout_ms: u64,
}

/// Pump trigger pin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Try to open the GPIO peripheral at startup
    pub enabled: bool,

    /// BCM pin number of the pump button
    pub button_pin: u8,

    /// Button pulls the pin low when pressed (internal pull-up enabled)
    pub active_low: bool,
}

/// MFRC522 card reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RfidConfig {
    /// Try to bring up the reader at startup
    pub enabled: bool,

    /// SPI bus index (0 = SPI0)
    pub spi_bus: u8,

    /// Chip select line (0 = CE0)
    pub chip_select: u8,

    /// SPI clock speed in Hz
    pub clock_hz: u32,

    /// Upper bound for reader initialization
    pub init_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console-only override level
    pub console_level: Option<String>,

    /// File-only override level
    pub file_level: Option<String>,

    /// Initial level for the live web log stream
    pub web_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Directory with the kiosk browser UI
    pub static_dir: String,
}

impl PollingConfig {
    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }

    pub fn card_interval(&self) -> Duration {
        Duration::from_millis(self.card_interval_ms)
    }

    pub fn card_cooldown(&self) -> Duration {
        Duration::from_millis(self.card_cooldown_ms)
    }

    pub fn card_read_timeout(&self) -> Duration {
        Duration::from_millis(self.card_read_timeout_ms)
    }
}

impl TimingConfig {
    pub fn payment_success(&self) -> Duration {
        Duration::from_millis(self.payment_success_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn key_release_timeout(&self) -> Duration {
        Duration::from_millis(self.key_release_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first location that exists
    pub fn load() -> Result<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            let config = Self::from_file(&explicit)?;
            config.validate()?;
            return Ok(config);
        }

        let default_paths = ["forecourt.yaml", "/etc/forecourt/config.yaml"];
        for path in &default_paths {
            if Path::new(path).exists() {
                let config = Self::from_file(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let pump = &self.pump;
        if !pump.min_price_per_litre.is_finite() || pump.min_price_per_litre < 0.0 {
            return Err(ForecourtError::validation(
                "pump.min_price_per_litre",
                "Must be a non-negative number",
            ));
        }
        if !pump.max_price_per_litre.is_finite()
            || pump.max_price_per_litre < pump.min_price_per_litre
        {
            return Err(ForecourtError::validation(
                "pump.max_price_per_litre",
                "Must not be below min_price_per_litre",
            ));
        }
        if !pump.increment_rate.is_finite() || pump.increment_rate <= 0.0 {
            return Err(ForecourtError::validation(
                "pump.increment_rate",
                "Must be positive",
            ));
        }
        if pump.currency_symbol.is_empty() {
            return Err(ForecourtError::validation(
                "pump.currency_symbol",
                "Cannot be empty",
            ));
        }

        let polling = &self.polling;
        for (field, value) in [
            ("polling.trigger_interval_ms", polling.trigger_interval_ms),
            ("polling.card_interval_ms", polling.card_interval_ms),
            ("polling.card_read_timeout_ms", polling.card_read_timeout_ms),
        ] {
            if value == 0 {
                return Err(ForecourtError::validation(field, "Must be greater than 0"));
            }
        }

        if self.timing.key_release_timeout_ms == 0 {
            return Err(ForecourtError::validation(
                "timing.key_release_timeout_ms",
                "Must be greater than 0",
            ));
        }
        // The release window has to bridge at least one trigger tick
        if self.timing.key_release_timeout_ms < polling.trigger_interval_ms {
            return Err(ForecourtError::validation(
                "timing.key_release_timeout_ms",
                "Must not be shorter than polling.trigger_interval_ms",
            ));
        }

        if self.web.port == 0 {
            return Err(ForecourtError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gpio.button_pin, 17);
        assert_eq!(config.polling.trigger_interval_ms, 3);
        assert_eq!(config.polling.card_interval_ms, 500);
        assert!((config.pump.increment_rate - 0.0015).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.pump.min_price_per_litre = 2.0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.pump.increment_rate = 0.0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.web.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn key_timeout_must_cover_a_trigger_tick() {
        let mut config = Config::default();
        config.polling.trigger_interval_ms = 200;
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("key_release_timeout_ms"));
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let config = Config::default();
        assert_eq!(config.timing.payment_success(), Duration::from_secs(3));
        assert_eq!(config.timing.cancel_grace(), Duration::from_millis(100));
        assert_eq!(config.polling.card_cooldown(), Duration::from_secs(2));
    }
}
