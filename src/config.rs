//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) reproduces the stock UPS HAT setup: gauge at `0x10` on I2C bus 1,
//! mains-detect on BCM pin 17, a 5 second sampling period and the two logs
//! `pwr_fault.log` / `ups.log` in the working directory.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpsError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gauge: GaugeConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fuel gauge (I2C) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GaugeConfig {
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,

    #[serde(default = "default_gauge_address")]
    pub address: u16,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Mains-detect pin configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PowerConfig {
    #[serde(default = "default_power_pin")]
    pub pin: u8,

    #[serde(default = "default_debounce_reads")]
    pub debounce_reads: u32,

    #[serde(default)]
    pub initial_state: InitialState,
}

/// Sampling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Log file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_outage_log")]
    pub outage_log: String,

    #[serde(default = "default_telemetry_log")]
    pub telemetry_log: String,

    #[serde(default)]
    pub outage_format: OutageFormat,

    #[serde(default = "default_telemetry_threshold_percent")]
    pub telemetry_threshold_percent: f64,

    /// Optional file (inside `log_dir`) that receives diagnostic output
    #[serde(default)]
    pub diagnostics_file: Option<String>,
}

/// How the power state is seeded at start-up
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InitialState {
    /// Assume mains is present without reading the pin
    #[default]
    AssumePresent,
    /// Read the pin once before the first tick
    Probe,
}

/// On-disk layout of the outage log
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutageFormat {
    /// Tab separated half-records: one line opened on loss, closed on restore
    #[default]
    Tsv,
    /// One JSON object per completed outage
    Jsonl,
}

// Default value functions
fn default_i2c_bus() -> u8 { 1 }
fn default_gauge_address() -> u16 { 0x10 }
fn default_read_timeout_ms() -> u64 { 500 }

fn default_power_pin() -> u8 { 17 }
fn default_debounce_reads() -> u32 { 1 }

fn default_interval_ms() -> u64 { 5000 }

fn default_log_dir() -> String { ".".to_string() }
fn default_outage_log() -> String { "pwr_fault.log".to_string() }
fn default_telemetry_log() -> String { "ups.log".to_string() }
fn default_telemetry_threshold_percent() -> f64 { 95.0 }

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            i2c_bus: default_i2c_bus(),
            address: default_gauge_address(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            pin: default_power_pin(),
            debounce_reads: default_debounce_reads(),
            initial_state: InitialState::default(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            outage_log: default_outage_log(),
            telemetry_log: default_telemetry_log(),
            outage_format: OutageFormat::default(),
            telemetry_threshold_percent: default_telemetry_threshold_percent(),
            diagnostics_file: None,
        }
    }
}

impl LoggingConfig {
    /// Full path of the outage log
    pub fn outage_log_path(&self) -> PathBuf {
        Path::new(&self.log_dir).join(&self.outage_log)
    }

    /// Full path of the telemetry log
    pub fn telemetry_log_path(&self) -> PathBuf {
        Path::new(&self.log_dir).join(&self.telemetry_log)
    }
}

fn invalid(msg: impl std::fmt::Display) -> UpsError {
    UpsError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ups_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Called by [`Config::load`]; call it again after applying command line
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // 7-bit addresses outside the reserved blocks
        if !(0x03..=0x77).contains(&self.gauge.address) {
            return Err(invalid(format!(
                "gauge address 0x{:02X} must be between 0x03 and 0x77",
                self.gauge.address
            )));
        }

        if self.gauge.read_timeout_ms == 0 || self.gauge.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.power.pin > 27 {
            return Err(invalid(format!(
                "power pin {} is out of range (BCM 0-27)",
                self.power.pin
            )));
        }

        if self.power.debounce_reads == 0 || self.power.debounce_reads > 100 {
            return Err(invalid("debounce_reads must be between 1 and 100"));
        }

        if self.sampling.interval_ms < 100 || self.sampling.interval_ms > 3_600_000 {
            return Err(invalid("interval_ms must be between 100 and 3600000"));
        }

        if self.logging.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        if self.logging.outage_log.is_empty() || self.logging.telemetry_log.is_empty() {
            return Err(invalid("log file names cannot be empty"));
        }

        if self.logging.outage_log == self.logging.telemetry_log {
            return Err(invalid("outage_log and telemetry_log must be different files"));
        }

        let threshold = self.logging.telemetry_threshold_percent;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(invalid("telemetry_threshold_percent must be between 0.0 and 100.0"));
        }

        if matches!(self.logging.diagnostics_file.as_deref(), Some("")) {
            return Err(invalid("diagnostics_file cannot be empty when set"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.gauge.address, 0x10);
        assert_eq!(config.power.pin, 17);
        assert_eq!(config.sampling.interval_ms, 5000);
        assert_eq!(config.logging.outage_format, OutageFormat::Tsv);
        assert_eq!(config.power.initial_state, InitialState::AssumePresent);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[gauge]
address = 0x36
read_timeout_ms = 250

[power]
pin = 6
debounce_reads = 3
initial_state = "probe"

[sampling]
interval_ms = 1000

[logging]
log_dir = "/var/log/ups"
outage_format = "jsonl"
telemetry_threshold_percent = 90.0
diagnostics_file = "ups-monitor.log"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.gauge.address, 0x36);
        assert_eq!(config.gauge.i2c_bus, 1);
        assert_eq!(config.power.debounce_reads, 3);
        assert_eq!(config.power.initial_state, InitialState::Probe);
        assert_eq!(config.logging.outage_format, OutageFormat::Jsonl);
        assert_eq!(config.logging.telemetry_log, "ups.log");
        assert_eq!(
            config.logging.outage_log_path(),
            PathBuf::from("/var/log/ups/pwr_fault.log")
        );
        assert_eq!(config.logging.diagnostics_file.as_deref(), Some("ups-monitor.log"));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.gauge.address, default_gauge_address());
        assert_eq!(config.power.pin, default_power_pin());
        assert_eq!(config.sampling.interval_ms, default_interval_ms());
        assert_eq!(config.logging.outage_log, default_outage_log());
        assert_eq!(config.logging.diagnostics_file, None);
    }

    #[test]
    fn test_unknown_outage_format_fails_to_parse() {
        let result: std::result::Result<Config, _> =
            toml::from_str("[logging]\noutage_format = \"csv\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        match Config::load("/nonexistent/ups-monitor.toml") {
            Err(UpsError::Io(_)) => {}
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_address_out_of_range() {
        let mut config = Config::default();
        config.gauge.address = 0x78;
        assert!(config.validate().is_err());
        config.gauge.address = 0x02;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = Config::default();
        config.gauge.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.gauge.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_power_pin_out_of_range() {
        let mut config = Config::default();
        config.power.pin = 28;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debounce_reads_bounds() {
        let mut config = Config::default();
        config.power.debounce_reads = 0;
        assert!(config.validate().is_err());
        config.power.debounce_reads = 101;
        assert!(config.validate().is_err());
        config.power.debounce_reads = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_bounds() {
        let mut config = Config::default();
        config.sampling.interval_ms = 99;
        assert!(config.validate().is_err());
        config.sampling.interval_ms = 3_600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_log_file_rejected() {
        let mut config = Config::default();
        config.logging.telemetry_log = config.logging.outage_log.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = Config::default();
        config.logging.telemetry_threshold_percent = 100.5;
        assert!(config.validate().is_err());
        config.logging.telemetry_threshold_percent = -1.0;
        assert!(config.validate().is_err());
        config.logging.telemetry_threshold_percent = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_diagnostics_file() {
        let mut config = Config::default();
        config.logging.diagnostics_file = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_i2c_bus(), 1);
        assert_eq!(default_gauge_address(), 0x10);
        assert_eq!(default_read_timeout_ms(), 500);
        assert_eq!(default_power_pin(), 17);
        assert_eq!(default_debounce_reads(), 1);
        assert_eq!(default_interval_ms(), 5000);
        assert_eq!(default_log_dir(), ".");
        assert_eq!(default_outage_log(), "pwr_fault.log");
        assert_eq!(default_telemetry_log(), "ups.log");
        assert_eq!(default_telemetry_threshold_percent(), 95.0);
    }
}
