//! # Error Types
//!
//! Custom error types for UPS Monitor using `thiserror`.

use thiserror::Error;

/// Main error type for UPS Monitor
#[derive(Debug, Error)]
pub enum UpsError {
    /// I2C bus could not be opened or addressed
    #[error("I2C bus error: {0}")]
    Bus(String),

    /// Register read failed on the bus
    #[error("Transport error: {0}")]
    Transport(String),

    /// Register read did not complete in time
    #[error("Read of register 0x{register:02X} timed out after {timeout_ms} ms")]
    ReadTimeout { register: u8, timeout_ms: u64 },

    /// GPIO errors (mains-detect pin)
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Structured outage record serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for UPS Monitor
pub type Result<T> = std::result::Result<T, UpsError>;
