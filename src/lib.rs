//! # UPS Monitor Library
//!
//! Battery-backup monitor for a Raspberry Pi UPS HAT.
//!
//! This library samples the HAT's fuel gauge over I2C and its mains-detect
//! GPIO input, and keeps two append-only logs: one line per power outage and
//! periodic voltage/charge samples while the battery is in use.

pub mod config;
pub mod error;
pub mod gauge;
pub mod monitor;
pub mod power;
pub mod telemetry;
