//! # Fuel Gauge Module
//!
//! Samples the UPS HAT fuel gauge over I2C.
//!
//! This module handles:
//! - Reading the four VCELL/SOC registers on every tick
//! - Bounding each read with a timeout
//! - Decoding register bytes into millivolts and percent
//! - Tagging failed reads so they are never mistaken for an empty battery

pub mod bus;
pub mod register;

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, UpsError};
use bus::RegisterBus;
use register::{decode, BatteryReading, RawSample, SAMPLE_REGISTERS};

/// Outcome of sampling the gauge once
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeSample {
    /// All four registers were read
    Valid {
        raw: RawSample,
        reading: BatteryReading,
    },
    /// A register read failed or timed out; carries the reason
    Failed(String),
}

impl GaugeSample {
    /// Decoded reading, if the sample is valid
    pub fn reading(&self) -> Option<&BatteryReading> {
        match self {
            GaugeSample::Valid { reading, .. } => Some(reading),
            GaugeSample::Failed(_) => None,
        }
    }

    /// Charge percent, if the sample is valid
    pub fn charge_percent(&self) -> Option<f64> {
        self.reading().map(|r| r.charge_percent)
    }
}

/// Fuel gauge reader
pub struct Gauge {
    bus: Box<dyn RegisterBus>,
    read_timeout: Duration,
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl Gauge {
    /// Create a reader over `bus`, bounding every register read by `read_timeout`
    pub fn new(bus: Box<dyn RegisterBus>, read_timeout: Duration) -> Self {
        Self { bus, read_timeout }
    }

    /// Read the raw VCELL and SOC registers
    ///
    /// # Errors
    ///
    /// - `Transport`: the bus reported an error for one of the registers
    /// - `ReadTimeout`: a register read did not complete within the timeout
    pub async fn read_raw(&mut self) -> Result<RawSample> {
        let mut bytes = [0u8; 4];

        for (slot, &register) in bytes.iter_mut().zip(SAMPLE_REGISTERS.iter()) {
            *slot = tokio::time::timeout(self.read_timeout, self.bus.read_byte(register))
                .await
                .map_err(|_| UpsError::ReadTimeout {
                    register,
                    timeout_ms: self.read_timeout.as_millis() as u64,
                })?
                .map_err(|e| {
                    UpsError::Transport(format!("register 0x{:02X}: {}", register, e))
                })?;
        }

        debug!("Gauge registers: {:?}", bytes);
        Ok(RawSample::from_bytes(bytes))
    }

    /// Sample and decode the gauge
    ///
    /// Never fails: bus errors become [`GaugeSample::Failed`] so the sampling
    /// loop keeps running through transient hardware hiccups.
    pub async fn sample(&mut self) -> GaugeSample {
        match self.read_raw().await {
            Ok(raw) => GaugeSample::Valid {
                raw,
                reading: decode(&raw),
            },
            Err(e) => GaugeSample::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::mocks::MockRegisterBus;
    use std::io;
    use tokio_test::{assert_err, assert_ok};

    fn gauge(bus: &MockRegisterBus) -> Gauge {
        Gauge::new(Box::new(bus.clone()), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_reads_registers_in_order() {
        let bus = MockRegisterBus::with_sample([0x0B, 0x94, 0x50, 0x00]);
        let mut gauge = gauge(&bus);

        let raw = assert_ok!(gauge.read_raw().await);
        assert_eq!(raw, RawSample::from_bytes([0x0B, 0x94, 0x50, 0x00]));
        assert_eq!(bus.get_reads(), vec![0x03, 0x04, 0x05, 0x06]);
    }

    #[tokio::test]
    async fn test_valid_sample_is_decoded() {
        let bus = MockRegisterBus::with_sample([0x0B, 0x94, 0x50, 0x00]);
        let mut gauge = gauge(&bus);

        match gauge.sample().await {
            GaugeSample::Valid { reading, .. } => {
                assert_eq!(reading.voltage_mv, 3705);
                assert_eq!(reading.charge_percent, 80.0);
            }
            other => panic!("Expected valid sample, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bus_error_is_tagged_not_zero() {
        let bus = MockRegisterBus::with_sample([0x0B, 0x94, 0x50, 0x00]);
        bus.set_read_error(Some(io::ErrorKind::TimedOut));
        let mut gauge = gauge(&bus);

        let err = assert_err!(gauge.read_raw().await);
        assert!(matches!(err, UpsError::Transport(_)));

        let sample = gauge.sample().await;
        assert!(matches!(sample, GaugeSample::Failed(_)));
        assert_eq!(sample.reading(), None);
        assert_eq!(sample.charge_percent(), None);
    }

    #[tokio::test]
    async fn test_failure_on_later_register_stops_sampling() {
        let bus = MockRegisterBus::new();
        bus.registers.lock().unwrap().insert(0x03, 0x0B);
        let mut gauge = gauge(&bus);

        match gauge.read_raw().await {
            Err(UpsError::Transport(msg)) => assert!(msg.contains("0x04")),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
        assert_eq!(bus.get_reads(), vec![0x03, 0x04]);
    }

    #[tokio::test]
    async fn test_hung_read_times_out() {
        let bus = MockRegisterBus::with_sample([0x0B, 0x94, 0x50, 0x00]);
        bus.set_delay(Duration::from_millis(500));
        let mut gauge = Gauge::new(Box::new(bus.clone()), Duration::from_millis(20));

        match gauge.read_raw().await {
            Err(UpsError::ReadTimeout { register, timeout_ms }) => {
                assert_eq!(register, 0x03);
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("Expected ReadTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let bus = MockRegisterBus::with_sample([0x0B, 0x94, 0x50, 0x00]);
        let mut gauge = gauge(&bus);

        bus.set_read_error(Some(io::ErrorKind::Other));
        assert!(matches!(gauge.sample().await, GaugeSample::Failed(_)));

        bus.set_read_error(None);
        assert_eq!(gauge.sample().await.charge_percent(), Some(80.0));
    }
}
