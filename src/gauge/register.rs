//! # Fuel Gauge Registers
//!
//! Register map and decoding for the UPS HAT fuel gauge.
//!
//! The gauge exposes cell voltage and state of charge as two big-endian
//! register pairs:
//!
//! | Register | Content                          |
//! |----------|----------------------------------|
//! | `0x03`   | VCELL high (low nibble used)     |
//! | `0x04`   | VCELL low                        |
//! | `0x05`   | SOC high                         |
//! | `0x06`   | SOC low                          |
//!
//! VCELL is a 12-bit value with an LSB of 1.25 mV. SOC is a 16-bit value with
//! an LSB of 1/256 % (0.003906 %).

use std::fmt;

/// Default 7-bit I2C address of the gauge
pub const GAUGE_I2C_ADDRESS: u16 = 0x10;

/// VCELL high byte register
pub const REG_VCELL_HIGH: u8 = 0x03;

/// VCELL low byte register
pub const REG_VCELL_LOW: u8 = 0x04;

/// SOC high byte register
pub const REG_SOC_HIGH: u8 = 0x05;

/// SOC low byte register
pub const REG_SOC_LOW: u8 = 0x06;

/// Registers read on every tick, in read order
pub const SAMPLE_REGISTERS: [u8; 4] = [REG_VCELL_HIGH, REG_VCELL_LOW, REG_SOC_HIGH, REG_SOC_LOW];

/// Millivolts per VCELL LSB
pub const VCELL_MV_PER_LSB: f64 = 1.25;

/// Percent per SOC LSB
pub const SOC_PERCENT_PER_LSB: f64 = 0.003906;

/// Raw register bytes from one polling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub vcell_high: u8,
    pub vcell_low: u8,
    pub soc_high: u8,
    pub soc_low: u8,
}

impl RawSample {
    /// Build a sample from bytes in [`SAMPLE_REGISTERS`] order
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            vcell_high: bytes[0],
            vcell_low: bytes[1],
            soc_high: bytes[2],
            soc_low: bytes[3],
        }
    }

    /// 12-bit VCELL register value
    pub fn vcell(&self) -> u16 {
        (u16::from(self.vcell_high & 0x0F) << 8) | u16::from(self.vcell_low)
    }

    /// 16-bit SOC register value
    pub fn soc(&self) -> u16 {
        u16::from_be_bytes([self.soc_high, self.soc_low])
    }
}

/// Debug column of the telemetry log: the four bytes in decimal, tab separated
impl fmt::Display for RawSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.vcell_high, self.vcell_low, self.soc_high, self.soc_low
        )
    }
}

/// Battery voltage and charge decoded from a [`RawSample`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    /// Cell voltage in millivolts, rounded
    pub voltage_mv: u32,
    /// State of charge in percent, rounded to one decimal; not clamped
    pub charge_percent: f64,
}

/// Decode raw gauge bytes into voltage and charge
///
/// # Examples
///
/// ```
/// use ups_monitor::gauge::register::{decode, RawSample};
///
/// let raw = RawSample::from_bytes([0x0B, 0x94, 0x50, 0x00]);
/// let reading = decode(&raw);
/// assert_eq!(reading.voltage_mv, 3705);
/// assert_eq!(reading.charge_percent, 80.0);
/// ```
#[must_use]
pub fn decode(raw: &RawSample) -> BatteryReading {
    let voltage = f64::from(raw.vcell()) * VCELL_MV_PER_LSB;
    let charge = f64::from(raw.soc()) * SOC_PERCENT_PER_LSB;

    BatteryReading {
        // .5 mV rounds to even
        voltage_mv: voltage.round_ties_even() as u32,
        charge_percent: (charge * 10.0).round() / 10.0,
    }
}
