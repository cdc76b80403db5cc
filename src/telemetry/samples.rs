//! # Sample Log
//!
//! Periodic battery samples: `time\tcharge\tvoltage\tvcellH\tvcellL\tsocH\tsocL`.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use super::{append, TIME_FORMAT};
use crate::error::Result;
use crate::gauge::register::{BatteryReading, RawSample};

/// Sample log writer
#[derive(Debug)]
pub struct SampleLog {
    path: PathBuf,
}

impl SampleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sample line
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be written.
    pub fn append(&self, at: NaiveDateTime, reading: &BatteryReading, raw: &RawSample) -> Result<()> {
        let line = format_line(at, reading, raw);
        debug!("Telemetry: {}", line.trim_end());
        append(&self.path, &line)
    }
}

fn format_line(at: NaiveDateTime, reading: &BatteryReading, raw: &RawSample) -> String {
    format!(
        "{}\t{:.1}\t{}\t{}\n",
        at.format(TIME_FORMAT),
        reading.charge_percent,
        reading.voltage_mv,
        raw
    )
}
