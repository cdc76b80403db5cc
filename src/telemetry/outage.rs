//! # Outage Log
//!
//! Records mains loss and restoration.
//!
//! Two layouts are supported:
//!
//! - **tsv**: the loss writes `date\ttime\t` and leaves the line open; the
//!   restoration completes it with `time\tcharge %\n`. A finished outage reads
//!   `03.05.2024\t14:01:05\t14:02:10\t63.4 %`.
//! - **jsonl**: nothing is written on loss; on restoration one JSON object
//!   describes the whole outage.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use super::{append, DATE_FORMAT, TIME_FORMAT};
use crate::config::OutageFormat;
use crate::error::Result;
use crate::power::MainsPower;

const JSON_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One completed (or interrupted) outage in the jsonl layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageRecord {
    /// Loss time; `None` if the outage began before the monitor started
    pub start: Option<String>,
    /// Restoration time; `None` if the monitor stopped during the outage
    pub end: Option<String>,
    pub duration_secs: Option<i64>,
    pub restoration_charge_percent: Option<f64>,
}

/// Outage log writer
#[derive(Debug)]
pub struct OutageLog {
    path: PathBuf,
    format: OutageFormat,
    outage_start: Option<NaiveDateTime>,
}

impl OutageLog {
    pub fn new(path: impl Into<PathBuf>, format: OutageFormat) -> Self {
        Self {
            path: path.into(),
            format,
            outage_start: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a mains transition
    ///
    /// Must only be called when the state actually changed. `charge_percent`
    /// is the charge at the time of the transition; `None` when the gauge
    /// could not be read.
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be written.
    pub fn record(
        &mut self,
        state: MainsPower,
        charge_percent: Option<f64>,
        at: NaiveDateTime,
    ) -> Result<()> {
        match state {
            MainsPower::Absent => {
                warn!("Mains power lost at {}", at.format(TIME_FORMAT));
                self.outage_start = Some(at);
            }
            MainsPower::Present => {
                info!(
                    "Mains power restored at {} ({} left)",
                    at.format(TIME_FORMAT),
                    format_charge(charge_percent)
                );
            }
        }

        match self.format {
            OutageFormat::Tsv => append(&self.path, &tsv_line(state, charge_percent, at)),
            OutageFormat::Jsonl => match state {
                MainsPower::Absent => Ok(()),
                MainsPower::Present => {
                    let start = self.outage_start.take();
                    let record = OutageRecord {
                        start: start.map(|s| s.format(JSON_TIMESTAMP_FORMAT).to_string()),
                        end: Some(at.format(JSON_TIMESTAMP_FORMAT).to_string()),
                        duration_secs: start.map(|s| (at - s).num_seconds()),
                        restoration_charge_percent: charge_percent,
                    };
                    self.write_record(&record)
                }
            },
        }
    }

    /// Flush an outage still open at shutdown (jsonl only)
    ///
    /// The tsv layout already has the open half-line on disk.
    pub fn finish(&mut self) -> Result<()> {
        if self.format != OutageFormat::Jsonl {
            return Ok(());
        }

        match self.outage_start.take() {
            Some(start) => self.write_record(&OutageRecord {
                start: Some(start.format(JSON_TIMESTAMP_FORMAT).to_string()),
                end: None,
                duration_secs: None,
                restoration_charge_percent: None,
            }),
            None => Ok(()),
        }
    }

    fn write_record(&self, record: &OutageRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        append(&self.path, &line)
    }
}

fn tsv_line(state: MainsPower, charge_percent: Option<f64>, at: NaiveDateTime) -> String {
    match state {
        MainsPower::Absent => format!("{}\t{}\t", at.format(DATE_FORMAT), at.format(TIME_FORMAT)),
        MainsPower::Present => {
            format!("{}\t{} %\n", at.format(TIME_FORMAT), format_charge(charge_percent))
        }
    }
}

fn format_charge(charge_percent: Option<f64>) -> String {
    match charge_percent {
        Some(charge) => format!("{:.1}", charge),
        None => "n/a".to_string(),
    }
}
