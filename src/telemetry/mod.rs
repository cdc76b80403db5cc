//! # Telemetry Module
//!
//! Append-only text logs kept next to the monitor.
//!
//! This module handles:
//! - The outage log: when mains was lost and restored, and the charge left
//! - The sample log: periodic voltage/charge lines while on battery or draining
//!
//! Both files are opened, appended and closed on every write. Write errors
//! propagate to the caller. The monitor assumes it is the only writer.

pub mod outage;
pub mod samples;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Date column format (`03.05.2024`)
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Time column format (`14:01:05`)
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Append `text` to the file at `path`, creating it if needed
pub(crate) fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(())
}
