//! # Sampling Loop
//!
//! One tick: sample the gauge, read the mains pin, log an outage transition
//! if there was one, log a telemetry line if the persistence policy allows,
//! then sleep. The loop ends only when the shutdown future resolves (during
//! the sleep) or a log write fails. The mains pin is released on both paths.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::config::{Config, InitialState};
use crate::error::Result;
use crate::gauge::{Gauge, GaugeSample};
use crate::power::pin::PowerPin;
use crate::power::{MainsPower, PowerStateTracker, PowerTransition};
use crate::telemetry::outage::OutageLog;
use crate::telemetry::samples::SampleLog;

/// Whether a sample should be written to the telemetry log
///
/// Samples are kept while on battery, or on mains once the charge is at or
/// below `threshold_percent`.
///
/// # Examples
///
/// ```
/// use ups_monitor::monitor::should_persist;
/// use ups_monitor::power::MainsPower;
///
/// assert!(!should_persist(MainsPower::Present, 96.0, 95.0));
/// assert!(should_persist(MainsPower::Present, 95.0, 95.0));
/// assert!(should_persist(MainsPower::Absent, 100.0, 95.0));
/// ```
#[must_use]
pub fn should_persist(state: MainsPower, charge_percent: f64, threshold_percent: f64) -> bool {
    !state.is_present() || charge_percent <= threshold_percent
}

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample: GaugeSample,
    pub power: PowerTransition,
    pub outage_logged: bool,
    pub telemetry_logged: bool,
}

/// UPS sampling loop
pub struct Monitor {
    gauge: Gauge,
    pin: Box<dyn PowerPin>,
    tracker: PowerStateTracker,
    outage_log: OutageLog,
    sample_log: SampleLog,
    interval: Duration,
    threshold_percent: f64,
    started: Instant,
    ticks: u64,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("gauge", &self.gauge)
            .field("tracker", &self.tracker)
            .field("outage_log", &self.outage_log)
            .field("sample_log", &self.sample_log)
            .field("interval", &self.interval)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Build a monitor from configuration and opened hardware
    ///
    /// Creates the log directory if needed. With `initial_state = "probe"` the
    /// pin is read once to seed the power state; no outage entry is written
    /// for that read.
    ///
    /// # Errors
    ///
    /// Returns error if the log directory cannot be created or the probe read
    /// fails.
    pub fn new(config: &Config, gauge: Gauge, mut pin: Box<dyn PowerPin>) -> Result<Self> {
        std::fs::create_dir_all(&config.logging.log_dir)?;

        let initial = match config.power.initial_state {
            InitialState::AssumePresent => MainsPower::Present,
            InitialState::Probe => MainsPower::from(pin.is_high()?),
        };
        info!("Initial power state: {} ({:?})", initial, config.power.initial_state);

        Ok(Self {
            gauge,
            pin,
            tracker: PowerStateTracker::new(initial, config.power.debounce_reads),
            outage_log: OutageLog::new(
                config.logging.outage_log_path(),
                config.logging.outage_format,
            ),
            sample_log: SampleLog::new(config.logging.telemetry_log_path()),
            interval: Duration::from_millis(config.sampling.interval_ms),
            threshold_percent: config.logging.telemetry_threshold_percent,
            started: Instant::now(),
            ticks: 0,
        })
    }

    /// Current power state as seen by the tracker
    pub fn power_state(&self) -> MainsPower {
        self.tracker.state()
    }

    /// Run one sampling tick stamped with `now`
    ///
    /// # Errors
    ///
    /// Returns error if the pin cannot be read or a log cannot be written.
    /// Gauge failures are not errors; they show up in the report.
    pub async fn tick(&mut self, now: NaiveDateTime) -> Result<TickReport> {
        self.ticks += 1;

        let sample = self.gauge.sample().await;
        match &sample {
            GaugeSample::Valid { reading, .. } => info!(
                "Battery: {} mV, {:.1} %",
                reading.voltage_mv, reading.charge_percent
            ),
            GaugeSample::Failed(reason) => warn!("Gauge read failed: {}", reason),
        }
        debug!("Tick {} after {:?}", self.ticks, self.started.elapsed());

        let power = self.tracker.update(self.pin.is_high()?);

        let outage_logged = power.changed;
        if power.changed {
            self.outage_log.record(power.state, sample.charge_percent(), now)?;
        }

        let telemetry_logged = match &sample {
            GaugeSample::Valid { raw, reading }
                if should_persist(power.state, reading.charge_percent, self.threshold_percent) =>
            {
                self.sample_log.append(now, reading, raw)?;
                true
            }
            _ => false,
        };

        Ok(TickReport {
            sample,
            power,
            outage_logged,
            telemetry_logged,
        })
    }

    /// Sample every interval until `shutdown` resolves
    ///
    /// `shutdown` is only observed while sleeping between ticks.
    ///
    /// # Errors
    ///
    /// Returns the first log write or pin error; the pin is released first.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Sampling every {:?}; outages -> {}, telemetry -> {}",
            self.interval,
            self.outage_log.path().display(),
            self.sample_log.path().display()
        );

        let result = loop {
            if let Err(e) = self.tick(Local::now().naive_local()).await {
                error!("Tick failed: {}", e);
                break Err(e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping sampling loop");
                    break Ok(());
                }
            }
        };

        let finished = self.outage_log.finish();
        self.pin.release();
        info!("Released mains-detect pin after {} ticks", self.ticks);

        result.and(finished)
    }
}
