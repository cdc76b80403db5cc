//! # UPS Monitor
//!
//! Battery-backup monitor for a Raspberry Pi UPS HAT.
//!
//! Samples the fuel gauge and the mains-detect pin every few seconds, logs
//! power outages to `pwr_fault.log` and battery samples to `ups.log`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ups_monitor::config::Config;
use ups_monitor::gauge::bus::RppalBus;
use ups_monitor::gauge::Gauge;
use ups_monitor::monitor::Monitor;
use ups_monitor::power::pin::RppalPin;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "ups-monitor", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the outage and telemetry logs
    #[arg(long)]
    log_dir: Option<String>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Consecutive pin reads required to accept a mains transition
    #[arg(long)]
    debounce_reads: Option<u32>,
}

impl Args {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(log_dir) = &self.log_dir {
            config.logging.log_dir = log_dir.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.sampling.interval_ms = interval_ms;
        }
        if let Some(debounce_reads) = self.debounce_reads {
            config.power.debounce_reads = debounce_reads;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Set up console logging, plus a daily rolling file if configured
///
/// The returned guard must be held until exit so buffered lines are flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let filter = env_filter(&directives);

    let (file_layer, guard) = match &config.logging.diagnostics_file {
        Some(file) => {
            let appender = tracing_appender::rolling::daily(Path::new(&config.logging.log_dir), file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Filter from `RUST_LOG`-style directives, INFO when none are given
///
/// A bare level such as `debug` replaces the default instead of being
/// overridden by it.
fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .parse_lossy(directives)
}

/// Stop signals, registered before the first tick
///
/// Registration happens up front so a Ctrl+C or SIGTERM arriving during
/// startup or the first tick still goes through the monitor's shutdown path
/// (and releases the pin) instead of killing the process.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves on Ctrl+C or SIGTERM
    #[cfg(unix)]
    async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received Ctrl+C"),
            _ = self.terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}

/// Main entry point for UPS Monitor
///
/// # Control Flow
///
/// 1. Load configuration (file, then command line overrides)
/// 2. Open the I2C gauge and the mains-detect pin
/// 3. Sample until Ctrl+C / SIGTERM, then release the pin and exit 0
///
/// A failed log write stops the loop and exits non-zero.
///
/// # Examples
///
/// ```bash
/// ups-monitor --config /etc/ups-monitor.toml --log-dir /var/log/ups
/// ```
///
/// Expected output:
/// ```text
/// INFO ups_monitor: UPS Monitor v0.1.0 starting...
/// INFO ups_monitor::gauge::bus: Opened I2C bus 1 (gauge at 0x10)
/// INFO ups_monitor::power::pin: Mains-detect input on BCM pin 17 (pull-down)
/// INFO ups_monitor::monitor: Battery: 4123 mV, 97.3 %
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;
    let _guard = init_tracing(&config);
    let signals = ShutdownSignals::install().context("Failed to install signal handlers")?;

    info!("UPS Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let bus = RppalBus::open(config.gauge.i2c_bus, config.gauge.address)?;
    let gauge = Gauge::new(
        Box::new(bus),
        Duration::from_millis(config.gauge.read_timeout_ms),
    );
    let pin = RppalPin::open(config.power.pin)?;

    let mut monitor = Monitor::new(&config, gauge, Box::new(pin))?;
    info!("Press Ctrl+C to exit");

    monitor.run(signals.recv()).await?;

    info!("UPS Monitor stopped");
    Ok(())
}
