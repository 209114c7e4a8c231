//! netmond - network reachability and bandwidth sampler daemon.
//!
//! Pings a fixed target on a steady cadence, aggregates each batch of probes
//! into one connectivity record, runs a periodic speed test on a separate
//! thread, and keeps the SQLite store within its retention window.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use netmon_core::fmt::{FmtStyle, format_bytes, format_duration};
use netmon_core::sampler::{PingProbe, Sampler, SamplerConfig, SpeedtestCli};
use netmon_core::store::{Store, StoreError};

/// Network reachability and bandwidth sampler daemon.
#[derive(Parser, Debug)]
#[command(name = "netmond", about = "Network reachability and bandwidth sampler", version)]
struct Args {
    /// Seconds between reachability probes.
    #[arg(short, long, env = "NETMON_FREQUENCY", default_value_t = netmon_core::DEFAULT_FREQUENCY_SECS)]
    frequency: u64,

    /// Probes aggregated into one connectivity record.
    #[arg(short, long, env = "NETMON_SAMPLE_SIZE", default_value_t = netmon_core::DEFAULT_SAMPLE_SIZE,
          value_parser = clap::value_parser!(u32).range(1..))]
    sample_size: u32,

    /// Positional form of --frequency.
    #[arg(value_name = "FREQUENCY", conflicts_with = "frequency")]
    frequency_pos: Option<u64>,

    /// Positional form of --sample-size.
    #[arg(value_name = "SAMPLE_SIZE", conflicts_with = "sample_size",
          value_parser = clap::value_parser!(u32).range(1..))]
    sample_size_pos: Option<u32>,

    /// SQLite database file.
    #[arg(long, env = "NETMON_DB", default_value = netmon_core::DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Address probed for reachability.
    #[arg(long, env = "NETMON_TARGET", default_value = netmon_core::sampler::DEFAULT_TARGET)]
    target: String,

    /// Rows older than this many days are deleted.
    #[arg(long, env = "NETMON_RETENTION_DAYS", default_value_t = netmon_core::DEFAULT_RETENTION_DAYS)]
    retention_days: u32,

    /// Seconds between bandwidth probes.
    #[arg(long, env = "NETMON_BANDWIDTH_INTERVAL",
          default_value_t = netmon_core::DEFAULT_BANDWIDTH_INTERVAL_SECS)]
    bandwidth_interval: u64,

    /// Seconds to wait before the first bandwidth probe.
    #[arg(long, env = "NETMON_BANDWIDTH_DELAY",
          default_value_t = netmon_core::DEFAULT_BANDWIDTH_STARTUP_DELAY_SECS)]
    bandwidth_delay: u64,

    /// Disable bandwidth probing.
    #[arg(long, env = "NETMON_NO_BANDWIDTH")]
    no_bandwidth: bool,

    /// Speed-test executable, invoked with `--json`.
    #[arg(long, env = "NETMON_BANDWIDTH_CMD", default_value = netmon_core::sampler::DEFAULT_PROGRAM)]
    bandwidth_cmd: String,

    /// Seconds one speed-test run may take before it is killed.
    #[arg(long, env = "NETMON_BANDWIDTH_TIMEOUT",
          default_value_t = netmon_core::sampler::BANDWIDTH_TIMEOUT.as_secs(),
          value_parser = clap::value_parser!(u64).range(1..))]
    bandwidth_timeout: u64,

    /// Reclaim free pages in the database once and exit.
    #[arg(long)]
    vacuum: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn effective_frequency(&self) -> u64 {
        self.frequency_pos.unwrap_or(self.frequency)
    }

    fn effective_sample_size(&self) -> u32 {
        self.sample_size_pos.unwrap_or(self.sample_size)
    }

    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            frequency: Duration::from_secs(self.effective_frequency()),
            sample_size: self.effective_sample_size(),
            retention_days: self.retention_days,
            bandwidth_interval: Duration::from_secs(self.bandwidth_interval),
            bandwidth_delay: Duration::from_secs(self.bandwidth_delay),
            ..SamplerConfig::default()
        }
    }

    fn ping_probe(&self) -> PingProbe {
        PingProbe::new(self.target.clone())
    }

    fn bandwidth_probe(&self) -> SpeedtestCli {
        SpeedtestCli::new(self.bandwidth_cmd.clone())
            .with_timeout(Duration::from_secs(self.bandwidth_timeout))
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["netmond", "netmon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Rebuilds the database file, reporting the size before and after.
fn run_vacuum(store: &Store) -> Result<(u64, u64), StoreError> {
    let before = store.storage_size_bytes()?;
    store.vacuum()?;
    let after = store.storage_size_bytes()?;
    Ok((before, after))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("netmond {} starting", netmon_core::VERSION);

    let store = match Store::open(&args.db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Store opened at {}", store.path().display());

    if args.vacuum {
        return match run_vacuum(&store) {
            Ok((before, after)) => {
                info!(
                    "Vacuum complete: {} -> {}",
                    format_bytes(before, FmtStyle::Detail),
                    format_bytes(after, FmtStyle::Detail)
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Vacuum failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = args.sampler_config();
    let mut probe = args.ping_probe();
    info!(
        "Config: target={}, frequency={}s, sample_size={}, record every ~{}, retention={}d",
        probe.target(),
        config.frequency.as_secs(),
        config.sample_size,
        format_duration(
            config.frequency.as_secs() * u64::from(config.sample_size),
            FmtStyle::Detail
        ),
        config.retention_days
    );

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let sampler = Sampler::new(store, config, running);

    let bandwidth = if args.no_bandwidth {
        info!("Bandwidth probing disabled");
        None
    } else {
        let sampler = sampler.clone();
        let mut probe = args.bandwidth_probe();
        info!(
            "Bandwidth probe: {} (timeout {}s)",
            probe.program(),
            args.bandwidth_timeout
        );
        let spawned = thread::Builder::new()
            .name("bandwidth".to_string())
            .spawn(move || sampler.run_bandwidth(&mut probe));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start bandwidth thread: {}", e);
                None
            }
        }
    };

    sampler.run_connectivity(&mut probe);

    if let Some(handle) = bandwidth
        && handle.join().is_err()
    {
        error!("Bandwidth thread panicked");
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmon_core::model::{NewConnectivitySample, Status};
    use netmon_core::timestamp::Timestamp;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["netmond"]).unwrap();
        assert_eq!(args.effective_frequency(), 1);
        assert_eq!(args.effective_sample_size(), 5);
        assert_eq!(args.target, "8.8.8.8");
        assert_eq!(args.db, PathBuf::from("./logs/network_monitor.db"));
        assert!(!args.no_bandwidth);

        let config = args.sampler_config();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.bandwidth_interval, Duration::from_secs(900));
        assert_eq!(config.bandwidth_delay, Duration::from_secs(60));
        assert_eq!(config.purge_interval, Duration::from_secs(3600));
    }

    #[test]
    fn positional_frequency_and_sample_size() {
        let args = Args::try_parse_from(["netmond", "2", "30"]).unwrap();
        assert_eq!(args.effective_frequency(), 2);
        assert_eq!(args.effective_sample_size(), 30);
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "netmond",
            "-f",
            "3",
            "-s",
            "60",
            "--retention-days",
            "10",
            "--no-bandwidth",
            "--target",
            "1.1.1.1",
            "-vv",
        ])
        .unwrap();
        let config = args.sampler_config();
        assert_eq!(config.frequency, Duration::from_secs(3));
        assert_eq!(config.sample_size, 60);
        assert_eq!(config.retention_days, 10);
        assert!(args.no_bandwidth);
        assert_eq!(args.target, "1.1.1.1");
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn rejects_zero_sample_size_and_conflicts() {
        assert!(Args::try_parse_from(["netmond", "-s", "0"]).is_err());
        assert!(Args::try_parse_from(["netmond", "1", "0"]).is_err());
        assert!(Args::try_parse_from(["netmond", "-f", "2", "3"]).is_err());
    }

    #[test]
    fn probes_follow_flags() {
        let args = Args::try_parse_from(["netmond"]).unwrap();
        assert_eq!(args.ping_probe().target(), "8.8.8.8");
        assert_eq!(args.bandwidth_probe().program(), "speedtest-cli");
        assert_eq!(args.bandwidth_timeout, 120);

        let args = Args::try_parse_from([
            "netmond",
            "--target",
            "192.0.2.1",
            "--bandwidth-cmd",
            "/opt/speedtest",
            "--bandwidth-timeout",
            "45",
        ])
        .unwrap();
        assert_eq!(args.ping_probe().target(), "192.0.2.1");
        assert_eq!(args.bandwidth_probe().program(), "/opt/speedtest");
        assert_eq!(args.bandwidth_timeout, 45);
        assert!(Args::try_parse_from(["netmond", "--bandwidth-timeout", "0"]).is_err());
    }

    #[test]
    fn store_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.db");
        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn vacuum_reports_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("net.db")).unwrap();
        for _ in 0..100 {
            store
                .insert_connectivity(&NewConnectivitySample {
                    timestamp: "2020-01-01 00:00:00".parse::<Timestamp>().unwrap(),
                    status: Status::Disconnected,
                    response_time: None,
                    success_count: 0,
                    total_count: 5,
                    failed_count: 5,
                })
                .unwrap();
        }
        store.purge_older_than(Timestamp::now()).unwrap();

        let (before, after) = run_vacuum(&store).unwrap();
        assert!(after <= before);
        assert_eq!(store.row_counts().unwrap().connectivity, 0);
    }
}
