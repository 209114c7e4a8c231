//! Probe scheduling: the connectivity loop, the bandwidth loop and the
//! hourly retention purge.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────── Sampler ─────────────────────────────┐
//! │                                                                   │
//! │  run_connectivity (main thread)       run_bandwidth (own thread)  │
//! │  ┌─────────────────────────────┐      ┌────────────────────────┐  │
//! │  │ probe ─► Batch ─► insert    │      │ delay ─► measure ─►    │  │
//! │  │   ▲                  │      │      │   insert ─► sleep ─┐   │  │
//! │  │   └── sleep ◄─ purge?◄┘     │      │      ▲             │   │  │
//! │  └──────────────┬──────────────┘      └──────┼─────────────┼───┘  │
//! │                 │                            └─────────────┘      │
//! │          ReachabilityProbe              BandwidthProbe            │
//! └─────────────────┼────────────────────────────┼────────────────────┘
//!                   ▼                            ▼
//!              PingProbe                    SpeedtestCli
//! ```
//!
//! Both loops share one [`Store`] and one running flag. Clearing the flag
//! stops each loop after its current probe; a partially filled batch is
//! discarded. Probe and write failures are logged and never end a loop.

mod bandwidth;
mod batch;
mod ping;
mod process;
mod traits;

pub use bandwidth::{BANDWIDTH_TIMEOUT, DEFAULT_PROGRAM, SpeedtestCli, parse_report};
pub use batch::Batch;
pub use ping::{DEFAULT_TARGET, PING_TIMEOUT, PingProbe, parse_rtt_avg};
pub use traits::{BandwidthProbe, ReachabilityProbe};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::fmt::{FmtStyle, format_duration, format_mbps, format_opt_ms};
use crate::model::{NewBandwidthSample, NewConnectivitySample};
use crate::store::Store;
use crate::timestamp::Timestamp;

/// Why a single probe produced no measurement.
#[derive(Debug)]
pub enum ProbeError {
    /// The probe program could not be started or waited on.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// The probe ran past its time bound and was killed.
    Timeout { program: String, after: Duration },
    /// The probe exited unsuccessfully.
    Failed { program: String, code: Option<i32> },
    /// The probe's output could not be understood.
    Parse(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Spawn { program, source } => {
                write!(f, "failed to run {}: {}", program, source)
            }
            ProbeError::Timeout { program, after } => {
                write!(f, "{} timed out after {:?}", program, after)
            }
            ProbeError::Failed { program, code } => match code {
                Some(code) => write!(f, "{} exited with status {}", program, code),
                None => write!(f, "{} terminated by signal", program),
            },
            ProbeError::Parse(msg) => write!(f, "unparseable probe output: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One bandwidth probe result, before it is timestamped and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthMeasurement {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: Option<f64>,
    pub server_host: Option<String>,
    pub server_name: Option<String>,
    pub server_country: Option<String>,
}

impl BandwidthMeasurement {
    pub fn into_sample(self, timestamp: Timestamp) -> NewBandwidthSample {
        NewBandwidthSample {
            timestamp,
            download_mbps: self.download_mbps,
            upload_mbps: self.upload_mbps,
            ping_ms: self.ping_ms,
            server_host: self.server_host,
            server_name: self.server_name,
            server_country: self.server_country,
        }
    }
}

/// Cadences and limits of both loops.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Start-to-start spacing of reachability probes.
    pub frequency: Duration,
    /// Probes aggregated into one connectivity record.
    pub sample_size: u32,
    /// Rows older than this many days are purged.
    pub retention_days: u32,
    /// How often the connectivity loop runs a purge.
    pub purge_interval: Duration,
    /// Start-to-start spacing of bandwidth probes.
    pub bandwidth_interval: Duration,
    /// Wait before the first bandwidth probe.
    pub bandwidth_delay: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_secs(crate::DEFAULT_FREQUENCY_SECS),
            sample_size: crate::DEFAULT_SAMPLE_SIZE,
            retention_days: crate::DEFAULT_RETENTION_DAYS,
            purge_interval: Duration::from_secs(crate::PURGE_CHECK_INTERVAL_SECS),
            bandwidth_interval: Duration::from_secs(crate::DEFAULT_BANDWIDTH_INTERVAL_SECS),
            bandwidth_delay: Duration::from_secs(crate::DEFAULT_BANDWIDTH_STARTUP_DELAY_SECS),
        }
    }
}

/// Sampling context shared by the connectivity and bandwidth loops.
///
/// Cheap to clone; clones share the store and the running flag.
#[derive(Clone)]
pub struct Sampler {
    store: Arc<Store>,
    config: SamplerConfig,
    running: Arc<AtomicBool>,
}

impl Sampler {
    pub fn new(store: Arc<Store>, config: SamplerConfig, running: Arc<AtomicBool>) -> Self {
        Self {
            store,
            config,
            running,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in short slices, returning early once stopped.
    fn sleep(&self, duration: Duration) {
        let slice = Duration::from_millis(100);
        let mut remaining = duration;
        while remaining > Duration::ZERO && self.is_running() {
            let step = remaining.min(slice);
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
    }

    /// Probes until stopped, writing one record per full batch.
    ///
    /// Purges expired rows on entry and then whenever `purge_interval` has
    /// elapsed since the previous purge. Returns the number of records written.
    pub fn run_connectivity<P: ReachabilityProbe + ?Sized>(&self, probe: &mut P) -> u64 {
        info!(
            frequency = ?self.config.frequency,
            sample_size = self.config.sample_size,
            retention_days = self.config.retention_days,
            "connectivity loop started"
        );

        self.purge_expired();
        let mut last_purge = Instant::now();
        let mut batch = Batch::new(self.config.sample_size);
        let mut written: u64 = 0;

        while self.is_running() {
            let started = Instant::now();

            match probe.probe() {
                Ok(ms) => {
                    trace!(latency_ms = ms, "probe ok");
                    batch.push(Some(ms));
                }
                Err(e) => {
                    debug!(error = %e, "probe failed");
                    batch.push(None);
                }
            }

            if batch.is_full() {
                let sample = batch.finalize(Timestamp::now());
                if self.record_connectivity(&sample) {
                    written += 1;
                }
            }

            if last_purge.elapsed() >= self.config.purge_interval {
                self.purge_expired();
                last_purge = Instant::now();
            }

            self.sleep(self.config.frequency.saturating_sub(started.elapsed()));
        }

        if !batch.is_empty() {
            debug!(probes = batch.len(), "discarding partial batch");
        }
        info!(records = written, "connectivity loop stopped");
        written
    }

    /// Inserts one finalized batch. Failures are logged; the record is lost.
    pub fn record_connectivity(&self, sample: &NewConnectivitySample) -> bool {
        match self.store.insert_connectivity(sample) {
            Ok(id) => {
                info!(
                    id,
                    success_pct = sample.success_rate(),
                    "{} {} {} ({}/{})",
                    sample.timestamp,
                    sample.status,
                    format_opt_ms(sample.response_time, FmtStyle::Detail),
                    sample.success_count,
                    sample.total_count
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to store connectivity record");
                false
            }
        }
    }

    /// Measures bandwidth until stopped, after the configured startup delay.
    ///
    /// A failed measurement skips that cycle. Returns the number of records written.
    pub fn run_bandwidth<P: BandwidthProbe + ?Sized>(&self, probe: &mut P) -> u64 {
        info!(
            "bandwidth loop started: first probe in {}, then every {}",
            format_duration(self.config.bandwidth_delay.as_secs(), FmtStyle::Compact),
            format_duration(self.config.bandwidth_interval.as_secs(), FmtStyle::Compact)
        );
        self.sleep(self.config.bandwidth_delay);

        let mut written: u64 = 0;
        while self.is_running() {
            let started = Instant::now();
            match probe.measure() {
                Ok(measurement) => {
                    let sample = measurement.into_sample(Timestamp::now());
                    match self.store.insert_bandwidth(&sample) {
                        Ok(id) => {
                            written += 1;
                            info!(
                                id,
                                duration_ms = started.elapsed().as_millis() as u64,
                                "bandwidth: down {} up {} ping {}",
                                format_mbps(sample.download_mbps),
                                format_mbps(sample.upload_mbps),
                                format_opt_ms(sample.ping_ms, FmtStyle::Detail)
                            );
                        }
                        Err(e) => error!(error = %e, "failed to store bandwidth record"),
                    }
                }
                Err(e) => warn!(error = %e, "bandwidth probe failed, skipping cycle"),
            }
            self.sleep(self.config.bandwidth_interval.saturating_sub(started.elapsed()));
        }

        info!(records = written, "bandwidth loop stopped");
        written
    }

    /// Deletes rows older than the retention window. `None` if the purge failed.
    pub fn purge_expired(&self) -> Option<usize> {
        let cutoff = Timestamp::now().days_before(self.config.retention_days);
        let started = Instant::now();
        match self.store.purge_older_than(cutoff) {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(
                        deleted,
                        %cutoff,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "retention purge"
                    );
                } else {
                    debug!(%cutoff, "retention purge: nothing expired");
                }
                Some(deleted)
            }
            Err(e) => {
                error!(error = %e, "retention purge failed");
                None
            }
        }
    }
}
