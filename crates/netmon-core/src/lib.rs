//! netmon-core — shared library for the netmon ecosystem.
//!
//! Provides:
//! - `model` — connectivity and bandwidth sample records
//! - `timestamp` — the sortable `YYYY-MM-DD HH:MM:SS` wire/storage format
//! - `store` — embedded SQLite persistence (WAL), range queries, retention purge
//! - `export` — delimited-text (CSV) rendering and parsing of connectivity rows
//! - `fmt` — shared formatting helpers (bytes, latency, rates)
//!
//! With `sampler` feature (default):
//! - `sampler` — probe abstractions, batch aggregation, connectivity/bandwidth loops
//!
//! With `api` feature:
//! - OpenAPI schema derives on the model types

pub mod export;
pub mod fmt;
pub mod model;
pub mod store;
pub mod timestamp;

#[cfg(feature = "sampler")]
pub mod sampler;

/// Crate version, shared by both binaries for startup banners and the API doc.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default seconds between reachability probes.
pub const DEFAULT_FREQUENCY_SECS: u64 = 1;

/// Default number of probes aggregated into one connectivity record.
pub const DEFAULT_SAMPLE_SIZE: u32 = 5;

/// Default retention window for both tables.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Default interval between bandwidth probes (15 minutes).
pub const DEFAULT_BANDWIDTH_INTERVAL_SECS: u64 = 15 * 60;

/// Default delay before the first bandwidth probe after startup.
pub const DEFAULT_BANDWIDTH_STARTUP_DELAY_SECS: u64 = 60;

/// How often the connectivity loop checks whether a retention purge is due.
pub const PURGE_CHECK_INTERVAL_SECS: u64 = 60 * 60;

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "./logs/network_monitor.db";
