//! Embedded SQLite persistence for connectivity and bandwidth samples.
//!
//! ## Concurrency
//!
//! The database runs in WAL journal mode with `synchronous = NORMAL`: one
//! writer (the sampler) never blocks readers (the gateway), and a power loss
//! can drop the last few committed samples but never corrupts the file.
//!
//! A [`Store`] owns one writer connection plus an optional pool of reader
//! connections handed out round-robin. Each connection sits behind its own
//! mutex, so a slow reader only ever stalls requests queued on the same
//! connection. With a pool size of zero every query goes through the writer,
//! which is what the sampler process uses.
//!
//! ## Contract
//!
//! Only INSERT and age-based DELETE are exposed. Range queries are inclusive
//! on both ends and ordered by timestamp; an inverted range yields an empty
//! result rather than an error. Retention purge never runs `VACUUM`; page
//! reclamation is the separate [`Store::vacuum`] maintenance call.

mod bandwidth;
mod connectivity;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::model::{
    BandwidthSample, ConnectivitySample, HourBucket, NewBandwidthSample, NewConnectivitySample,
    RowCounts,
};
use crate::timestamp::Timestamp;

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Database file could not be opened or initialized.
    Open { path: PathBuf, message: String },
    /// Statement execution failed.
    Sqlite(rusqlite::Error),
    /// Filesystem error around the database file.
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Open { path, message } => {
                write!(f, "cannot open database {}: {}", path.display(), message)
            }
            StoreError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Open { .. } => None,
            StoreError::Sqlite(e) => Some(e),
            StoreError::Io(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Configuration for opening a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file. Parent directories are created.
    pub path: PathBuf,
    /// Number of dedicated reader connections. Zero routes reads through the writer.
    pub read_connections: usize,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_connections: 0,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_read_connections(mut self, n: usize) -> Self {
        self.read_connections = n;
        self
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS connectivity_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL,
    response_time REAL,
    success_count INTEGER NOT NULL,
    total_count INTEGER NOT NULL,
    failed_count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_connectivity_timestamp
    ON connectivity_samples(timestamp);

CREATE TABLE IF NOT EXISTS bandwidth_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    download_mbps REAL NOT NULL,
    upload_mbps REAL NOT NULL,
    ping_ms REAL,
    server_host TEXT,
    server_name TEXT,
    server_country TEXT
);
CREATE INDEX IF NOT EXISTS idx_bandwidth_timestamp
    ON bandwidth_samples(timestamp);
";

/// Handle to the on-disk sample database.
pub struct Store {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    read_cursor: AtomicUsize,
}

impl Store {
    /// Opens (creating if needed) the database at `path` with no reader pool.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with(StoreConfig::new(path))
    }

    /// Opens the database with an explicit configuration.
    pub fn open_with(config: StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: config.path.clone(),
                message: e.to_string(),
            })?;
        }

        let writer = open_connection(&config, false)?;
        writer
            .execute_batch(SCHEMA)
            .map_err(|e| open_error(&config.path, e))?;

        let mut readers = Vec::with_capacity(config.read_connections);
        for _ in 0..config.read_connections {
            readers.push(Mutex::new(open_connection(&config, true)?));
        }

        debug!(
            path = %config.path.display(),
            readers = readers.len(),
            "store opened"
        );

        Ok(Self {
            path: config.path,
            writer: Mutex::new(writer),
            readers,
            read_cursor: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> MutexGuard<'_, Connection> {
        // Every mutation is one statement or one transaction, so a poisoned
        // lock still guards a consistent connection.
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reader(&self) -> MutexGuard<'_, Connection> {
        if self.readers.is_empty() {
            return self.writer();
        }
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        self.readers[index]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Appends one connectivity row and returns its id.
    pub fn insert_connectivity(&self, sample: &NewConnectivitySample) -> StoreResult<i64> {
        Ok(connectivity::insert(&self.writer(), sample)?)
    }

    /// Rows with `start <= timestamp <= end`, ascending.
    pub fn query_connectivity(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<ConnectivitySample>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(connectivity::range(&self.reader(), start, end)?)
    }

    pub fn latest_connectivity(&self) -> StoreResult<Option<ConnectivitySample>> {
        Ok(connectivity::latest(&self.reader())?)
    }

    pub fn earliest_connectivity(&self) -> StoreResult<Option<ConnectivitySample>> {
        Ok(connectivity::earliest(&self.reader())?)
    }

    /// Per-hour row counts, newest hour first.
    pub fn available_hours(&self) -> StoreResult<Vec<HourBucket>> {
        Ok(connectivity::hours(&self.reader())?)
    }

    // ------------------------------------------------------------------
    // Bandwidth
    // ------------------------------------------------------------------

    /// Appends one bandwidth row and returns its id.
    pub fn insert_bandwidth(&self, sample: &NewBandwidthSample) -> StoreResult<i64> {
        Ok(bandwidth::insert(&self.writer(), sample)?)
    }

    /// Rows with `start <= timestamp <= end`, ascending.
    pub fn query_bandwidth(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<BandwidthSample>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(bandwidth::range(&self.reader(), start, end)?)
    }

    pub fn latest_bandwidth(&self) -> StoreResult<Option<BandwidthSample>> {
        Ok(bandwidth::latest(&self.reader())?)
    }

    pub fn earliest_bandwidth(&self) -> StoreResult<Option<BandwidthSample>> {
        Ok(bandwidth::earliest(&self.reader())?)
    }

    // ------------------------------------------------------------------
    // Lifecycle and diagnostics
    // ------------------------------------------------------------------

    /// Deletes every row of both tables with `timestamp < cutoff`.
    ///
    /// Returns the total number of rows removed. Runs in one transaction and
    /// never rewrites the file; freed pages are reused by later inserts.
    pub fn purge_older_than(&self, cutoff: Timestamp) -> StoreResult<usize> {
        let mut conn = self.writer();
        let tx = conn.transaction()?;
        let deleted = connectivity::delete_before(&tx, cutoff)?
            + bandwidth::delete_before(&tx, cutoff)?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn row_counts(&self) -> StoreResult<RowCounts> {
        let conn = self.reader();
        Ok(RowCounts {
            connectivity: connectivity::count(&conn)?,
            bandwidth: bandwidth::count(&conn)?,
        })
    }

    /// Size of the database in bytes (allocated pages, excluding the WAL).
    pub fn storage_size_bytes(&self) -> StoreResult<u64> {
        let conn = self.reader();
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    /// Checkpoints the WAL and rebuilds the file to return free pages to the OS.
    ///
    /// Expensive: rewrites the whole database. Meant for manual maintenance
    /// windows, never for the hourly purge path.
    pub fn vacuum(&self) -> StoreResult<()> {
        let conn = self.writer();
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE); VACUUM;")?;
        Ok(())
    }
}

fn open_error(path: &Path, e: rusqlite::Error) -> StoreError {
    StoreError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn open_connection(config: &StoreConfig, read_only: bool) -> StoreResult<Connection> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn =
        Connection::open_with_flags(&config.path, flags).map_err(|e| open_error(&config.path, e))?;
    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| open_error(&config.path, e))?;

    if !read_only {
        // journal_mode returns the resulting mode as a row.
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| open_error(&config.path, e))?;
        if !mode.eq_ignore_ascii_case("wal") {
            debug!(mode, "WAL journal mode not available, continuing");
        }
    }
    conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA cache_size = -32000;")
        .map_err(|e| open_error(&config.path, e))?;
    Ok(conn)
}

#[cfg(test)]
mod tests;
