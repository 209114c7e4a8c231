//! Statements against `bandwidth_samples`.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{BandwidthSample, NewBandwidthSample};
use crate::timestamp::Timestamp;

const COLUMNS: &str = "id, timestamp, download_mbps, upload_mbps, ping_ms, \
                       server_host, server_name, server_country";

fn from_row(row: &Row<'_>) -> rusqlite::Result<BandwidthSample> {
    Ok(BandwidthSample {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        download_mbps: row.get(2)?,
        upload_mbps: row.get(3)?,
        ping_ms: row.get(4)?,
        server_host: row.get(5)?,
        server_name: row.get(6)?,
        server_country: row.get(7)?,
    })
}

pub(super) fn insert(conn: &Connection, sample: &NewBandwidthSample) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO bandwidth_samples
            (timestamp, download_mbps, upload_mbps, ping_ms,
             server_host, server_name, server_country)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            sample.timestamp,
            sample.download_mbps,
            sample.upload_mbps,
            sample.ping_ms,
            sample.server_host,
            sample.server_name,
            sample.server_country,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn range(
    conn: &Connection,
    start: Timestamp,
    end: Timestamp,
) -> rusqlite::Result<Vec<BandwidthSample>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM bandwidth_samples
         WHERE timestamp >= ?1 AND timestamp <= ?2
         ORDER BY timestamp ASC, id ASC"
    ))?;
    let rows = stmt.query_map(params![start, end], from_row)?;
    rows.collect()
}

pub(super) fn latest(conn: &Connection) -> rusqlite::Result<Option<BandwidthSample>> {
    conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM bandwidth_samples
         ORDER BY timestamp DESC, id DESC LIMIT 1"
    ))?
    .query_row([], from_row)
    .optional()
}

pub(super) fn earliest(conn: &Connection) -> rusqlite::Result<Option<BandwidthSample>> {
    conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM bandwidth_samples
         ORDER BY timestamp ASC, id ASC LIMIT 1"
    ))?
    .query_row([], from_row)
    .optional()
}

pub(super) fn delete_before(conn: &Connection, cutoff: Timestamp) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM bandwidth_samples WHERE timestamp < ?1",
        params![cutoff],
    )
}

pub(super) fn count(conn: &Connection) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM bandwidth_samples", [], |row| {
        row.get(0)
    })?;
    Ok(n.max(0) as u64)
}
