//! Statements against `connectivity_samples`.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{ConnectivitySample, HourBucket, NewConnectivitySample};
use crate::timestamp::Timestamp;

const COLUMNS: &str =
    "id, timestamp, status, response_time, success_count, total_count, failed_count";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ConnectivitySample> {
    Ok(ConnectivitySample {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        status: row.get(2)?,
        response_time: row.get(3)?,
        success_count: row.get(4)?,
        total_count: row.get(5)?,
        failed_count: row.get(6)?,
    })
}

pub(super) fn insert(conn: &Connection, sample: &NewConnectivitySample) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO connectivity_samples
            (timestamp, status, response_time, success_count, total_count, failed_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sample.timestamp,
            sample.status,
            sample.response_time,
            sample.success_count,
            sample.total_count,
            sample.failed_count,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn range(
    conn: &Connection,
    start: Timestamp,
    end: Timestamp,
) -> rusqlite::Result<Vec<ConnectivitySample>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM connectivity_samples
         WHERE timestamp >= ?1 AND timestamp <= ?2
         ORDER BY timestamp ASC, id ASC"
    ))?;
    let rows = stmt.query_map(params![start, end], from_row)?;
    rows.collect()
}

pub(super) fn latest(conn: &Connection) -> rusqlite::Result<Option<ConnectivitySample>> {
    conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM connectivity_samples
         ORDER BY timestamp DESC, id DESC LIMIT 1"
    ))?
    .query_row([], from_row)
    .optional()
}

pub(super) fn earliest(conn: &Connection) -> rusqlite::Result<Option<ConnectivitySample>> {
    conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM connectivity_samples
         ORDER BY timestamp ASC, id ASC LIMIT 1"
    ))?
    .query_row([], from_row)
    .optional()
}

pub(super) fn hours(conn: &Connection) -> rusqlite::Result<Vec<HourBucket>> {
    let mut stmt = conn.prepare_cached(
        "SELECT substr(timestamp, 1, 10) AS day,
                CAST(substr(timestamp, 12, 2) AS INTEGER) AS hour,
                COUNT(*)
         FROM connectivity_samples
         GROUP BY day, hour
         ORDER BY day DESC, hour DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let count: i64 = row.get(2)?;
        Ok(HourBucket {
            date: row.get(0)?,
            hour: row.get(1)?,
            count: count.max(0) as u64,
        })
    })?;
    rows.collect()
}

pub(super) fn delete_before(conn: &Connection, cutoff: Timestamp) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM connectivity_samples WHERE timestamp < ?1",
        params![cutoff],
    )
}

pub(super) fn count(conn: &Connection) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM connectivity_samples", [], |row| {
        row.get(0)
    })?;
    Ok(n.max(0) as u64)
}
