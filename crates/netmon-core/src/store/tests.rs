use chrono::{NaiveDate, TimeDelta};
use tempfile::TempDir;

use super::*;
use crate::model::Status;

fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("net.db")).unwrap();
    (dir, store)
}

fn ts(day: u32, h: u32, m: u32, s: u32) -> Timestamp {
    Timestamp::from_naive(
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap(),
    )
}

fn conn_sample(timestamp: Timestamp, success: u32) -> NewConnectivitySample {
    let total = 5;
    NewConnectivitySample {
        timestamp,
        status: if success > 0 {
            Status::Connected
        } else {
            Status::Disconnected
        },
        response_time: (success > 0).then_some(12.5),
        success_count: success,
        total_count: total,
        failed_count: total - success,
    }
}

fn bw_sample(timestamp: Timestamp) -> NewBandwidthSample {
    NewBandwidthSample {
        timestamp,
        download_mbps: 94.27,
        upload_mbps: 11.03,
        ping_ms: Some(8.1),
        server_host: Some("speed.example.net:8080".to_string()),
        server_name: Some("Example".to_string()),
        server_country: None,
    }
}

#[test]
fn insert_assigns_increasing_ids() {
    let (_dir, store) = temp_store();
    let a = store.insert_connectivity(&conn_sample(ts(1, 0, 0, 0), 5)).unwrap();
    let b = store.insert_connectivity(&conn_sample(ts(1, 0, 0, 5), 0)).unwrap();
    assert!(b > a);

    let x = store.insert_bandwidth(&bw_sample(ts(1, 0, 0, 0))).unwrap();
    let y = store.insert_bandwidth(&bw_sample(ts(1, 0, 15, 0))).unwrap();
    assert!(y > x);
}

#[test]
fn empty_window_returns_empty_sequence() {
    let (_dir, store) = temp_store();
    store.insert_connectivity(&conn_sample(ts(1, 10, 0, 0), 5)).unwrap();

    let rows = store.query_connectivity(ts(2, 0, 0, 0), ts(2, 23, 59, 59)).unwrap();
    assert!(rows.is_empty());
    let rows = store.query_bandwidth(ts(2, 0, 0, 0), ts(2, 23, 59, 59)).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn range_is_inclusive_and_ordered() {
    let (_dir, store) = temp_store();
    // Inserted out of order to exercise the ORDER BY rather than rowid order.
    for (h, m) in [(10, 30), (10, 0), (11, 0), (9, 59), (10, 15)] {
        store.insert_connectivity(&conn_sample(ts(1, h, m, 0), 5)).unwrap();
    }

    let rows = store.query_connectivity(ts(1, 10, 0, 0), ts(1, 10, 30, 0)).unwrap();
    let stamps: Vec<String> = rows.iter().map(|r| r.timestamp.to_string()).collect();
    assert_eq!(
        stamps,
        vec![
            "2026-03-01 10:00:00",
            "2026-03-01 10:15:00",
            "2026-03-01 10:30:00",
        ]
    );
}

#[test]
fn single_instant_range() {
    let (_dir, store) = temp_store();
    store.insert_connectivity(&conn_sample(ts(1, 12, 0, 0), 5)).unwrap();
    store.insert_connectivity(&conn_sample(ts(1, 12, 0, 1), 5)).unwrap();

    let rows = store.query_connectivity(ts(1, 12, 0, 0), ts(1, 12, 0, 0)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, ts(1, 12, 0, 0));
}

#[test]
fn inverted_range_is_empty_not_error() {
    let (_dir, store) = temp_store();
    store.insert_connectivity(&conn_sample(ts(1, 12, 0, 0), 5)).unwrap();
    store.insert_bandwidth(&bw_sample(ts(1, 12, 0, 0))).unwrap();

    assert!(store.query_connectivity(ts(2, 0, 0, 0), ts(1, 0, 0, 0)).unwrap().is_empty());
    assert!(store.query_bandwidth(ts(2, 0, 0, 0), ts(1, 0, 0, 0)).unwrap().is_empty());
}

#[test]
fn stored_fields_survive() {
    let (_dir, store) = temp_store();
    let new = conn_sample(ts(1, 8, 0, 0), 0);
    let id = store.insert_connectivity(&new).unwrap();
    let row = store.latest_connectivity().unwrap().unwrap();
    assert_eq!(row, ConnectivitySample::from_new(id, new));
    assert_eq!(row.response_time, None);

    let new = bw_sample(ts(1, 8, 0, 0));
    let id = store.insert_bandwidth(&new).unwrap();
    let row = store.latest_bandwidth().unwrap().unwrap();
    assert_eq!(row, BandwidthSample::from_new(id, new));
}

#[test]
fn latest_and_earliest() {
    let (_dir, store) = temp_store();
    assert!(store.latest_connectivity().unwrap().is_none());
    assert!(store.earliest_connectivity().unwrap().is_none());
    assert!(store.latest_bandwidth().unwrap().is_none());
    assert!(store.earliest_bandwidth().unwrap().is_none());

    for d in [5, 2, 9] {
        store.insert_connectivity(&conn_sample(ts(d, 0, 0, 0), 5)).unwrap();
        store.insert_bandwidth(&bw_sample(ts(d, 0, 0, 0))).unwrap();
    }

    assert_eq!(store.earliest_connectivity().unwrap().unwrap().timestamp, ts(2, 0, 0, 0));
    assert_eq!(store.latest_connectivity().unwrap().unwrap().timestamp, ts(9, 0, 0, 0));
    assert_eq!(store.earliest_bandwidth().unwrap().unwrap().timestamp, ts(2, 0, 0, 0));
    assert_eq!(store.latest_bandwidth().unwrap().unwrap().timestamp, ts(9, 0, 0, 0));
}

#[test]
fn purge_removes_exactly_older_rows_and_is_idempotent() {
    let (_dir, store) = temp_store();
    let now = Timestamp::from_naive(
        NaiveDate::from_ymd_opt(2026, 4, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    );

    // One connectivity row per day for 40 days, one bandwidth row every other day.
    for day in 0..40 {
        let at = now.saturating_sub(TimeDelta::days(day));
        store.insert_connectivity(&conn_sample(at, 5)).unwrap();
        if day % 2 == 0 {
            store.insert_bandwidth(&bw_sample(at)).unwrap();
        }
    }

    let cutoff = now.days_before(30);
    let deleted = store.purge_older_than(cutoff).unwrap();

    // Days 31..=39 are strictly older than the cutoff; day 30 sits exactly on it.
    let expected_conn_deleted = 9;
    let expected_bw_deleted = [32, 34, 36, 38].len();
    assert_eq!(deleted, expected_conn_deleted + expected_bw_deleted);

    let counts = store.row_counts().unwrap();
    assert_eq!(counts.connectivity, 40 - expected_conn_deleted as u64);
    assert_eq!(counts.bandwidth, 20 - expected_bw_deleted as u64);

    let oldest = store.earliest_connectivity().unwrap().unwrap();
    assert_eq!(oldest.timestamp, cutoff);
    assert!(store.earliest_bandwidth().unwrap().unwrap().timestamp >= cutoff);

    assert_eq!(store.purge_older_than(cutoff).unwrap(), 0);
    assert_eq!(store.row_counts().unwrap(), counts);
}

#[test]
fn purge_on_empty_store() {
    let (_dir, store) = temp_store();
    assert_eq!(store.purge_older_than(Timestamp::now()).unwrap(), 0);
}

#[test]
fn available_hours_groups_newest_first() {
    let (_dir, store) = temp_store();
    for (d, h, m) in [(1, 9, 0), (1, 9, 30), (1, 10, 5), (2, 0, 0), (1, 9, 59)] {
        store.insert_connectivity(&conn_sample(ts(d, h, m, 0), 5)).unwrap();
    }

    let hours = store.available_hours().unwrap();
    assert_eq!(
        hours,
        vec![
            HourBucket { date: "2026-03-02".into(), hour: 0, count: 1 },
            HourBucket { date: "2026-03-01".into(), hour: 10, count: 1 },
            HourBucket { date: "2026-03-01".into(), hour: 9, count: 3 },
        ]
    );
}

#[test]
fn diagnostics() {
    let (_dir, store) = temp_store();
    assert_eq!(
        store.row_counts().unwrap(),
        RowCounts { connectivity: 0, bandwidth: 0 }
    );
    store.insert_connectivity(&conn_sample(ts(1, 0, 0, 0), 5)).unwrap();
    store.insert_bandwidth(&bw_sample(ts(1, 0, 0, 0))).unwrap();
    store.insert_bandwidth(&bw_sample(ts(1, 0, 15, 0))).unwrap();

    assert_eq!(
        store.row_counts().unwrap(),
        RowCounts { connectivity: 1, bandwidth: 2 }
    );
    assert!(store.storage_size_bytes().unwrap() > 0);
}

#[test]
fn range_queries_use_timestamp_index() {
    let (_dir, store) = temp_store();
    let conn = store.reader();
    for (table, index) in [
        ("connectivity_samples", "idx_connectivity_timestamp"),
        ("bandwidth_samples", "idx_bandwidth_timestamp"),
    ] {
        let sql = format!(
            "EXPLAIN QUERY PLAN SELECT * FROM {table} \
             WHERE timestamp >= ?1 AND timestamp <= ?2 ORDER BY timestamp ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql).unwrap();
        let details: Vec<String> = stmt
            .query_map(["a", "b"], |row| row.get::<_, String>(3))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(
            details.iter().any(|d| d.contains(index)),
            "{table} plan does not use {index}: {details:?}"
        );
    }
}

#[test]
fn wal_mode_is_enabled() {
    let (_dir, store) = temp_store();
    let mode: String = store
        .writer()
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn reader_pool_sees_committed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/dir/net.db");
    let store = Store::open_with(StoreConfig::new(&path).with_read_connections(3)).unwrap();
    assert!(path.exists());

    for s in 0..6 {
        store.insert_connectivity(&conn_sample(ts(1, 0, 0, s), 5)).unwrap();
        // Round-robin: consecutive reads land on different connections.
        let rows = store.query_connectivity(ts(1, 0, 0, 0), ts(1, 0, 0, 59)).unwrap();
        assert_eq!(rows.len(), s as usize + 1);
    }
}

#[test]
fn concurrent_writer_and_readers() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(
        Store::open_with(StoreConfig::new(dir.path().join("net.db")).with_read_connections(2))
            .unwrap(),
    );

    let writer = {
        let store = store.clone();
        std::thread::spawn(move || {
            for s in 0..50 {
                store
                    .insert_connectivity(&conn_sample(ts(1, 0, s / 60, s % 60), 5))
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..50 {
                    let n = store
                        .query_connectivity(ts(1, 0, 0, 0), ts(1, 23, 0, 0))
                        .unwrap()
                        .len();
                    // Committed rows never disappear from a reader's view.
                    assert!(n >= last);
                    last = n;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.row_counts().unwrap().connectivity, 50);
}

#[test]
fn vacuum_keeps_rows() {
    let (_dir, store) = temp_store();
    for s in 0..10 {
        store.insert_connectivity(&conn_sample(ts(1, 0, 0, s), 5)).unwrap();
    }
    store.purge_older_than(ts(1, 0, 0, 5)).unwrap();
    store.vacuum().unwrap();
    assert_eq!(store.row_counts().unwrap().connectivity, 5);
}

