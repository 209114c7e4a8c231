//! Record shapes persisted by the store and served by the gateway.
//!
//! Two fixed tables exist: connectivity samples (one per finalized probe batch)
//! and bandwidth samples (one per bandwidth probe). Rows are immutable once
//! written; the `New*` variants are what the sampler hands to the store before
//! an id has been assigned.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Reachability verdict for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Connected,
    Disconnected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Connected => "CONNECTED",
            Status::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CONNECTED" => Ok(Status::Connected),
            "DISCONNECTED" => Ok(Status::Disconnected),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Aggregated result of one probe batch, before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConnectivitySample {
    pub timestamp: Timestamp,
    pub status: Status,
    /// Mean latency of successful probes (ms). `None` iff `status` is DISCONNECTED.
    pub response_time: Option<f64>,
    pub success_count: u32,
    pub total_count: u32,
    pub failed_count: u32,
}

impl NewConnectivitySample {
    /// Successful probes in percent (0..=100).
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        f64::from(self.success_count) * 100.0 / f64::from(self.total_count)
    }
}

/// A stored connectivity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ConnectivitySample {
    pub id: i64,
    #[cfg_attr(feature = "api", schema(value_type = String, example = "2026-02-07 17:00:00"))]
    pub timestamp: Timestamp,
    pub status: Status,
    pub response_time: Option<f64>,
    pub success_count: u32,
    pub total_count: u32,
    pub failed_count: u32,
}

impl ConnectivitySample {
    pub fn from_new(id: i64, sample: NewConnectivitySample) -> Self {
        Self {
            id,
            timestamp: sample.timestamp,
            status: sample.status,
            response_time: sample.response_time,
            success_count: sample.success_count,
            total_count: sample.total_count,
            failed_count: sample.failed_count,
        }
    }
}

/// Result of one bandwidth probe, before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBandwidthSample {
    pub timestamp: Timestamp,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: Option<f64>,
    pub server_host: Option<String>,
    pub server_name: Option<String>,
    pub server_country: Option<String>,
}

/// A stored bandwidth row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct BandwidthSample {
    pub id: i64,
    #[cfg_attr(feature = "api", schema(value_type = String, example = "2026-02-07 17:00:00"))]
    pub timestamp: Timestamp,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: Option<f64>,
    pub server_host: Option<String>,
    pub server_name: Option<String>,
    pub server_country: Option<String>,
}

impl BandwidthSample {
    pub fn from_new(id: i64, sample: NewBandwidthSample) -> Self {
        Self {
            id,
            timestamp: sample.timestamp,
            download_mbps: sample.download_mbps,
            upload_mbps: sample.upload_mbps,
            ping_ms: sample.ping_ms,
            server_host: sample.server_host,
            server_name: sample.server_name,
            server_country: sample.server_country,
        }
    }
}

/// Number of connectivity rows recorded in one clock hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct HourBucket {
    /// `YYYY-MM-DD`
    pub date: String,
    /// 0..=23
    pub hour: u32,
    pub count: u64,
}

/// Diagnostics shown in the dashboard footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub connectivity: u64,
    pub bandwidth: u64,
}
