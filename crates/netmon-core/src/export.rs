//! Delimited-text export of connectivity rows.
//!
//! Format: a header line followed by one line per row, fields separated by
//! `", "`, lines joined by `\n` with no trailing newline. A missing latency
//! is written as `null`; present latencies carry three decimals.
//!
//! ```text
//! timestamp, status, response_time, success_count, total_count, failed_count
//! 2026-02-07 17:00:00, CONNECTED, 12.345, 5, 5, 0
//! 2026-02-07 17:00:05, DISCONNECTED, null, 0, 5, 5
//! ```

use std::fmt::{self, Write as _};

use crate::model::{ConnectivitySample, NewConnectivitySample, Status};
use crate::timestamp::Timestamp;

pub const CSV_HEADER: &str =
    "timestamp, status, response_time, success_count, total_count, failed_count";

const SEPARATOR: &str = ", ";
const NULL: &str = "null";

/// Renders rows in the export format. An empty slice yields the header only.
pub fn render_csv(rows: &[ConnectivitySample]) -> String {
    // ~60 bytes per line
    let mut out = String::with_capacity(CSV_HEADER.len() + rows.len() * 64);
    out.push_str(CSV_HEADER);
    for row in rows {
        out.push('\n');
        let _ = write!(out, "{}{SEPARATOR}{}{SEPARATOR}", row.timestamp, row.status);
        match row.response_time {
            Some(rt) => {
                let _ = write!(out, "{:.3}", rt);
            }
            None => out.push_str(NULL),
        }
        let _ = write!(
            out,
            "{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            row.success_count, row.total_count, row.failed_count
        );
    }
    out
}

/// Error from [`parse_csv`], with the 1-based line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for CsvParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvParseError {}

/// Parses text produced by [`render_csv`] back into row values.
///
/// Row ids are not part of the format, so rows come back as
/// [`NewConnectivitySample`].
pub fn parse_csv(text: &str) -> Result<Vec<NewConnectivitySample>, CsvParseError> {
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim() == CSV_HEADER => {}
        Some(_) => {
            return Err(CsvParseError {
                line: 1,
                message: "unexpected header".to_string(),
            });
        }
        None => return Ok(Vec::new()),
    }

    let mut rows = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let err = |message: String| CsvParseError {
            line: idx + 1,
            message,
        };
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [ts, status, rt, success, total, failed] = fields[..] else {
            return Err(err(format!("expected 6 fields, got {}", fields.len())));
        };

        let timestamp: Timestamp = ts.parse().map_err(|e| err(format!("{}", e)))?;
        let status: Status = status.parse().map_err(err)?;
        let response_time = match rt {
            NULL => None,
            v => Some(
                v.parse::<f64>()
                    .map_err(|e| err(format!("response_time: {}", e)))?,
            ),
        };
        let count = |name: &str, v: &str| {
            v.parse::<u32>()
                .map_err(|e| err(format!("{}: {}", name, e)))
        };
        rows.push(NewConnectivitySample {
            timestamp,
            status,
            response_time,
            success_count: count("success_count", success)?,
            total_count: count("total_count", total)?,
            failed_count: count("failed_count", failed)?,
        });
    }
    Ok(rows)
}
