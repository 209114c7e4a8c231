//! Throughput measurement through an external speed-test tool.
//!
//! The tool is invoked as `<program> --json` and must print one JSON object:
//!
//! ```json
//! {"download": 94270000.0, "upload": 11030000.0, "ping": 8.1,
//!  "server": {"host": "speed.example.net:8080", "name": "Example", "country": "NL"}}
//! ```
//!
//! Rates are bits per second; they are stored as Mbit/s with two decimals.

use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use super::process::run_with_timeout;
use super::{BandwidthMeasurement, BandwidthProbe, ProbeError};
use crate::fmt::round2;

pub const DEFAULT_PROGRAM: &str = "speedtest-cli";

/// Upper bound on one speed-test run.
pub const BANDWIDTH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct Report {
    download: f64,
    upload: f64,
    #[serde(default)]
    ping: Option<f64>,
    #[serde(default)]
    server: Option<Server>,
}

#[derive(Debug, Default, Deserialize)]
struct Server {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Runs the speed-test tool once per [`BandwidthProbe::measure`] call.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    program: String,
    timeout: Duration,
}

impl SpeedtestCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: BANDWIDTH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl BandwidthProbe for SpeedtestCli {
    fn measure(&mut self) -> Result<BandwidthMeasurement, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--json");
        let out = run_with_timeout(&mut cmd, self.timeout)?;
        if !out.status.success() {
            return Err(ProbeError::Failed {
                program: self.program.clone(),
                code: out.status.code(),
            });
        }
        parse_report(&out.stdout)
    }
}

fn bits_to_mbps(field: &str, bits: f64) -> Result<f64, ProbeError> {
    if !bits.is_finite() || bits < 0.0 {
        return Err(ProbeError::Parse(format!("{} rate out of range: {}", field, bits)));
    }
    Ok(round2(bits / 1_000_000.0))
}

/// Parses the tool's JSON report.
pub fn parse_report(json: &str) -> Result<BandwidthMeasurement, ProbeError> {
    let report: Report = serde_json::from_str(json.trim())
        .map_err(|e| ProbeError::Parse(format!("invalid report: {}", e)))?;
    let server = report.server.unwrap_or_default();
    Ok(BandwidthMeasurement {
        download_mbps: bits_to_mbps("download", report.download)?,
        upload_mbps: bits_to_mbps("upload", report.upload)?,
        ping_ms: report.ping.filter(|p| p.is_finite()),
        server_host: server.host,
        server_name: server.name,
        server_country: server.country,
    })
}
