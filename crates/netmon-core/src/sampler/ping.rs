//! ICMP reachability via the system `ping` binary.

use std::process::Command;
use std::time::Duration;

use super::process::run_with_timeout;
use super::{ProbeError, ReachabilityProbe};

/// Default reachability target.
pub const DEFAULT_TARGET: &str = "8.8.8.8";

/// Hard bound on one `ping` child, including process startup.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends one echo request per [`ReachabilityProbe::probe`] call.
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    target: String,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            program: "ping".to_string(),
            target: target.into(),
            timeout: PING_TIMEOUT,
        }
    }

    /// Overrides the executable (e.g. an absolute path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl ReachabilityProbe for PingProbe {
    fn probe(&mut self) -> Result<f64, ProbeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-c", "1", "-W", "1", &self.target]);
        let out = run_with_timeout(&mut cmd, self.timeout)?;
        if !out.status.success() {
            return Err(ProbeError::Failed {
                program: self.program.clone(),
                code: out.status.code(),
            });
        }
        parse_rtt_avg(&out.stdout)
            .ok_or_else(|| ProbeError::Parse("no rtt summary in ping output".to_string()))
    }
}

/// Extracts the average from the summary line of `ping` output.
///
/// Linux:  `rtt min/avg/max/mdev = 11.2/11.5/11.9/0.3 ms`
/// macOS:  `round-trip min/avg/max/stddev = 14.2/14.2/14.2/0.0 ms`
pub fn parse_rtt_avg(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("rtt") || line.starts_with("round-trip"))
        .find_map(|line| {
            let (_, values) = line.split_once('=')?;
            let avg = values.trim().split('/').nth(1)?;
            avg.trim().parse::<f64>().ok()
        })
}
