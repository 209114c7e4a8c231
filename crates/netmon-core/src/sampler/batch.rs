//! Aggregation of a fixed number of probe results into one connectivity record.

use crate::model::{NewConnectivitySample, Status};
use crate::timestamp::Timestamp;

/// Accumulates probe outcomes until `size` of them have been seen.
#[derive(Debug, Clone)]
pub struct Batch {
    size: u32,
    latencies: Vec<f64>,
    failed: u32,
}

impl Batch {
    /// A batch of at least one probe.
    pub fn new(size: u32) -> Self {
        let size = size.max(1);
        Self {
            size,
            latencies: Vec::new(),
            failed: 0,
        }
    }

    /// Records one probe: `Some(ms)` on success, `None` on failure or timeout.
    pub fn push(&mut self, result: Option<f64>) {
        match result {
            Some(ms) => self.latencies.push(ms),
            None => self.failed += 1,
        }
    }

    pub fn len(&self) -> u32 {
        self.latencies.len() as u32 + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.size
    }

    /// Turns the collected probes into a record and resets the batch.
    ///
    /// `total_count` is the number of probes actually pushed, which equals
    /// the configured size whenever the caller waited for [`Batch::is_full`].
    pub fn finalize(&mut self, timestamp: Timestamp) -> NewConnectivitySample {
        let success_count = self.latencies.len() as u32;
        let failed_count = self.failed;
        let response_time = if success_count > 0 {
            Some(self.latencies.iter().sum::<f64>() / f64::from(success_count))
        } else {
            None
        };

        self.latencies.clear();
        self.failed = 0;

        NewConnectivitySample {
            timestamp,
            status: if success_count > 0 {
                Status::Connected
            } else {
                Status::Disconnected
            },
            response_time,
            success_count,
            total_count: success_count + failed_count,
            failed_count,
        }
    }
}
