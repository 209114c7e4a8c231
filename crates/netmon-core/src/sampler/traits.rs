//! Probe abstractions.
//!
//! The sampling loops only see these traits, so tests drive them with scripted
//! probes instead of spawning `ping` or hitting the network.

use super::{BandwidthMeasurement, ProbeError};

/// One reachability measurement per call.
pub trait ReachabilityProbe {
    /// Round-trip latency in milliseconds, or why the probe failed.
    fn probe(&mut self) -> Result<f64, ProbeError>;
}

/// One throughput measurement per call.
pub trait BandwidthProbe {
    fn measure(&mut self) -> Result<BandwidthMeasurement, ProbeError>;
}

impl<P: ReachabilityProbe + ?Sized> ReachabilityProbe for Box<P> {
    fn probe(&mut self) -> Result<f64, ProbeError> {
        (**self).probe()
    }
}

impl<P: BandwidthProbe + ?Sized> BandwidthProbe for Box<P> {
    fn measure(&mut self) -> Result<BandwidthMeasurement, ProbeError> {
        (**self).measure()
    }
}
