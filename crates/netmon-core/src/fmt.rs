//! Shared formatting helpers for log lines and the stats endpoint.
//!
//! Functions that differ between terse log fields and human-facing text
//! are parameterized via [`FmtStyle`].

/// Controls compact (log fields) vs verbose (API/UI text) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, short suffixes ("1.5G", "3m5s")
    Compact,
    /// Detail: spaces, full suffixes ("1.5 GiB", "3m 5s")
    Detail,
}

/// Format byte count as human-readable size.
///
/// Compact: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`
/// Detail:  `"1.50 GiB"`, `"100.3 MiB"`, `"50.0 KiB"`, `"512 B"`
pub fn format_bytes(bytes: u64, style: FmtStyle) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    let f = bytes as f64;
    match style {
        FmtStyle::Compact => {
            if bytes >= GIB {
                format!("{:.1}G", f / GIB as f64)
            } else if bytes >= MIB {
                format!("{:.1}M", f / MIB as f64)
            } else if bytes >= KIB {
                format!("{:.1}K", f / KIB as f64)
            } else {
                format!("{}B", bytes)
            }
        }
        FmtStyle::Detail => {
            if bytes >= GIB {
                format!("{:.2} GiB", f / GIB as f64)
            } else if bytes >= MIB {
                format!("{:.1} MiB", f / MIB as f64)
            } else if bytes >= KIB {
                format!("{:.1} KiB", f / KIB as f64)
            } else {
                format!("{} B", bytes)
            }
        }
    }
}

/// Format duration in seconds as human-readable.
///
/// Compact: `"3m5s"`
/// Detail:  `"3m 5s"`, `"0s"` for zero
pub fn format_duration(secs: u64, style: FmtStyle) -> String {
    let sep = match style {
        FmtStyle::Compact => "",
        FmtStyle::Detail => " ",
    };
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}{}s", secs / 60, sep, secs % 60)
    } else if secs < 86400 {
        format!("{}h{}{}m", secs / 3600, sep, (secs % 3600) / 60)
    } else {
        format!("{}d{}{}h", secs / 86400, sep, (secs % 86400) / 3600)
    }
}

/// Format a latency in milliseconds.
///
/// Compact: `"12ms"`, `"1.5s"`
/// Detail:  `"12.345 ms"`, sub-millisecond values keep three decimals
pub fn format_ms(ms: f64, style: FmtStyle) -> String {
    match style {
        FmtStyle::Compact => {
            if ms >= 1_000.0 {
                format!("{:.1}s", ms / 1_000.0)
            } else {
                format!("{:.0}ms", ms)
            }
        }
        FmtStyle::Detail => format!("{:.3} ms", ms),
    }
}

/// Optional latency, `"-"` when absent.
pub fn format_opt_ms(ms: Option<f64>, style: FmtStyle) -> String {
    match ms {
        Some(v) => format_ms(v, style),
        None => "-".to_string(),
    }
}

/// Format a throughput already expressed in megabits per second.
pub fn format_mbps(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbit/s", mbps / 1000.0)
    } else {
        format!("{:.2} Mbit/s", mbps)
    }
}

/// Round to two decimals, the precision bandwidth figures are stored at.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
