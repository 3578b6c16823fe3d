//! Human-readable rate formatting for consoles, tray labels and overlays.
//!
//! Rates are bytes per second; units are binary (1 KB = 1024 B).

use crate::model::{LinkStatus, RateSample};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Placeholder shown when there is no rate yet.
pub const NO_RATE: &str = "--";

/// Controls compact (tray icon) vs verbose (status line) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces, one-letter suffix ("1.2M", "45K")
    Compact,
    /// Detail: space and unit ("1.23 MB/s", "45 KB/s")
    Detail,
}

/// Format bytes-per-second rate as human-readable.
///
/// Compact: `"1.2M"`, `"45K"`
/// Detail:  `"1.23 MB/s"`, `"45 KB/s"`
pub fn format_bytes_rate(rate: f64, style: FmtStyle) -> String {
    let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
    match style {
        FmtStyle::Compact if rate >= MIB => format!("{:.1}M", rate / MIB),
        FmtStyle::Compact => format!("{:.0}K", rate / KIB),
        FmtStyle::Detail if rate >= MIB => format!("{:.2} MB/s", rate / MIB),
        FmtStyle::Detail => format!("{:.0} KB/s", rate / KIB),
    }
}

/// Like [`format_bytes_rate`], `"--"` for no rate.
pub fn format_optional_rate(rate: Option<f64>, style: FmtStyle) -> String {
    match rate {
        Some(r) => format_bytes_rate(r, style),
        None => NO_RATE.to_string(),
    }
}

/// One status line: `"Down: 1.23 MB/s | Up: 45 KB/s | Link: up"`.
pub fn format_sample_line(sample: Option<&RateSample>) -> String {
    let down = format_optional_rate(sample.map(|s| s.down_bps), FmtStyle::Detail);
    let up = format_optional_rate(sample.map(|s| s.up_bps), FmtStyle::Detail);
    let link = sample.map_or(LinkStatus::Unknown, |s| s.link_status);
    format!("Down: {} | Up: {} | Link: {}", down, up, link)
}
