//! Byte-rate computation between two samples of the same selection.

use serde::{Deserialize, Serialize};

use crate::model::{Counters, InterfaceSample, LinkStatus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest elapsed time (seconds) a rate is computed over.
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Perspective
// ---------------------------------------------------------------------------

/// Which counter direction counts as "down".
///
/// On a WAN uplink received bytes are downloads. On a LAN-side interface
/// of a router the client downloads are what the router transmits, so the
/// directions swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    #[default]
    Wan,
    Lan,
}

impl Perspective {
    pub fn from_lan_flag(lan: bool) -> Self {
        if lan { Perspective::Lan } else { Perspective::Wan }
    }

    /// Maps `(rx, tx)` quantities to `(down, up)`.
    pub fn orient<T>(self, rx: T, tx: T) -> (T, T) {
        match self {
            Perspective::Wan => (rx, tx),
            Perspective::Lan => (tx, rx),
        }
    }
}

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Byte deltas between two readings.
///
/// Returns `None` when either counter went backwards (wrap, interface
/// reset or reboot). Callers treat that as zero traffic for the tick.
pub fn counter_delta(prev: Counters, curr: Counters) -> Option<(u64, u64)> {
    let drx = curr.rx_bytes.checked_sub(prev.rx_bytes)?;
    let dtx = curr.tx_bytes.checked_sub(prev.tx_bytes)?;
    Some((drx, dtx))
}

/// Converts byte deltas over `elapsed_secs` into `(down, up)` bytes per second.
pub fn rates_from_delta(
    drx: u64,
    dtx: u64,
    elapsed_secs: f64,
    perspective: Perspective,
) -> (f64, f64) {
    let dt = elapsed_secs.max(MIN_ELAPSED_SECS);
    perspective.orient(drx as f64 / dt, dtx as f64 / dt)
}

// ---------------------------------------------------------------------------
// Throughput
// ---------------------------------------------------------------------------

/// Result of comparing two samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub down_bps: f64,
    pub up_bps: f64,
    pub elapsed_secs: f64,
    /// A counter went backwards; both rates were forced to zero.
    pub counter_reset: bool,
}

/// Computes the throughput from `prev` to `curr`.
///
/// Returns `None` when the samples are not comparable: different
/// selections or member sets, or less than [`MIN_ELAPSED_SECS`] apart.
pub fn compute_throughput(
    prev: &InterfaceSample,
    curr: &InterfaceSample,
    perspective: Perspective,
) -> Option<Throughput> {
    if !prev.same_selection(curr) {
        return None;
    }

    let elapsed_secs = curr
        .observed_at
        .saturating_duration_since(prev.observed_at)
        .as_secs_f64();
    if elapsed_secs < MIN_ELAPSED_SECS {
        return None;
    }

    let (delta, counter_reset) = match counter_delta(prev.counters, curr.counters) {
        Some(d) => (d, false),
        None => ((0, 0), true),
    };
    let (down_bps, up_bps) = rates_from_delta(delta.0, delta.1, elapsed_secs, perspective);

    Some(Throughput {
        down_bps,
        up_bps,
        elapsed_secs,
        counter_reset,
    })
}

/// Link status to publish: an `Unknown` link that is visibly moving
/// bytes is reported as up.
pub fn resolve_link_status(reported: LinkStatus, down_bps: f64, up_bps: f64) -> LinkStatus {
    if reported == LinkStatus::Unknown && down_bps + up_bps > 0.0 {
        LinkStatus::Up
    } else {
        reported
    }
}
