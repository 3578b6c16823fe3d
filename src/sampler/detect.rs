//! Busiest-interface detection.
//!
//! Two counter tables taken a short gap apart are compared; the interface
//! that moved the most bytes wins. The same scan, repeated periodically,
//! drives the hysteresis-guarded switch of an auto-detected selection.

use std::thread;
use std::time::Duration;

use crate::collector::{CounterReader, RemoteShell};
use crate::config::DetectionConfig;
use crate::error::SessionError;
use crate::model::CounterTable;

/// Bytes one interface moved during a scan (rx + tx).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceActivity {
    pub name: String,
    pub delta: u64,
}

/// Per-interface activity between two snapshots, in `first`'s table order.
///
/// Interfaces missing from `second` moved nothing. Counters that went
/// backwards contribute zero for that direction.
pub fn activity(first: &CounterTable, second: &CounterTable) -> Vec<InterfaceActivity> {
    first
        .iter()
        .map(|entry| {
            let delta = match second.get(&entry.name) {
                Some(after) => after
                    .rx_bytes
                    .saturating_sub(entry.counters.rx_bytes)
                    .saturating_add(after.tx_bytes.saturating_sub(entry.counters.tx_bytes)),
                None => 0,
            };
            InterfaceActivity {
                name: entry.name.clone(),
                delta,
            }
        })
        .collect()
}

/// The interface with the strictly largest delta; ties go to the one
/// listed first. With nothing moving the first interface is returned.
pub fn busiest(activity: &[InterfaceActivity]) -> Option<&InterfaceActivity> {
    activity.iter().fold(None, |best, candidate| match best {
        Some(b) if candidate.delta <= b.delta => Some(b),
        _ => Some(candidate),
    })
}

/// Hysteresis rule: the candidate must beat both `factor` times the
/// current interface's delta and the absolute floor.
pub fn should_switch(candidate_delta: u64, current_delta: u64, config: &DetectionConfig) -> bool {
    let threshold = current_delta
        .saturating_mul(config.switch_factor)
        .max(config.switch_floor_bytes);
    candidate_delta > threshold
}

/// Picks the interface to switch to, if any.
///
/// The current interface's delta comes from the same scan; when it is
/// absent from the table it counts as idle.
pub fn choose_switch<'a>(
    activity: &'a [InterfaceActivity],
    current: &str,
    config: &DetectionConfig,
) -> Option<&'a InterfaceActivity> {
    let best = busiest(activity)?;
    if best.name == current {
        return None;
    }
    let current_delta = activity
        .iter()
        .find(|a| a.name == current)
        .map_or(0, |a| a.delta);

    should_switch(best.delta, current_delta, config).then_some(best)
}

/// Takes two counter tables `gap` apart and returns the activity between them.
pub fn scan<S: RemoteShell>(
    reader: &CounterReader<S>,
    gap: Duration,
) -> Result<Vec<InterfaceActivity>, SessionError> {
    let first = reader.read_all()?;
    if !gap.is_zero() {
        thread::sleep(gap);
    }
    let second = reader.read_all()?;
    Ok(activity(&first, &second))
}
