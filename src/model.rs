//! Data model shared by the collector, the sampler and the publisher boundary.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative receive/transmit byte counters of one interface (or a sum of several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl Counters {
    pub fn new(rx_bytes: u64, tx_bytes: u64) -> Self {
        Self { rx_bytes, tx_bytes }
    }

    /// Adds another interface's counters into this sum.
    pub fn saturating_add(self, other: Counters) -> Self {
        Self {
            rx_bytes: self.rx_bytes.saturating_add(other.rx_bytes),
            tx_bytes: self.tx_bytes.saturating_add(other.tx_bytes),
        }
    }
}

/// One parsed row of the remote counter table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub counters: Counters,
}

/// Parsed counter table, in the order the remote host listed the interfaces.
///
/// Table order matters: auto-detection breaks ties in favour of the
/// interface listed first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterTable {
    entries: Vec<InterfaceCounters>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row. A repeated name replaces the earlier row in place.
    pub fn insert(&mut self, name: impl Into<String>, counters: Counters) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.counters = counters,
            None => self.entries.push(InterfaceCounters { name, counters }),
        }
    }

    pub fn get(&self, name: &str) -> Option<Counters> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.counters)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceCounters> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Counters)> for CounterTable {
    fn from_iter<I: IntoIterator<Item = (String, Counters)>>(iter: I) -> Self {
        let mut table = CounterTable::new();
        for (name, counters) in iter {
            table.insert(name, counters);
        }
        table
    }
}

/// Counters for the current selection at one instant.
///
/// `name` is the interface name, or the pattern label when several
/// interfaces are aggregated. `members` lists the interfaces summed into
/// `counters`, sorted. Two samples are only comparable when both match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSample {
    pub name: String,
    pub members: Vec<String>,
    pub counters: Counters,
    pub observed_at: Instant,
}

impl InterfaceSample {
    /// Whether rates may be computed from `self` to `other`.
    pub fn same_selection(&self, other: &InterfaceSample) -> bool {
        self.name == other.name && self.members == other.members
    }
}

/// Operational state of the monitored link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStatus::Up => "up",
            LinkStatus::Down => "down",
            LinkStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Throughput published once per successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    /// Bytes per second in the "down" direction.
    pub down_bps: f64,
    /// Bytes per second in the "up" direction.
    pub up_bps: f64,
    pub link_status: LinkStatus,
    pub at: DateTime<Utc>,
}
