//! Parsers for the remote counter table and link-state outputs.
//!
//! These are pure functions over command output, so they are tested with
//! plain string inputs.

use tracing::debug;

use crate::model::{CounterTable, Counters, LinkStatus};

/// Interface excluded from every table: its traffic never leaves the host.
pub const LOOPBACK: &str = "lo";

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ============ Network Device Counters ============

/// Parses one line of `/proc/net/dev`.
///
/// Returns `Ok(None)` for lines that are not interface rows (headers, blanks)
/// and `Err` for rows whose counters cannot be read.
///
/// Format:
/// ```text
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///   eth0: 9876543     5678    1    2    0     0          0        10 87654321     4321    3    4    0     0       0          0
/// ```
///
/// Receive bytes is the first field after the colon. Transmit bytes is the
/// ninth field when the row has one, otherwise the last field. The column
/// layout is fixed but not self-describing, so this positional rule is kept
/// as is even though it is wrong for a table with fewer than nine columns.
pub fn parse_net_dev_line(line: &str) -> Result<Option<(String, Counters)>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.contains('|') {
        return Ok(None);
    }

    let Some((name, rest)) = line.split_once(':') else {
        return Ok(None);
    };
    let name = name.trim();

    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(ParseError::new(format!(
            "{}: expected at least 2 counters, found {}",
            name,
            fields.len()
        )));
    }

    let tx_field = fields.get(8).or_else(|| fields.last()).copied();
    let parse = |field: Option<&str>, what: &str| -> Result<u64, ParseError> {
        field
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| ParseError::new(format!("{}: invalid {} counter", name, what)))
    };

    let rx_bytes = parse(fields.first().copied(), "rx")?;
    let tx_bytes = parse(tx_field, "tx")?;

    Ok(Some((name.to_string(), Counters::new(rx_bytes, tx_bytes))))
}

/// Parses the whole `/proc/net/dev` table, skipping loopback and any row
/// that fails to parse.
pub fn parse_net_dev(content: &str) -> CounterTable {
    let mut table = CounterTable::new();

    for line in content.lines() {
        match parse_net_dev_line(line) {
            Ok(Some((name, _))) if name == LOOPBACK => {}
            Ok(Some((name, counters))) => table.insert(name, counters),
            Ok(None) => {}
            Err(e) => debug!("Skipping counter row: {}", e),
        }
    }

    table
}

/// Finds one interface in a `/proc/net/dev` table.
///
/// The first row with that name that parses wins; malformed rows are skipped.
pub fn find_net_dev(content: &str, interface: &str) -> Option<Counters> {
    content.lines().find_map(|line| match parse_net_dev_line(line) {
        Ok(Some((name, counters))) if name == interface => Some(counters),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping counter row: {}", e);
            None
        }
    })
}

// ============ Link State ============

/// Parses `/sys/class/net/<iface>/operstate`.
///
/// Returns `None` when the content is not a state this reader can vouch for,
/// so the caller falls back to `ip link show`. `dormant` and `unknown` are
/// definitive answers that map to [`LinkStatus::Unknown`].
pub fn parse_operstate(content: &str) -> Option<LinkStatus> {
    match content.trim().to_ascii_lowercase().as_str() {
        "up" => Some(LinkStatus::Up),
        "down" => Some(LinkStatus::Down),
        "dormant" | "unknown" => Some(LinkStatus::Unknown),
        _ => None,
    }
}

/// Parses the textual state tokens of `ip link show <iface>`.
pub fn parse_ip_link(content: &str) -> LinkStatus {
    if content.contains(" state UP") || content.contains("<UP,") {
        LinkStatus::Up
    } else if content.contains(" state DOWN") {
        LinkStatus::Down
    } else {
        LinkStatus::Unknown
    }
}
