//! Counter reader: issues read-only commands over a [`RemoteShell`] and
//! turns their output into counters and link states.

use tracing::debug;

use crate::collector::parser::{find_net_dev, parse_ip_link, parse_net_dev, parse_operstate};
use crate::collector::traits::RemoteShell;
use crate::error::SessionError;
use crate::model::{CounterTable, Counters, LinkStatus};

/// Dumps the kernel interface counter table.
pub const NET_DEV_COMMAND: &str = "cat /proc/net/dev 2>/dev/null || true";

/// Reads an interface's operational-state pseudo-file.
pub fn operstate_command(interface: &str) -> String {
    format!("cat /sys/class/net/{}/operstate 2>/dev/null || true", interface)
}

/// Lists the interface's link state textually.
pub fn ip_link_command(interface: &str) -> String {
    format!("ip link show {} 2>/dev/null || true", interface)
}

/// Whether `name` can be interpolated into a remote command as is.
///
/// Only letters, digits and `._:@-` are allowed. Anything else never
/// reaches the remote shell.
pub fn is_safe_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '@' | '-'))
}

/// Reads counters and link state from the remote host.
///
/// The reader never dials: the shell must already be connected, otherwise
/// reads fail with [`SessionError::NotConnected`].
pub struct CounterReader<S: RemoteShell> {
    shell: S,
}

impl<S: RemoteShell> CounterReader<S> {
    pub fn new(shell: S) -> Self {
        Self { shell }
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Reads the full counter table, loopback excluded.
    pub fn read_all(&self) -> Result<CounterTable, SessionError> {
        let output = self.shell.execute(NET_DEV_COMMAND)?;
        Ok(parse_net_dev(&output))
    }

    /// Reads the counters of one interface.
    ///
    /// Returns `Ok(None)` when the interface is not in the table or its
    /// row cannot be parsed.
    pub fn read_one(&self, interface: &str) -> Result<Option<Counters>, SessionError> {
        let output = self.shell.execute(NET_DEV_COMMAND)?;
        Ok(find_net_dev(&output, interface))
    }

    /// Reads the link state of one interface.
    ///
    /// The operstate file is asked first; when it says nothing usable the
    /// `ip link` listing is parsed. Any failure yields
    /// [`LinkStatus::Unknown`]: a broken state check must not stop rate
    /// computation.
    pub fn read_link_status(&self, interface: &str) -> LinkStatus {
        if !is_safe_interface_name(interface) {
            debug!(interface, "Not probing link state of unsafe interface name");
            return LinkStatus::Unknown;
        }

        match self.shell.execute(&operstate_command(interface)) {
            Ok(output) => {
                if let Some(status) = parse_operstate(&output) {
                    return status;
                }
            }
            Err(e) => debug!(interface, "operstate read failed: {}", e),
        }

        match self.shell.execute(&ip_link_command(interface)) {
            Ok(output) => parse_ip_link(&output),
            Err(e) => {
                debug!(interface, "ip link read failed: {}", e);
                LinkStatus::Unknown
            }
        }
    }
}
