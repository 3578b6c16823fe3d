//! Pre-built remote host scenarios for testing.

use super::shell::MockShell;
use crate::collector::reader::{ip_link_command, operstate_command};

/// Renders a `/proc/net/dev` table with the given `(name, rx_bytes, tx_bytes)` rows.
///
/// Packet and error columns are filled with small constants so the rows look
/// like the real thing; only the byte columns carry the given values.
pub fn net_dev_table(rows: &[(&str, u64, u64)]) -> String {
    let mut table = String::from(
        "Inter-|   Receive                                                |  Transmit\n \
         face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n",
    );
    for (name, rx, tx) in rows {
        table.push_str(&format!(
            "{:>6}: {:>10} {:>8}    0    0    0     0          0         0 {:>10} {:>8}    0    0    0     0       0          0\n",
            name,
            rx,
            rx / 1000,
            tx,
            tx / 1000
        ));
    }
    table
}

impl MockShell {
    /// A typical access point: a WAN uplink, a LAN bridge and two radios.
    ///
    /// `eth0` reports its state through operstate, `br-lan` only through
    /// `ip link`, `wlan0` is dormant and `wlan1` is down.
    pub fn access_point() -> Self {
        let shell = Self::new();

        shell.set_net_dev(net_dev_table(&[
            ("lo", 5_000_000, 5_000_000),
            ("eth0", 1_200_000_000, 300_000_000),
            ("br-lan", 250_000_000, 1_100_000_000),
            ("wlan0", 90_000_000, 800_000_000),
            ("wlan1", 0, 0),
        ]));

        shell.set_output(&operstate_command("eth0"), "up\n");
        shell.set_output(&operstate_command("br-lan"), "");
        shell.set_output(
            &ip_link_command("br-lan"),
            "5: br-lan: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP mode DEFAULT group default qlen 1000\n",
        );
        shell.set_output(&operstate_command("wlan0"), "dormant\n");
        shell.set_output(&operstate_command("wlan1"), "down\n");

        shell
    }
}
