//! Remote counter collection over a persistent shell session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                CounterReader                 │
//! │  - cat /proc/net/dev                         │
//! │  - cat /sys/class/net/<iface>/operstate      │
//! │  - ip link show <iface>                      │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!                 ┌──────▼──────┐
//!                 │ RemoteShell │ (trait)
//!                 └──────┬──────┘
//!              ┌─────────┴─────────┐
//!       ┌──────▼──────┐     ┌──────▼──────┐
//!       │ SshSession  │     │  MockShell  │
//!       │ (russh)     │     │ (Testing)   │
//!       └─────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use aptraffic::collector::mock::{MockShell, net_dev_table};
//! use aptraffic::collector::{CounterReader, RemoteShell};
//!
//! let shell = MockShell::new();
//! shell.set_net_dev(net_dev_table(&[("eth0", 10, 20), ("lo", 5, 5)]));
//! shell.connect().unwrap();
//!
//! let reader = CounterReader::new(shell);
//! let table = reader.read_all().unwrap();
//! assert_eq!(table.len(), 1);
//! ```

pub mod mock;
pub mod parser;
mod reader;
mod session;
pub mod traits;

pub use parser::ParseError;
pub use reader::{
    CounterReader, NET_DEV_COMMAND, ip_link_command, is_safe_interface_name, operstate_command,
};
pub use session::SshSession;
pub use traits::RemoteShell;
