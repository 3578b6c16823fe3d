//! Mock remote shell for testing.
//!
//! This module provides `MockShell` and pre-built scenarios for testing the
//! reader and sampler without an SSH server.

mod scenarios;
mod shell;

pub use scenarios::net_dev_table;
pub use shell::MockShell;
