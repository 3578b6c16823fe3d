//! aptraffic - live network throughput of a remote host over SSH.
//!
//! This library provides the sampling engine used by:
//! - `aptrafficd` - console daemon printing one line per tick
//! - host applications (tray icons, overlays) reading [`publish::SharedRates`]

pub mod collector;
pub mod config;
pub mod error;
pub mod fmt;
pub mod model;
pub mod publish;
pub mod sampler;

pub use config::{MonitorConfig, SshConfig};
pub use error::{ConfigError, SampleError, SessionError};
pub use model::{LinkStatus, RateSample};
pub use publish::{Monitor, MonitorHandle, MonitorSnapshot, Publisher, SharedRates};
pub use sampler::{Perspective, Sampler, SelectionPolicy, TickOutcome};
