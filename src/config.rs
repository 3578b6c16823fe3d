//! Monitor configuration.
//!
//! A `MonitorConfig` is built once at startup and handed to the engine by
//! value. Nothing in the crate reads process-wide settings after that.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sampler::{Perspective, SelectionPolicy};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default bound on connect, banner exchange and authentication.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on a single remote command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Credentials offered to the remote host.
///
/// The key file is tried first, then the password. With neither set the
/// session attempts `none` authentication.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    pub key_passphrase: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file)
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Connection parameters for the single monitored host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl SshConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(Self {
            host,
            port,
            username: username.into(),
            credentials: Credentials::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    /// Sets the password. An empty string means "no password".
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.credentials.password = (!password.is_empty()).then_some(password);
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.credentials.key_file = Some(path.into());
        self.credentials.key_passphrase = passphrase;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, command: Duration) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self
    }
}

/// Tuning of the busiest-interface scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Gap between the two snapshots of the first detection.
    pub initial_gap: Duration,
    /// How often an auto-detected selection is re-examined.
    pub recheck_interval: Duration,
    /// Gap between the two snapshots of a re-detection scan.
    pub recheck_gap: Duration,
    /// A candidate must move more than this many times the current
    /// interface's bytes to take over.
    pub switch_factor: u64,
    /// ...and more than this many bytes within the scan gap.
    pub switch_floor_bytes: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            initial_gap: Duration::from_millis(500),
            recheck_interval: Duration::from_secs(5),
            recheck_gap: Duration::from_millis(250),
            switch_factor: 4,
            switch_floor_bytes: 200 * 1024,
        }
    }
}

/// Complete, validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub ssh: SshConfig,
    pub interval: Duration,
    pub selection: SelectionPolicy,
    pub perspective: Perspective,
    pub detection: DetectionConfig,
    /// Deliver the one-shot error notification to publishers.
    pub notify_errors: bool,
}

impl MonitorConfig {
    /// Creates a configuration with the default cadence, auto-detection and
    /// WAN perspective.
    pub fn new(ssh: SshConfig) -> Self {
        Self {
            ssh,
            interval: DEFAULT_INTERVAL,
            selection: SelectionPolicy::AutoDetect,
            perspective: Perspective::Wan,
            detection: DetectionConfig::default(),
            notify_errors: true,
        }
    }

    /// Sets the polling interval from (possibly fractional) seconds.
    pub fn with_interval_secs(mut self, secs: f64) -> Result<Self, ConfigError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::Interval(secs));
        }
        self.interval = Duration::from_secs_f64(secs);
        Ok(self)
    }

    /// Sets the interface selection from a selector string
    /// (`auto`, a name, a comma-separated list and/or glob patterns).
    pub fn with_selector(mut self, selector: &str) -> Result<Self, ConfigError> {
        self.selection = SelectionPolicy::parse(selector)?;
        Ok(self)
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_error_notifications(mut self, enabled: bool) -> Self {
        self.notify_errors = enabled;
        self
    }
}
