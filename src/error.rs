//! Error types for the remote session, a single sampling tick, and
//! configuration validation.

use thiserror::Error;

/// Failures of the remote command channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The host rejected the configured credentials (or the key could not be loaded).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The host did not answer within the connect or command timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Any other connection or channel failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A command was issued while no session was established.
    #[error("not connected")]
    NotConnected,
}

impl SessionError {
    /// Whether the next tick should dial again on its own.
    ///
    /// Bad credentials stay bad until somebody changes them, so `Auth`
    /// is the only variant that is not retried automatically.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SessionError::Auth(_))
    }
}

/// Failure of one sampling tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The selected interface is not present in the remote counter table.
    #[error("interface not found: {0}")]
    Selection(String),
}

impl SampleError {
    /// Whether the sampler keeps dialing after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            SampleError::Session(err) => err.is_retryable(),
            SampleError::Selection(_) => true,
        }
    }
}

/// Invalid monitor configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid interface pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("polling interval must be a positive number of seconds, got {0}")]
    Interval(f64),

    #[error("host must not be empty")]
    EmptyHost,
}
