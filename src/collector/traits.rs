//! Abstraction over the remote command channel to enable testing and mocking.
//!
//! The `RemoteShell` trait lets the counter reader work with a real SSH
//! session in production and with a scripted mock in tests.

use std::sync::Arc;

use crate::error::SessionError;

/// A serialized channel to a single remote host.
///
/// All methods take `&self`: implementations guard their one physical
/// connection internally, so concurrent callers block on each other instead
/// of interleaving commands on the wire.
pub trait RemoteShell: Send + Sync {
    /// Establishes the authenticated channel.
    ///
    /// Calling this while already connected is a no-op.
    fn connect(&self) -> Result<(), SessionError>;

    /// Runs one non-interactive command and returns its standard output.
    ///
    /// Commands are built to print nothing rather than fail when the object
    /// they query is missing. Returns [`SessionError::NotConnected`] when
    /// there is no live session; this method never dials on its own.
    fn execute(&self, command: &str) -> Result<String, SessionError>;

    /// Releases the channel.
    ///
    /// Safe to call when already closed. The next `connect()` always builds
    /// a fresh connection.
    fn close(&self);

    /// Returns `true` while a session is established.
    fn is_connected(&self) -> bool;
}

impl<T: RemoteShell + ?Sized> RemoteShell for Arc<T> {
    fn connect(&self) -> Result<(), SessionError> {
        (**self).connect()
    }

    fn execute(&self, command: &str) -> Result<String, SessionError> {
        (**self).execute(command)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<T: RemoteShell + ?Sized> RemoteShell for Box<T> {
    fn connect(&self) -> Result<(), SessionError> {
        (**self).connect()
    }

    fn execute(&self, command: &str) -> Result<String, SessionError> {
        (**self).execute(command)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
