//! In-memory remote shell for testing the reader and sampler without SSH.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collector::reader::NET_DEV_COMMAND;
use crate::collector::traits::RemoteShell;
use crate::error::SessionError;

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    /// Set when the "remote side" dropped the connection.
    dropped: bool,
    /// Queued outputs per command. The last output of a queue is sticky.
    outputs: HashMap<String, VecDeque<String>>,
    connect_failures: VecDeque<SessionError>,
    execute_failures: VecDeque<SessionError>,
    calls: Vec<String>,
    connects: usize,
    closes: usize,
}

/// Scripted remote shell.
///
/// Commands answer with queued outputs; unknown commands print nothing,
/// like the real commands do when the queried object is missing. Failures
/// can be injected for the next connect or execute calls.
#[derive(Debug, Default)]
pub struct MockShell {
    state: Mutex<MockState>,
}

impl MockShell {
    /// Creates a disconnected shell with no scripted outputs.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `command` always print `output`.
    pub fn set_output(&self, command: &str, output: impl Into<String>) {
        self.lock()
            .outputs
            .insert(command.to_string(), VecDeque::from([output.into()]));
    }

    /// Queues one more output for `command`.
    pub fn push_output(&self, command: &str, output: impl Into<String>) {
        self.lock()
            .outputs
            .entry(command.to_string())
            .or_default()
            .push_back(output.into());
    }

    /// Makes the counter table command always print `table`.
    pub fn set_net_dev(&self, table: impl Into<String>) {
        self.set_output(NET_DEV_COMMAND, table);
    }

    /// Queues one more counter table.
    pub fn push_net_dev(&self, table: impl Into<String>) {
        self.push_output(NET_DEV_COMMAND, table);
    }

    /// Makes the next `connect()` fail with `error`.
    pub fn fail_next_connect(&self, error: SessionError) {
        self.lock().connect_failures.push_back(error);
    }

    /// Makes the next `execute()` fail with `error`.
    pub fn fail_next_execute(&self, error: SessionError) {
        self.lock().execute_failures.push_back(error);
    }

    /// Simulates the remote side dropping the connection. Commands fail
    /// until the shell is closed and connected again.
    pub fn drop_connection(&self) {
        self.lock().dropped = true;
    }

    /// Number of times `command` was executed.
    pub fn calls_of(&self, command: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == command).count()
    }

    /// Every executed command, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of sessions established.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Number of live sessions closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

impl RemoteShell for MockShell {
    fn connect(&self) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.connected && !state.dropped {
            return Ok(());
        }
        if let Some(error) = state.connect_failures.pop_front() {
            return Err(error);
        }
        state.connected = true;
        state.dropped = false;
        state.connects += 1;
        Ok(())
    }

    fn execute(&self, command: &str) -> Result<String, SessionError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(SessionError::NotConnected);
        }
        state.calls.push(command.to_string());
        if state.dropped {
            return Err(SessionError::Transport("connection closed by peer".into()));
        }
        if let Some(error) = state.execute_failures.pop_front() {
            return Err(error);
        }

        let output = match state.outputs.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => String::new(),
        };
        Ok(output)
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.connected {
            state.closes += 1;
        }
        state.connected = false;
        state.dropped = false;
    }

    fn is_connected(&self) -> bool {
        let state = self.lock();
        state.connected && !state.dropped
    }
}
