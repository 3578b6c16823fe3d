//! SSH implementation of [`RemoteShell`].
//!
//! One `SshSession` owns at most one live connection to one host. The
//! connection sits behind a mutex, so commands from different threads run
//! one after another on the wire. russh is async; the session keeps a small
//! private runtime and blocks on it, which keeps the sampler loop synchronous.

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use russh::client::{self, Handle};
use russh::keys::ssh_key::PublicKey;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::collector::traits::RemoteShell;
use crate::config::SshConfig;
use crate::error::SessionError;

/// russh callbacks for the monitoring connection.
///
/// Every host key is accepted. Trust is whatever the transport itself
/// provides; the key algorithm is logged so a changed key is visible.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        debug!(
            algorithm = %server_public_key.algorithm(),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// Maps a transport failure onto the session error taxonomy.
///
/// russh reports timeouts through several error shapes (its own variants,
/// wrapped `io::ErrorKind::TimedOut`), so the message text decides.
fn classify(err: impl Display) -> SessionError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        SessionError::Timeout(message)
    } else {
        SessionError::Transport(message)
    }
}

/// Remote shell over a persistent SSH connection.
pub struct SshSession {
    config: SshConfig,
    runtime: Runtime,
    handle: Mutex<Option<Handle<AcceptingHandler>>>,
}

impl SshSession {
    /// Creates a session for `config`. No connection is made until
    /// [`RemoteShell::connect`] is called.
    pub fn new(config: SshConfig) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("aptraffic-ssh")
            .enable_all()
            .build()?;

        Ok(Self {
            config,
            runtime,
            handle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<Handle<AcceptingHandler>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_key(&self) -> Result<Option<PrivateKey>, SessionError> {
        let credentials = &self.config.credentials;
        let Some(path) = credentials.key_file.as_ref() else {
            return Ok(None);
        };

        load_secret_key(path, credentials.key_passphrase.as_deref())
            .map(Some)
            .map_err(|e| SessionError::Auth(format!("cannot load key {}: {}", path.display(), e)))
    }

    async fn open(
        config: &SshConfig,
        key: Option<PrivateKey>,
    ) -> Result<Handle<AcceptingHandler>, SessionError> {
        let ssh_config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            ssh_config,
            (config.host.as_str(), config.port),
            AcceptingHandler,
        )
        .await
        .map_err(classify)?;

        Self::authenticate(&mut handle, config, key).await?;
        Ok(handle)
    }

    async fn authenticate(
        handle: &mut Handle<AcceptingHandler>,
        config: &SshConfig,
        key: Option<PrivateKey>,
    ) -> Result<(), SessionError> {
        let user = config.username.as_str();
        let credentials = &config.credentials;

        if let Some(key) = key {
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(classify)?
                .flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await
                .map_err(classify)?;
            if result.success() {
                return Ok(());
            }
            debug!(user, "Public key rejected");
        }

        if let Some(password) = credentials.password.as_deref() {
            let result = handle
                .authenticate_password(user, password)
                .await
                .map_err(classify)?;
            if result.success() {
                return Ok(());
            }
            debug!(user, "Password rejected");
        }

        if credentials.key_file.is_none() && credentials.password.is_none() {
            let result = handle.authenticate_none(user).await.map_err(classify)?;
            if result.success() {
                return Ok(());
            }
        }

        Err(SessionError::Auth(format!(
            "{}@{} rejected the offered credentials",
            user, config.host
        )))
    }

    async fn run_command(
        handle: &Handle<AcceptingHandler>,
        command: &str,
    ) -> Result<String, SessionError> {
        let mut channel = handle.channel_open_session().await.map_err(classify)?;
        channel.exec(true, command).await.map_err(classify)?;

        let mut stdout = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => {
                    trace!(command, exit_status, "Remote command finished");
                }
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl RemoteShell for SshSession {
    fn connect(&self) -> Result<(), SessionError> {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|h| !h.is_closed()) {
            return Ok(());
        }
        // A handle whose connection died is dropped, never reused.
        *guard = None;

        let key = self.load_key()?;
        let limit = self.config.connect_timeout;
        let handle = self
            .runtime
            .block_on(async { timeout(limit, Self::open(&self.config, key)).await })
            .map_err(|_| {
                SessionError::Timeout(format!(
                    "connecting to {}:{} took longer than {:?}",
                    self.config.host, self.config.port, limit
                ))
            })??;

        info!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.username,
            "SSH session established"
        );
        *guard = Some(handle);
        Ok(())
    }

    fn execute(&self, command: &str) -> Result<String, SessionError> {
        let guard = self.lock();
        let handle = guard.as_ref().ok_or(SessionError::NotConnected)?;

        let limit = self.config.command_timeout;
        self.runtime
            .block_on(async { timeout(limit, Self::run_command(handle, command)).await })
            .map_err(|_| SessionError::Timeout(format!("'{}' took longer than {:?}", command, limit)))?
    }

    fn close(&self) {
        let mut guard = self.lock();
        let Some(handle) = guard.take() else {
            return;
        };

        let limit = self.config.connect_timeout;
        let result = self.runtime.block_on(async {
            timeout(
                limit,
                handle.disconnect(Disconnect::ByApplication, "", "en"),
            )
            .await
        });
        match result {
            Ok(Ok(())) => debug!(host = %self.config.host, "SSH session closed"),
            Ok(Err(e)) => debug!(host = %self.config.host, "SSH disconnect failed: {}", e),
            Err(_) => warn!(host = %self.config.host, "SSH disconnect timed out"),
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_closed())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}
