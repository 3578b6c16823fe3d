//! aptrafficd - live throughput of a remote access point.
//!
//! Connects to the host over SSH, samples its interface counters once per
//! interval and prints one line per tick until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use aptraffic::collector::SshSession;
use aptraffic::config::{MonitorConfig, SshConfig};
use aptraffic::error::ConfigError;
use aptraffic::fmt::format_sample_line;
use aptraffic::publish::{MonitorSnapshot, Publisher};
use aptraffic::sampler::{Perspective, Sampler};

/// Live network throughput of a remote host over SSH.
#[derive(Parser)]
#[command(name = "aptrafficd", about = "Live network throughput of a remote host over SSH", version)]
struct Args {
    /// Host to connect to.
    #[arg(long, env = "AP_HOST", default_value = "192.168.1.1")]
    host: String,

    /// SSH port.
    #[arg(short, long, env = "AP_PORT", default_value_t = 22)]
    port: u16,

    /// SSH user.
    #[arg(short, long, env = "AP_USER", default_value = "admin")]
    user: String,

    /// SSH password. Tried after the key file.
    #[arg(long, env = "AP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Private key file. Tried before the password.
    #[arg(long, env = "AP_SSH_KEY")]
    ssh_key: Option<PathBuf>,

    /// Passphrase of the private key file.
    #[arg(long, env = "AP_SSH_KEY_PASSPHRASE", hide_env_values = true)]
    key_passphrase: Option<String>,

    /// Polling interval in seconds (fractions allowed).
    #[arg(short, long, env = "POLL_INTERVAL", default_value_t = 1.0)]
    interval: f64,

    /// Interface to watch: `auto`, a name, or a comma-separated list of
    /// names and glob patterns whose traffic is summed.
    #[arg(long, env = "INTERFACE", default_value = "auto")]
    interface: String,

    /// Treat the interface as LAN-side: transmitted bytes count as download.
    #[arg(long, env = "LAN_PERSPECTIVE")]
    lan: bool,

    /// Print a notice on the first failure of each outage.
    #[arg(long, env = "NOTIFY_ERRORS", default_value_t = true, action = clap::ArgAction::Set)]
    notify_errors: bool,

    /// Connect, banner and authentication timeout in seconds.
    #[arg(long, default_value_t = 15)]
    connect_timeout: u64,

    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = 15)]
    command_timeout: u64,

    /// Print each tick as a JSON object instead of a status line.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["aptrafficd", "aptraffic"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<MonitorConfig, ConfigError> {
    let mut ssh = SshConfig::new(&args.host, args.port, &args.user)?
        .with_password(args.password.clone().unwrap_or_default())
        .with_timeouts(
            Duration::from_secs(args.connect_timeout),
            Duration::from_secs(args.command_timeout),
        );
    if let Some(key) = &args.ssh_key {
        ssh = ssh.with_key_file(key, args.key_passphrase.clone());
    }

    Ok(MonitorConfig::new(ssh)
        .with_interval_secs(args.interval)?
        .with_selector(&args.interface)?
        .with_perspective(Perspective::from_lan_flag(args.lan))
        .with_error_notifications(args.notify_errors))
}

/// Prints every tick to stdout.
struct ConsolePublisher {
    json: bool,
}

impl Publisher for ConsolePublisher {
    fn on_tick(&self, snapshot: &MonitorSnapshot) {
        if self.json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
            return;
        }

        let interface = snapshot.interface.as_deref().unwrap_or("-");
        let line = format_sample_line(snapshot.latest.as_ref());
        if snapshot.is_healthy() {
            println!("[{}] {}", interface, line);
        } else {
            println!("[{}] {} | {}", interface, line, snapshot.error);
        }
    }

    fn on_error(&self, message: &str) {
        const RED: &str = "\x1b[1;31m";
        const RESET: &str = "\x1b[0m";
        eprintln!("{RED}{message}{RESET}");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("aptrafficd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Config: host={}:{}, user={}, interval={:?}, interface={}, perspective={:?}",
        config.ssh.host,
        config.ssh.port,
        config.ssh.username,
        config.interval,
        config.selection.label(),
        config.perspective
    );

    let session = match SshSession::new(config.ssh.clone()) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start SSH runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Setup graceful shutdown
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut sampler = Sampler::new(config, session).with_publisher(ConsolePublisher { json: args.json });
    sampler.run(&stop);

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
