//! The sampling engine.
//!
//! One [`Sampler`] owns the remote shell, the previous sample and the
//! interface selection. Each tick walks
//! `Idle → Connecting → Sampling → (Computing | Faulted) → Idle`:
//!
//! 1. make sure the session is up (dial if needed),
//! 2. run auto-detection when it is due,
//! 3. read the counters of the selection,
//! 4. turn them into a rate against the previous sample,
//! 5. publish and notify.
//!
//! Any session failure closes the connection and drops the previous
//! sample, so the first tick after a reconnect only warms up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use glob::Pattern;
use tracing::{debug, error, info, trace, warn};

use crate::collector::{CounterReader, RemoteShell};
use crate::config::MonitorConfig;
use crate::error::{SampleError, SessionError};
use crate::model::{Counters, InterfaceSample, LinkStatus, RateSample};
use crate::publish::{OutageTracker, Publisher, SharedRates};
use crate::sampler::detect::{busiest, choose_switch, scan};
use crate::sampler::rates::{compute_throughput, resolve_link_status};
use crate::sampler::selection::{SelectionPolicy, aggregate, members, pattern_label};

/// Granularity of the inter-tick sleep; bounds how long a stop request waits.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Where the sampler is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Sampling,
    Computing,
    Faulted,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A rate was computed and published.
    Rate(RateSample),
    /// Counters were read but there is no comparable previous sample yet.
    WarmingUp,
    /// Auto-detection found no interfaces on the remote host yet.
    Undetected,
    /// The selected interface is not on the remote host.
    NoData(String),
    /// The session failed; it was closed and the error published.
    Faulted(SampleError),
    /// Authentication failed earlier; waiting for a reconnect request.
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Auto-detection has not found an interface yet.
    Unresolved,
    Interface { name: String, auto: bool },
    Aggregate { patterns: Vec<Pattern>, label: String },
}

/// Counters of the current target as read in one tick.
struct Reading {
    name: String,
    members: Vec<String>,
    counters: Counters,
    status: LinkStatus,
}

impl Target {
    fn from_policy(policy: &SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::Fixed(name) => Target::Interface {
                name: name.clone(),
                auto: false,
            },
            SelectionPolicy::AutoDetect => Target::Unresolved,
            SelectionPolicy::Pattern(patterns) => Target::Aggregate {
                patterns: patterns.clone(),
                label: pattern_label(patterns),
            },
        }
    }

    fn label(&self) -> Option<&str> {
        match self {
            Target::Unresolved => None,
            Target::Interface { name, .. } => Some(name),
            Target::Aggregate { label, .. } => Some(label),
        }
    }
}

/// Periodic rate sampler for one remote host.
pub struct Sampler<S: RemoteShell> {
    reader: CounterReader<S>,
    config: MonitorConfig,
    target: Target,
    previous: Option<InterfaceSample>,
    last_scan: Option<Instant>,
    phase: Phase,
    auth_latched: bool,
    reconnect: Arc<AtomicBool>,
    selection_missing: bool,
    outage: OutageTracker,
    rates: SharedRates,
    publishers: Vec<Box<dyn Publisher>>,
}

impl<S: RemoteShell> Sampler<S> {
    pub fn new(config: MonitorConfig, shell: S) -> Self {
        let target = Target::from_policy(&config.selection);
        let rates = SharedRates::new();
        rates.set_interface(target.label().map(str::to_string));

        Self {
            reader: CounterReader::new(shell),
            config,
            target,
            previous: None,
            last_scan: None,
            phase: Phase::Idle,
            auth_latched: false,
            reconnect: Arc::new(AtomicBool::new(false)),
            selection_missing: false,
            outage: OutageTracker::new(),
            rates,
            publishers: Vec::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: impl Publisher + 'static) -> Self {
        self.add_publisher(Box::new(publisher));
        self
    }

    pub fn add_publisher(&mut self, publisher: Box<dyn Publisher>) {
        self.publishers.push(publisher);
    }

    /// Shared state handle for readers on other threads.
    pub fn rates(&self) -> SharedRates {
        self.rates.clone()
    }

    /// Flag that, once set, lifts an authentication latch at the next tick.
    pub fn reconnect_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reconnect)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn shell(&self) -> &S {
        self.reader.shell()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Selected interface name or pattern label.
    pub fn selected(&self) -> Option<&str> {
        self.target.label()
    }

    pub fn previous(&self) -> Option<&InterfaceSample> {
        self.previous.as_ref()
    }

    pub fn is_auth_latched(&self) -> bool {
        self.auth_latched
    }

    /// Runs one tick now.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Runs one tick, treating `now` as the sample time.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        if self.reconnect.swap(false, Ordering::SeqCst) && self.auth_latched {
            info!("Authentication latch cleared, dialing again");
            self.auth_latched = false;
        }

        let outcome = if self.auth_latched {
            self.enter(Phase::Faulted);
            TickOutcome::Suspended
        } else {
            match self.sample(now) {
                Ok(outcome) => {
                    match &outcome {
                        TickOutcome::Rate(sample) => self.rates.publish(*sample),
                        _ => self.rates.clear_error(),
                    }
                    self.recovered();
                    outcome
                }
                Err(SampleError::Selection(name)) => {
                    self.rates.clear_error();
                    self.recovered();
                    if !self.selection_missing {
                        warn!(interface = %name, "Selected interface not found on remote host");
                        self.selection_missing = true;
                    }
                    TickOutcome::NoData(name)
                }
                Err(e) => self.fault(e),
            }
        };

        self.rates.count_tick();
        self.enter(Phase::Idle);

        let snapshot = self.rates.snapshot();
        for publisher in &self.publishers {
            publisher.on_tick(&snapshot);
        }
        outcome
    }

    /// Ticks every `interval` until `stop` is set, then closes the session.
    ///
    /// Deadlines advance by the interval from the previous deadline, so
    /// per-tick work does not accumulate drift. A loop that falls more than
    /// a whole interval behind restarts its schedule from now.
    pub fn run(&mut self, stop: &AtomicBool) {
        let interval = self.config.interval;
        info!(
            host = %self.config.ssh.host,
            interval_ms = interval.as_millis() as u64,
            selection = %self.config.selection.label(),
            "Sampler started"
        );

        let mut deadline = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            self.tick();

            deadline += interval;
            let now = Instant::now();
            if now.saturating_duration_since(deadline) > interval {
                debug!("Tick overran its schedule, restarting from now");
                deadline = now;
            }
            sleep_until(deadline, stop);
        }

        self.reader.shell().close();
        info!("Sampler stopped");
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            trace!(from = ?self.phase, to = ?phase, "Sampler phase");
            self.phase = phase;
        }
    }

    /// Session work of one tick. Returns `Rate`, `WarmingUp` or `Undetected`.
    fn sample(&mut self, now: Instant) -> Result<TickOutcome, SampleError> {
        self.enter(Phase::Connecting);
        self.ensure_connected()?;

        self.enter(Phase::Sampling);
        self.resolve_target(now)?;
        let Some(reading) = self.read_target()? else {
            return Ok(TickOutcome::Undetected);
        };
        self.selection_missing = false;

        self.enter(Phase::Computing);
        let current = InterfaceSample {
            name: reading.name,
            members: reading.members,
            counters: reading.counters,
            observed_at: now,
        };
        let regrouped = self
            .previous
            .as_ref()
            .is_some_and(|prev| prev.name == current.name && prev.members != current.members);
        if regrouped {
            info!(
                interface = %current.name,
                members = ?current.members,
                "Aggregate members changed, warming up"
            );
        }
        let throughput = self
            .previous
            .as_ref()
            .and_then(|prev| compute_throughput(prev, &current, self.config.perspective));

        let Some(throughput) = throughput else {
            trace!(interface = %current.name, "Warming up");
            self.previous = Some(current);
            return Ok(TickOutcome::WarmingUp);
        };

        if throughput.counter_reset {
            info!(interface = %current.name, "Counters went backwards, reporting zero for this tick");
        }
        let link_status =
            resolve_link_status(reading.status, throughput.down_bps, throughput.up_bps);
        trace!(
            interface = %current.name,
            down_bps = throughput.down_bps,
            up_bps = throughput.up_bps,
            %link_status,
            "Rate computed"
        );
        self.previous = Some(current);

        Ok(TickOutcome::Rate(RateSample {
            down_bps: throughput.down_bps,
            up_bps: throughput.up_bps,
            link_status,
            at: Utc::now(),
        }))
    }

    /// Dials when there is no live session. Reads never dial on their own.
    fn ensure_connected(&self) -> Result<(), SessionError> {
        let shell = self.reader.shell();
        if shell.is_connected() {
            return Ok(());
        }
        debug!(host = %self.config.ssh.host, port = self.config.ssh.port, "Connecting");
        shell.connect()
    }

    /// Runs the initial detection, or a re-detection when one is due.
    fn resolve_target(&mut self, now: Instant) -> Result<(), SessionError> {
        let current = match &self.target {
            Target::Unresolved => None,
            Target::Interface { name, auto: true } if self.recheck_due(now) => Some(name.clone()),
            _ => return Ok(()),
        };

        let detection = self.config.detection;
        let gap = match current {
            Some(_) => detection.recheck_gap,
            None => detection.initial_gap,
        };
        let activity = scan(&self.reader, gap)?;
        self.last_scan = Some(now);

        match current {
            None => match busiest(&activity) {
                Some(best) => {
                    info!(interface = %best.name, bytes = best.delta, "Auto-detected busiest interface");
                    self.select(best.name.clone());
                }
                None => debug!("No interfaces to auto-detect from"),
            },
            Some(current) => {
                if let Some(candidate) = choose_switch(&activity, &current, &detection) {
                    info!(
                        from = %current,
                        to = %candidate.name,
                        bytes = candidate.delta,
                        "Switching to busier interface"
                    );
                    self.select(candidate.name.clone());
                }
            }
        }
        Ok(())
    }

    fn recheck_due(&self, now: Instant) -> bool {
        self.last_scan.is_none_or(|last| {
            now.saturating_duration_since(last) >= self.config.detection.recheck_interval
        })
    }

    fn select(&mut self, name: String) {
        self.previous = None;
        self.rates.set_interface(Some(name.clone()));
        self.target = Target::Interface { name, auto: true };
    }

    /// Reads the target's counters. `None` while auto-detection is unresolved.
    fn read_target(&self) -> Result<Option<Reading>, SampleError> {
        let reading = match &self.target {
            Target::Unresolved => return Ok(None),
            Target::Interface { name, .. } => {
                let counters = self
                    .reader
                    .read_one(name)?
                    .ok_or_else(|| SampleError::Selection(name.clone()))?;
                Reading {
                    name: name.clone(),
                    members: vec![name.clone()],
                    counters,
                    status: self.reader.read_link_status(name),
                }
            }
            Target::Aggregate { patterns, label } => {
                let table = self.reader.read_all()?;
                Reading {
                    name: label.clone(),
                    members: members(&table, patterns),
                    counters: aggregate(&table, patterns),
                    status: LinkStatus::Unknown,
                }
            }
        };
        Ok(Some(reading))
    }

    fn recovered(&mut self) {
        if let Some(failed_ticks) = self.outage.record_success() {
            info!(failed_ticks, "Connection recovered");
        }
    }

    fn fault(&mut self, err: SampleError) -> TickOutcome {
        self.enter(Phase::Faulted);
        self.reader.shell().close();
        self.previous = None;

        let message = format!("Connection failed: {}", err);
        self.rates.set_error(message.clone());

        let first = self.outage.record_failure();
        let retryable = err.is_retryable();
        if !retryable {
            error!(host = %self.config.ssh.host, "{}; not retrying until a reconnect is requested", message);
            self.auth_latched = true;
        } else if first {
            warn!(host = %self.config.ssh.host, "{}", message);
        } else {
            debug!("{}", message);
        }

        // A latch is always announced, even in the middle of an outage.
        if (first || !retryable) && self.config.notify_errors {
            for publisher in &self.publishers {
                publisher.on_error(&message);
            }
        }
        TickOutcome::Faulted(err)
    }
}

/// Sleeps until `deadline` in short slices, returning early on stop.
fn sleep_until(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockShell, net_dev_table};
    use crate::collector::{NET_DEV_COMMAND, operstate_command};
    use crate::config::{DetectionConfig, SshConfig};
    use crate::publish::MonitorSnapshot;
    use crate::sampler::Perspective;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        ticks: Arc<Mutex<Vec<MonitorSnapshot>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl Publisher for Recorder {
        fn on_tick(&self, snapshot: &MonitorSnapshot) {
            self.ticks.lock().unwrap().push(snapshot.clone());
        }

        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn config(selector: &str) -> MonitorConfig {
        MonitorConfig::new(SshConfig::new("192.168.1.1", 22, "admin").unwrap())
            .with_selector(selector)
            .unwrap()
            .with_detection(DetectionConfig {
                initial_gap: Duration::ZERO,
                recheck_gap: Duration::ZERO,
                ..DetectionConfig::default()
            })
    }

    fn sampler(selector: &str) -> (Sampler<Arc<MockShell>>, Arc<MockShell>) {
        let shell = Arc::new(MockShell::new());
        (Sampler::new(config(selector), Arc::clone(&shell)), shell)
    }

    fn rate(outcome: TickOutcome) -> RateSample {
        match outcome {
            TickOutcome::Rate(sample) => sample,
            other => panic!("expected a rate, got {:?}", other),
        }
    }

    fn secs(t0: Instant, s: u64) -> Instant {
        t0 + Duration::from_secs(s)
    }

    #[test]
    fn test_fixed_interface_rates() {
        let (mut sampler, shell) = sampler("eth0");
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 5_000)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 3_000, 6_000)]));
        shell.set_output(&operstate_command("eth0"), "up\n");
        let t0 = Instant::now();

        assert_eq!(sampler.tick_at(t0), TickOutcome::WarmingUp);
        let sample = rate(sampler.tick_at(secs(t0, 2)));
        assert_eq!(sample.down_bps, 1_000.0);
        assert_eq!(sample.up_bps, 500.0);
        assert_eq!(sample.link_status, LinkStatus::Up);

        assert_eq!(sampler.phase(), Phase::Idle);
        assert_eq!(sampler.rates().latest(), Some(sample));
        assert_eq!(shell.connect_count(), 1);
    }

    #[test]
    fn test_lan_perspective() {
        let shell = Arc::new(MockShell::new());
        let config = config("br-lan").with_perspective(Perspective::Lan);
        let mut sampler = Sampler::new(config, Arc::clone(&shell));
        shell.push_net_dev(net_dev_table(&[("br-lan", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("br-lan", 100, 900)]));
        let t0 = Instant::now();

        sampler.tick_at(t0);
        let sample = rate(sampler.tick_at(secs(t0, 1)));
        assert_eq!((sample.down_bps, sample.up_bps), (900.0, 100.0));
        // Unknown state, but traffic flows.
        assert_eq!(sample.link_status, LinkStatus::Up);
    }

    #[test]
    fn test_counter_reset_reports_zero() {
        let (mut sampler, shell) = sampler("eth0");
        shell.push_net_dev(net_dev_table(&[("eth0", 9_000_000, 9_000_000)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 10, 10)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_010, 2_010)]));
        let t0 = Instant::now();

        sampler.tick_at(t0);
        let sample = rate(sampler.tick_at(secs(t0, 1)));
        assert_eq!((sample.down_bps, sample.up_bps), (0.0, 0.0));
        assert_eq!(sample.link_status, LinkStatus::Unknown);

        let sample = rate(sampler.tick_at(secs(t0, 2)));
        assert_eq!((sample.down_bps, sample.up_bps), (1_000.0, 2_000.0));
    }

    #[test]
    fn test_fixed_interface_is_never_scanned() {
        let (mut sampler, shell) = sampler("eth0");
        shell.set_net_dev(net_dev_table(&[("eth0", 1, 1), ("wlan0", 0, 0)]));
        let t0 = Instant::now();

        for s in 0..12 {
            sampler.tick_at(secs(t0, s));
        }
        assert_eq!(shell.calls_of(NET_DEV_COMMAND), 12);
        assert_eq!(sampler.selected(), Some("eth0"));
    }

    #[test]
    fn test_auto_detects_busiest() {
        let (mut sampler, shell) = sampler("auto");
        shell.push_net_dev(net_dev_table(&[("eth0", 100, 100), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 110, 100), ("wlan0", 5_000, 0)]));
        assert_eq!(sampler.selected(), None);

        assert_eq!(sampler.tick_at(Instant::now()), TickOutcome::WarmingUp);
        assert_eq!(sampler.selected(), Some("wlan0"));
        assert_eq!(sampler.rates().snapshot().interface.as_deref(), Some("wlan0"));
        assert_eq!(shell.calls_of(NET_DEV_COMMAND), 3);
    }

    #[test]
    fn test_auto_detect_on_empty_table_is_undetected() {
        let (mut sampler, shell) = sampler("auto");
        shell.set_net_dev(net_dev_table(&[]));
        let t0 = Instant::now();

        assert_eq!(sampler.tick_at(t0), TickOutcome::Undetected);
        assert_eq!(sampler.selected(), None);
        assert!(sampler.rates().snapshot().is_healthy());
        assert_eq!(shell.close_count(), 0);

        // Detection runs again once an interface shows up.
        shell.set_net_dev(net_dev_table(&[("eth0", 500, 0)]));
        assert_eq!(sampler.tick_at(secs(t0, 1)), TickOutcome::WarmingUp);
        assert_eq!(sampler.selected(), Some("eth0"));
    }

    #[test]
    fn test_redetection_switches_with_hysteresis() {
        let (mut sampler, shell) = sampler("auto");
        // Initial detection (two reads) + first sample.
        shell.push_net_dev(net_dev_table(&[("eth0", 0, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 0, 0)]));
        // Second tick, no scan.
        shell.push_net_dev(net_dev_table(&[("eth0", 2_000, 0), ("wlan0", 0, 0)]));
        // Re-detection scan: wlan0 moves a megabyte, eth0 100 bytes.
        shell.push_net_dev(net_dev_table(&[("eth0", 2_000, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 2_100, 0), ("wlan0", 1_000_000, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 2_100, 0), ("wlan0", 1_000_000, 0)]));
        let t0 = Instant::now();

        assert_eq!(sampler.tick_at(t0), TickOutcome::WarmingUp);
        assert_eq!(sampler.selected(), Some("eth0"));

        let sample = rate(sampler.tick_at(secs(t0, 1)));
        assert_eq!(sample.down_bps, 1_000.0);

        // Switching drops the previous sample of the old interface.
        assert_eq!(sampler.tick_at(secs(t0, 5)), TickOutcome::WarmingUp);
        assert_eq!(sampler.selected(), Some("wlan0"));
        assert_eq!(sampler.previous().map(|p| p.name.as_str()), Some("wlan0"));
    }

    #[test]
    fn test_redetection_keeps_current_below_floor() {
        let (mut sampler, shell) = sampler("auto");
        shell.push_net_dev(net_dev_table(&[("eth0", 0, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 0, 0)]));
        // Re-detection: wlan0 busier than eth0 but under the 200 KiB floor.
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 0), ("wlan0", 100_000, 0)]));
        let t0 = Instant::now();

        sampler.tick_at(t0);
        let outcome = sampler.tick_at(secs(t0, 5));
        assert!(matches!(outcome, TickOutcome::Rate(_)));
        assert_eq!(sampler.selected(), Some("eth0"));
    }

    #[test]
    fn test_pattern_aggregate() {
        let (mut sampler, shell) = sampler("eth*,wlan0");
        shell.push_net_dev(net_dev_table(&[
            ("eth0", 10, 20),
            ("eth1", 5, 5),
            ("wlan0", 1, 1),
            ("wlan1", 1_000, 1_000),
        ]));
        shell.push_net_dev(net_dev_table(&[
            ("eth0", 110, 20),
            ("eth1", 105, 5),
            ("wlan0", 101, 1),
            ("wlan1", 9_000, 9_000),
        ]));
        let t0 = Instant::now();

        assert_eq!(sampler.selected(), Some("eth*,wlan0"));
        sampler.tick_at(t0);
        let sample = rate(sampler.tick_at(secs(t0, 1)));
        assert_eq!((sample.down_bps, sample.up_bps), (300.0, 0.0));
        assert_eq!(sample.link_status, LinkStatus::Up);
        // Aggregates never read link state.
        assert_eq!(shell.calls().len(), 2);
    }

    #[test]
    fn test_aggregate_member_change_warms_up() {
        let (mut sampler, shell) = sampler("wlan*");
        shell.push_net_dev(net_dev_table(&[("eth0", 7, 7), ("wlan0", 1_000, 1_000)]));
        // wlan1 appears with its whole history on the counters.
        shell.push_net_dev(net_dev_table(&[
            ("eth0", 7, 7),
            ("wlan0", 1_100, 1_000),
            ("wlan1", 5_000_000_000, 0),
        ]));
        shell.push_net_dev(net_dev_table(&[
            ("eth0", 7, 7),
            ("wlan0", 1_200, 1_000),
            ("wlan1", 5_000_000_300, 0),
        ]));
        let t0 = Instant::now();

        assert_eq!(sampler.tick_at(t0), TickOutcome::WarmingUp);
        assert_eq!(sampler.tick_at(secs(t0, 1)), TickOutcome::WarmingUp);
        assert_eq!(
            sampler.previous().map(|p| p.members.clone()),
            Some(vec!["wlan0".to_string(), "wlan1".to_string()])
        );
        assert!(sampler.rates().latest().is_none());

        let sample = rate(sampler.tick_at(secs(t0, 2)));
        assert_eq!((sample.down_bps, sample.up_bps), (400.0, 0.0));
    }

    #[test]
    fn test_missing_interface_is_not_a_fault() {
        let (mut sampler, shell) = sampler("eth9");
        shell.set_net_dev(net_dev_table(&[("eth0", 1, 1)]));

        assert_eq!(
            sampler.tick_at(Instant::now()),
            TickOutcome::NoData("eth9".into())
        );
        assert_eq!(shell.close_count(), 0);
        assert!(sampler.rates().snapshot().is_healthy());
    }

    #[test]
    fn test_session_failure_closes_and_resets() {
        let (mut sampler, shell) = sampler("eth0");
        shell.push_net_dev(net_dev_table(&[("eth0", 0, 0)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 1_000, 1_000)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 2_000, 2_000)]));
        shell.push_net_dev(net_dev_table(&[("eth0", 2_500, 3_000)]));
        let t0 = Instant::now();

        sampler.tick_at(t0);
        rate(sampler.tick_at(secs(t0, 1)));

        shell.fail_next_execute(SessionError::Transport("connection reset".into()));
        let outcome = sampler.tick_at(secs(t0, 2));
        assert!(matches!(outcome, TickOutcome::Faulted(_)));
        assert_eq!(sampler.phase(), Phase::Idle);
        assert_eq!(shell.close_count(), 1);
        assert!(sampler.previous().is_none());

        let snap = sampler.rates().snapshot();
        assert_eq!(snap.error, "Connection failed: transport error: connection reset");
        // The last good sample stays visible.
        assert!(snap.latest.is_some());

        // Reconnects, warms up, clears the error.
        assert_eq!(sampler.tick_at(secs(t0, 3)), TickOutcome::WarmingUp);
        assert_eq!(shell.connect_count(), 2);
        assert!(sampler.rates().snapshot().is_healthy());

        // The next tick is a rate against the post-reconnect sample.
        let sample = rate(sampler.tick_at(secs(t0, 4)));
        assert_eq!((sample.down_bps, sample.up_bps), (500.0, 1_000.0));
        assert_eq!(sampler.rates().latest(), Some(sample));
    }

    #[test]
    fn test_error_notified_once_per_outage() {
        let recorder = Recorder::default();
        let (sampler, shell) = sampler("eth0");
        let mut sampler = sampler.with_publisher(recorder.clone());
        shell.set_net_dev(net_dev_table(&[("eth0", 0, 0)]));
        for _ in 0..3 {
            shell.fail_next_connect(SessionError::Timeout("connect".into()));
        }
        let t0 = Instant::now();

        for s in 0..3 {
            assert!(matches!(sampler.tick_at(secs(t0, s)), TickOutcome::Faulted(_)));
        }
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);

        assert_eq!(sampler.tick_at(secs(t0, 3)), TickOutcome::WarmingUp);

        shell.fail_next_execute(SessionError::Transport("connection reset".into()));
        assert!(matches!(sampler.tick_at(secs(t0, 4)), TickOutcome::Faulted(_)));

        let errors = recorder.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "Connection failed: timed out: connect");
        assert_eq!(recorder.ticks.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_error_notifications_can_be_disabled() {
        let recorder = Recorder::default();
        let shell = Arc::new(MockShell::new());
        let config = config("eth0").with_error_notifications(false);
        let mut sampler = Sampler::new(config, Arc::clone(&shell)).with_publisher(recorder.clone());
        shell.fail_next_connect(SessionError::Timeout("connect".into()));

        assert!(matches!(sampler.tick(), TickOutcome::Faulted(_)));
        assert!(recorder.errors.lock().unwrap().is_empty());
        assert!(!recorder.ticks.lock().unwrap()[0].is_healthy());
    }

    #[test]
    fn test_auth_failure_latches_until_reconnect() {
        let (mut sampler, shell) = sampler("eth0");
        shell.set_net_dev(net_dev_table(&[("eth0", 0, 0)]));
        shell.fail_next_connect(SessionError::Auth("password rejected".into()));

        assert!(matches!(sampler.tick(), TickOutcome::Faulted(_)));
        assert!(sampler.is_auth_latched());

        assert_eq!(sampler.tick(), TickOutcome::Suspended);
        assert_eq!(sampler.tick(), TickOutcome::Suspended);
        assert_eq!(shell.connect_count(), 0);
        assert!(shell.calls().is_empty());
        assert_eq!(
            sampler.rates().error(),
            "Connection failed: authentication failed: password rejected"
        );

        sampler.reconnect_flag().store(true, Ordering::SeqCst);
        assert_eq!(sampler.tick(), TickOutcome::WarmingUp);
        assert!(!sampler.is_auth_latched());
        assert_eq!(shell.connect_count(), 1);
    }

    #[test]
    fn test_auth_failure_mid_outage_is_notified() {
        let recorder = Recorder::default();
        let (sampler, shell) = sampler("eth0");
        let mut sampler = sampler.with_publisher(recorder.clone());
        shell.set_net_dev(net_dev_table(&[("eth0", 0, 0)]));
        shell.fail_next_connect(SessionError::Timeout("connect".into()));
        shell.fail_next_connect(SessionError::Auth("password rejected".into()));
        let t0 = Instant::now();

        assert!(matches!(sampler.tick_at(t0), TickOutcome::Faulted(_)));
        assert!(!sampler.is_auth_latched());
        assert!(matches!(sampler.tick_at(secs(t0, 1)), TickOutcome::Faulted(_)));
        assert!(sampler.is_auth_latched());
        assert_eq!(sampler.tick_at(secs(t0, 2)), TickOutcome::Suspended);

        let errors = recorder.errors.lock().unwrap();
        assert_eq!(
            *errors,
            vec![
                "Connection failed: timed out: connect".to_string(),
                "Connection failed: authentication failed: password rejected".to_string(),
            ]
        );
    }

    #[test]
    fn test_run_exits_when_stopped() {
        let (mut sampler, shell) = sampler("eth0");
        shell.set_net_dev(net_dev_table(&[("eth0", 0, 0)]));
        let stop = AtomicBool::new(true);

        sampler.run(&stop);
        assert_eq!(shell.connect_count(), 0);
        assert!(!shell.is_connected());
    }

    #[test]
    fn test_sleep_until_returns_on_stop() {
        let stop = AtomicBool::new(true);
        let start = Instant::now();
        sleep_until(start + Duration::from_secs(60), &stop);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
