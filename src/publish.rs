//! Publisher boundary.
//!
//! The sampler is the only writer of [`SharedRates`]; presentation code
//! reads snapshots on its own schedule and may additionally register a
//! [`Publisher`] to be notified once per tick. [`Monitor`] runs a sampler
//! on a background thread and hands back a [`MonitorHandle`].

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collector::RemoteShell;
use crate::model::RateSample;
use crate::sampler::Sampler;

/// What a presentation collaborator sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Last good rate sample. Kept through outages.
    pub latest: Option<RateSample>,
    /// Error text of the current outage; empty when healthy.
    pub error: String,
    /// Selected interface name or pattern label.
    pub interface: Option<String>,
    /// Completed ticks, successful or not.
    pub ticks: u64,
}

impl MonitorSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.error.is_empty()
    }
}

/// Lock-protected latest state, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct SharedRates {
    inner: Arc<RwLock<MonitorSnapshot>>,
}

impl SharedRates {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MonitorSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MonitorSnapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.read().clone()
    }

    pub fn latest(&self) -> Option<RateSample> {
        self.read().latest
    }

    pub fn error(&self) -> String {
        self.read().error.clone()
    }

    /// Stores a new sample and clears the error text in one step.
    pub(crate) fn publish(&self, sample: RateSample) {
        let mut state = self.write();
        state.latest = Some(sample);
        state.error.clear();
    }

    pub(crate) fn clear_error(&self) {
        self.write().error.clear();
    }

    pub(crate) fn set_error(&self, message: String) {
        self.write().error = message;
    }

    pub(crate) fn set_interface(&self, interface: Option<String>) {
        self.write().interface = interface;
    }

    pub(crate) fn count_tick(&self) {
        let mut state = self.write();
        state.ticks = state.ticks.saturating_add(1);
    }
}

/// Push notification hook, called on the sampler thread.
///
/// Implementations must return quickly; the sampler waits for them.
pub trait Publisher: Send {
    /// Called once at the end of every tick.
    fn on_tick(&self, snapshot: &MonitorSnapshot);

    /// Called once at the start of each outage, when error notifications
    /// are enabled.
    fn on_error(&self, _message: &str) {}
}

/// Tracks outage episodes so the first failure of each one can be
/// reported exactly once.
#[derive(Debug, Default)]
pub struct OutageTracker {
    failures: u64,
}

impl OutageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed tick. Returns true when it starts a new outage.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.failures == 1
    }

    /// Records a successful tick. Returns the number of failed ticks when
    /// this ends an outage.
    pub fn record_success(&mut self) -> Option<u64> {
        let failures = std::mem::take(&mut self.failures);
        (failures > 0).then_some(failures)
    }
}

/// Starts samplers on a background thread.
pub struct Monitor;

impl Monitor {
    /// Moves `sampler` onto a dedicated thread running its loop.
    pub fn spawn<S: RemoteShell + 'static>(mut sampler: Sampler<S>) -> io::Result<MonitorHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let rates = sampler.rates();
        let reconnect = sampler.reconnect_flag();

        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("aptraffic-sampler".into())
            .spawn(move || sampler.run(&thread_stop))?;

        Ok(MonitorHandle {
            rates,
            stop,
            reconnect,
            thread: Some(thread),
        })
    }
}

/// Control handle for a running [`Monitor`].
///
/// Dropping the handle stops the sampler and waits for its thread.
pub struct MonitorHandle {
    rates: SharedRates,
    stop: Arc<AtomicBool>,
    reconnect: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.rates.snapshot()
    }

    pub fn rates(&self) -> SharedRates {
        self.rates.clone()
    }

    /// The cooperative stop flag, e.g. for a signal handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Lifts an authentication latch; the next tick dials again.
    pub fn request_reconnect(&self) {
        info!("Reconnect requested");
        self.reconnect.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the sampler and waits for the current tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            debug!("Waiting for sampler thread");
            if thread.join().is_err() {
                warn!("Sampler thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkStatus;
    use chrono::Utc;

    fn sample(down: f64) -> RateSample {
        RateSample {
            down_bps: down,
            up_bps: 0.0,
            link_status: LinkStatus::Up,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_clears_error() {
        let rates = SharedRates::new();
        rates.set_error("Connection failed: timed out".into());
        assert!(!rates.snapshot().is_healthy());

        rates.publish(sample(10.0));
        let snap = rates.snapshot();
        assert!(snap.is_healthy());
        assert_eq!(snap.latest.map(|s| s.down_bps), Some(10.0));
    }

    #[test]
    fn test_error_keeps_last_sample() {
        let rates = SharedRates::new();
        rates.publish(sample(10.0));
        rates.set_error("Connection failed: reset".into());

        let snap = rates.snapshot();
        assert_eq!(snap.error, "Connection failed: reset");
        assert_eq!(snap.latest.map(|s| s.down_bps), Some(10.0));
    }

    #[test]
    fn test_clones_share_state() {
        let rates = SharedRates::new();
        let reader = rates.clone();
        rates.set_interface(Some("eth0".into()));
        rates.count_tick();
        assert_eq!(reader.snapshot().interface.as_deref(), Some("eth0"));
        assert_eq!(reader.snapshot().ticks, 1);
    }

    #[test]
    fn test_outage_tracker_one_shot() {
        let mut outage = OutageTracker::new();
        assert_eq!(outage.record_success(), None);

        assert!(outage.record_failure());
        assert!(!outage.record_failure());
        assert!(!outage.record_failure());

        assert_eq!(outage.record_success(), Some(3));
        assert_eq!(outage.record_success(), None);
        assert!(outage.record_failure());
    }

    #[test]
    fn test_snapshot_serializes() {
        let rates = SharedRates::new();
        rates.publish(sample(1.5));
        let json = serde_json::to_value(rates.snapshot()).unwrap();
        assert_eq!(json["latest"]["link_status"], "up");
        assert_eq!(json["error"], "");
    }
}
