//! Roster Poller - periodic integrity polling with auto-fix.
//!
//! Runs while an interested view is active: on each tick it calls the
//! integrity checker; when drift is found and auto-fix is enabled it calls
//! the reconciler and re-checks immediately after the correction. Polling
//! is cooperative and single-flight: one loop consumes ticks, so a new
//! check never starts while a previous check or fix for the scope is still
//! outstanding.
//!
//! The poller is an explicit state machine, [`PollerState`]
//! (`Idle | Polling | Fixing`), driven by timer ticks and external
//! enable/disable calls. The interval and the engine are injected rather
//! than ambient.
//!
//! ## Failure policy
//!
//! A failed or timed-out check backs off by skipping the next tick instead
//! of hammering a failing store. A timed-out auto-fix is retried at most
//! once within the tick, then backs off. Disabling auto-fix (or dropping
//! the poller) cancels the loop entirely.

#![deny(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roster_engine::{FixResult, RosterEngine};
use roster_types::{CampaignId, IntegrityReport};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Tick interval.
    pub interval: Duration,

    /// Whether auto-fix starts enabled. [`IntegrityPoller::start`] enables
    /// it regardless; this matters only for pollers constructed and
    /// observed before starting.
    pub auto_fix: bool,

    /// Actor recorded on audit entries for corrections this poller applies.
    pub actor: String,

    /// Upper bound for one check or fix call against the store.
    pub op_timeout: Duration,

    /// Restrict polling to one campaign; `None` sweeps all campaigns.
    pub scope: Option<CampaignId>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            auto_fix: true,
            actor: "integrity-poller".to_string(),
            op_timeout: Duration::from_secs(10),
            scope: None,
        }
    }
}

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Between ticks, or not running.
    Idle,
    /// A check is in flight.
    Polling,
    /// A correction is in flight.
    Fixing,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PollerState::Idle => "idle",
            PollerState::Polling => "polling",
            PollerState::Fixing => "fixing",
        };
        write!(f, "{name}")
    }
}

/// Events emitted by the poller.
#[derive(Debug, Clone)]
pub enum PollerEvent {
    /// A check finished; counts cover the polled scope.
    CheckCompleted { total: usize, invalid: usize },

    /// One campaign reported drift.
    DriftDetected {
        campaign_id: CampaignId,
        report: Box<IntegrityReport>,
    },

    /// Auto-fix ran.
    FixApplied { result: FixResult },

    /// A check or fix failed; the next tick will be skipped.
    CheckFailed { error: String },

    /// A tick was skipped due to a previous failure.
    BackedOff,

    /// The loop exited because auto-fix was disabled.
    Suspended,
}

/// Errors from poller lifecycle calls.
#[derive(Error, Debug)]
pub enum PollerError {
    #[error("poller is already running")]
    AlreadyRunning,
}

/// Periodic integrity poller over a [`RosterEngine`].
pub struct IntegrityPoller {
    engine: Arc<RosterEngine>,
    config: PollerConfig,
    auto_fix_enabled: Arc<AtomicBool>,
    state: Arc<RwLock<PollerState>>,
    event_tx: broadcast::Sender<PollerEvent>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IntegrityPoller {
    pub fn new(engine: Arc<RosterEngine>, config: PollerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let auto_fix_enabled = Arc::new(AtomicBool::new(config.auto_fix));
        Self {
            engine,
            config,
            auto_fix_enabled,
            state: Arc::new(RwLock::new(PollerState::Idle)),
            event_tx,
            handle: Mutex::new(None),
        }
    }

    /// Subscribe to poller events.
    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.event_tx.subscribe()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PollerState {
        *self.state.read().await
    }

    /// Whether auto-fix (and with it, polling) is enabled.
    pub fn auto_fix_enabled(&self) -> bool {
        self.auto_fix_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable auto-fix. Disabling cancels the poll loop at the
    /// next tick boundary; re-enabling requires [`start`](Self::start).
    pub fn set_auto_fix(&self, enabled: bool) {
        info!(enabled, "auto-fix toggled");
        self.auto_fix_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the poll loop is currently running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("poller handle lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start the poll loop. Enables auto-fix.
    pub fn start(&self) -> Result<(), PollerError> {
        let mut slot = self.handle.lock().expect("poller handle lock poisoned");
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(PollerError::AlreadyRunning);
        }

        self.auto_fix_enabled.store(true, Ordering::SeqCst);
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            scope = ?self.config.scope,
            "starting integrity poller"
        );

        let task = PollTask {
            engine: self.engine.clone(),
            config: self.config.clone(),
            enabled: self.auto_fix_enabled.clone(),
            state: self.state.clone(),
            event_tx: self.event_tx.clone(),
        };
        *slot = Some(tokio::spawn(task.run()));
        Ok(())
    }

    /// Stop the poll loop immediately.
    pub fn stop(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .expect("poller handle lock poisoned")
            .take()
        {
            handle.abort();
            info!("integrity poller stopped");
        }
    }
}

impl Drop for IntegrityPoller {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Everything the spawned loop owns.
struct PollTask {
    engine: Arc<RosterEngine>,
    config: PollerConfig,
    enabled: Arc<AtomicBool>,
    state: Arc<RwLock<PollerState>>,
    event_tx: broadcast::Sender<PollerEvent>,
}

impl PollTask {
    async fn run(self) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut backoff = false;

        loop {
            ticker.tick().await;

            if !self.enabled.load(Ordering::SeqCst) {
                debug!("auto-fix disabled, suspending polling");
                let _ = self.event_tx.send(PollerEvent::Suspended);
                break;
            }

            if backoff {
                debug!("skipping tick after previous failure");
                let _ = self.event_tx.send(PollerEvent::BackedOff);
                backoff = false;
                continue;
            }

            backoff = self.poll_once().await;
        }

        *self.state.write().await = PollerState::Idle;
    }

    /// One tick: check, fix if needed, re-check. Returns true when the next
    /// tick should be skipped.
    async fn poll_once(&self) -> bool {
        *self.state.write().await = PollerState::Polling;
        let reports = match self.check().await {
            Ok(reports) => reports,
            Err(error) => {
                warn!(error = %error, "integrity check failed");
                let _ = self.event_tx.send(PollerEvent::CheckFailed { error });
                *self.state.write().await = PollerState::Idle;
                return true;
            }
        };

        let invalid: Vec<&IntegrityReport> =
            reports.iter().filter(|report| !report.is_valid).collect();
        let _ = self.event_tx.send(PollerEvent::CheckCompleted {
            total: reports.len(),
            invalid: invalid.len(),
        });
        for report in &invalid {
            let _ = self.event_tx.send(PollerEvent::DriftDetected {
                campaign_id: report.campaign_id,
                report: Box::new((*report).clone()),
            });
        }

        let needs_fix = invalid.iter().any(|report| report.has_fixable_drift());
        let mut skip_next = false;
        if needs_fix {
            *self.state.write().await = PollerState::Fixing;
            match self.fix_with_one_retry().await {
                Ok(result) => {
                    info!(applied = result.applied, message = %result.message, "auto-fix ran");
                    let _ = self.event_tx.send(PollerEvent::FixApplied { result });

                    // A user mutation may have landed between our read and
                    // the fix; verify rather than assume success.
                    *self.state.write().await = PollerState::Polling;
                    match self.check().await {
                        Ok(after) => {
                            let invalid = after.iter().filter(|r| !r.is_valid).count();
                            let _ = self.event_tx.send(PollerEvent::CheckCompleted {
                                total: after.len(),
                                invalid,
                            });
                        }
                        Err(error) => {
                            warn!(error = %error, "re-check after fix failed");
                            let _ = self.event_tx.send(PollerEvent::CheckFailed { error });
                            skip_next = true;
                        }
                    }
                }
                Err(error) => {
                    warn!(error = %error, "auto-fix failed");
                    let _ = self.event_tx.send(PollerEvent::CheckFailed { error });
                    skip_next = true;
                }
            }
        }

        *self.state.write().await = PollerState::Idle;
        skip_next
    }

    async fn check(&self) -> Result<Vec<IntegrityReport>, String> {
        let call = async {
            match self.config.scope {
                Some(campaign_id) => self
                    .engine
                    .check_campaign(campaign_id)
                    .await
                    .map(|report| vec![report]),
                None => self.engine.check_all().await,
            }
        };
        match timeout(self.config.op_timeout, call).await {
            Ok(Ok(reports)) => Ok(reports),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!(
                "integrity check timed out after {:?}",
                self.config.op_timeout
            )),
        }
    }

    /// Run auto-fix with a bounded timeout; a timeout is retried exactly
    /// once within the tick.
    async fn fix_with_one_retry(&self) -> Result<FixResult, String> {
        for attempt in 0..2 {
            let call = self.engine.auto_fix(self.config.scope, &self.config.actor);
            match timeout(self.config.op_timeout, call).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(err)) => return Err(err.to_string()),
                Err(_) if attempt == 0 => {
                    warn!("auto-fix timed out, retrying once");
                }
                Err(_) => {}
            }
        }
        Err(format!(
            "auto-fix timed out after {:?} (retried once)",
            self.config.op_timeout
        ))
    }
}
