//! Trigger/throttle coordinator
//!
//! The [`SyncCoordinator`] sits between application lifecycle events and
//! the [`SyncEngine`](super::engine::SyncEngine). It receives
//! [`SyncTrigger`] events, applies per-trigger grace delays and a global
//! rate limit, and starts a cycle only when one is not already running.
//!
//! ## Flow
//!
//! ```text
//! lifecycle events ──→ mpsc::Receiver ──→ SyncCoordinator ──→ run_cycle()
//!                                              │
//!                                   in-flight / throttle / auth gates
//! ```
//!
//! Manual triggers bypass the rate limit entirely, useful for "sync now"
//! commands. Moving to the background pauses periodic syncing; returning
//! to the foreground resumes it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use trailmark_core::config::SchedulerConfig;
use trailmark_core::domain::SyncError;

use crate::engine::{SyncEngine, SyncReport};

/// Lifecycle and connectivity events that may start a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Process startup
    AppStart,
    /// Credentials became available
    Authenticated,
    /// Application returned to the foreground
    Foreground,
    /// Application moved to the background
    Background,
    /// Network connectivity came back
    NetworkRestored,
    /// Periodic timer tick
    Periodic,
    /// User pressed "sync now"
    Manual,
}

impl SyncTrigger {
    /// Stable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SyncTrigger::AppStart => "app_start",
            SyncTrigger::Authenticated => "authenticated",
            SyncTrigger::Foreground => "foreground",
            SyncTrigger::Background => "background",
            SyncTrigger::NetworkRestored => "network_restored",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Manual => "manual",
        }
    }
}

/// Anything that can run one synchronization cycle
///
/// The coordinator depends on this seam rather than on the engine
/// directly, so scheduling behavior is testable without remote I/O.
#[async_trait]
pub trait ISyncRunner: Send + Sync {
    /// Runs one cycle to completion
    async fn run_cycle(&self) -> Result<SyncReport, SyncError>;
}

#[async_trait]
impl ISyncRunner for SyncEngine {
    async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        SyncEngine::run_cycle(self).await
    }
}

/// Decides *when* a sync cycle may run
///
/// At most one cycle is in flight at any time; concurrent triggers while
/// a cycle runs are dropped, not queued. Non-manual triggers closer
/// together than the configured minimum interval are suppressed.
pub struct SyncCoordinator {
    runner: Arc<dyn ISyncRunner>,
    config: SchedulerConfig,
    /// Set while a cycle is in flight; claimed via compare-and-swap
    is_syncing: AtomicBool,
    /// Cleared while backgrounded so periodic ticks are ignored
    periodic_enabled: AtomicBool,
    /// When the last cycle actually started
    last_attempt: Mutex<Option<Instant>>,
    last_report: Mutex<Option<SyncReport>>,
}

impl SyncCoordinator {
    /// Creates a coordinator over the given runner
    pub fn new(runner: Arc<dyn ISyncRunner>, config: SchedulerConfig) -> Self {
        info!(
            min_interval_secs = config.min_sync_interval_secs,
            periodic_secs = config.periodic_interval_secs,
            "Creating sync coordinator"
        );
        Self {
            runner,
            config,
            is_syncing: AtomicBool::new(false),
            periodic_enabled: AtomicBool::new(true),
            last_attempt: Mutex::new(None),
            last_report: Mutex::new(None),
        }
    }

    /// Handles one trigger: applies its grace delay, then attempts a cycle
    ///
    /// Returns `true` when a cycle actually ran.
    pub async fn handle_event(&self, trigger: SyncTrigger) -> bool {
        match self.note_event(trigger) {
            Some((delay_secs, bypass_throttle)) => {
                self.attempt_after(trigger, delay_secs, bypass_throttle).await
            }
            None => false,
        }
    }

    /// Applies the trigger's immediate side effects and decides whether a
    /// sync attempt should follow
    ///
    /// Returns the grace delay and throttle-bypass flag for the attempt,
    /// or `None` for triggers that never sync (backgrounding, periodic
    /// ticks while paused).
    fn note_event(&self, trigger: SyncTrigger) -> Option<(u64, bool)> {
        debug!(trigger = trigger.name(), "Sync trigger received");

        match trigger {
            SyncTrigger::Background => {
                // Backgrounding never syncs, it just pauses the timer
                self.periodic_enabled.store(false, Ordering::Release);
                debug!("Periodic sync paused while backgrounded");
                None
            }
            SyncTrigger::Foreground => {
                self.periodic_enabled.store(true, Ordering::Release);
                Some((self.config.foreground_delay_secs, false))
            }
            SyncTrigger::AppStart => Some((self.config.startup_delay_secs, false)),
            SyncTrigger::NetworkRestored => {
                Some((self.config.network_restore_delay_secs, false))
            }
            SyncTrigger::Periodic => {
                if !self.periodic_enabled.load(Ordering::Acquire) {
                    debug!("Periodic tick ignored while backgrounded");
                    return None;
                }
                Some((0, false))
            }
            SyncTrigger::Authenticated => Some((0, false)),
            SyncTrigger::Manual => Some((0, true)),
        }
    }

    /// Waits out the grace delay, then attempts a cycle
    ///
    /// The app may move to the background while the delay runs; in that
    /// case the pending attempt is dropped.
    async fn attempt_after(
        &self,
        trigger: SyncTrigger,
        delay_secs: u64,
        bypass_throttle: bool,
    ) -> bool {
        if delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            if !self.periodic_enabled.load(Ordering::Acquire) {
                debug!(
                    trigger = trigger.name(),
                    "Delayed sync dropped, app backgrounded during the delay"
                );
                return false;
            }
        }
        self.try_sync(bypass_throttle).await
    }

    /// Attempts to run one cycle, honoring the in-flight and rate gates
    ///
    /// Returns `true` when a cycle ran, `false` when it was suppressed.
    pub async fn try_sync(&self, bypass_throttle: bool) -> bool {
        // Claim the in-flight slot; losers are dropped, not queued
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in flight, trigger dropped");
            return false;
        }

        if !bypass_throttle && self.within_min_interval() {
            debug!("Sync suppressed by minimum interval");
            self.is_syncing.store(false, Ordering::Release);
            return false;
        }

        if let Ok(mut last) = self.last_attempt.lock() {
            *last = Some(Instant::now());
        }

        let ran = match self.runner.run_cycle().await {
            Ok(report) => {
                if let Ok(mut slot) = self.last_report.lock() {
                    *slot = Some(report);
                }
                true
            }
            Err(SyncError::AuthenticationRequired) => {
                debug!("Sync skipped, not authenticated");
                false
            }
            Err(err) => {
                warn!("Sync cycle failed: {err}");
                false
            }
        };

        self.is_syncing.store(false, Ordering::Release);
        ran
    }

    fn within_min_interval(&self) -> bool {
        let min = Duration::from_secs(self.config.min_sync_interval_secs);
        match self.last_attempt.lock() {
            Ok(last) => last.map_or(false, |at| at.elapsed() < min),
            Err(_) => false,
        }
    }

    /// Whether a cycle is currently running
    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    /// Report of the most recent completed cycle, if any
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().ok().and_then(|slot| slot.clone())
    }

    /// Main event loop
    ///
    /// Consumes triggers from the channel and fires [`SyncTrigger::Periodic`]
    /// on the configured interval. Attempts with a grace delay run on their
    /// own task, so a `Background` event arriving mid-delay is still seen
    /// and cancels the pending attempt. Terminates when the sender side of
    /// the channel is dropped.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SyncTrigger>) {
        info!("Sync coordinator starting");

        let mut periodic =
            tokio::time::interval(Duration::from_secs(self.config.periodic_interval_secs));
        // The first tick completes immediately; startup is AppStart's job
        periodic.tick().await;

        loop {
            tokio::select! {
                trigger = events.recv() => {
                    match trigger {
                        Some(trigger) => match self.note_event(trigger) {
                            Some((delay_secs, bypass)) if delay_secs > 0 => {
                                let this = Arc::clone(&self);
                                tokio::spawn(async move {
                                    this.attempt_after(trigger, delay_secs, bypass).await;
                                });
                            }
                            Some((_, bypass)) => {
                                self.attempt_after(trigger, 0, bypass).await;
                            }
                            None => {}
                        },
                        None => {
                            info!("Trigger channel closed, coordinator shutting down");
                            break;
                        }
                    }
                }

                _ = periodic.tick() => {
                    self.handle_event(SyncTrigger::Periodic).await;
                }
            }
        }

        info!("Sync coordinator stopped");
    }
}
