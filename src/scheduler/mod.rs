//! Ingest scheduler
//!
//! Fires a job on a fixed cadence without awaiting it, so one slow cycle
//! can never stall the timer. Overlap control is layered on top of the
//! job itself via [`single_flight`], not built into the scheduler.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Boxed future a scheduled job resolves to
pub type JobFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A cloneable factory producing one run of the job per tick
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Build a [`JobFn`] from an async closure
pub fn job_fn<F, Fut>(f: F) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Marker a single-flight job resolves with when a tick is dropped
/// because the previous run is still active. The scheduler recognizes it
/// and books a skip instead of a failure.
#[derive(Debug, thiserror::Error)]
#[error("previous run still active")]
pub struct TickSkipped;

/// How a single tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::Success => write!(f, "success"),
            TickOutcome::Failure => write!(f, "failure"),
            TickOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct HealthInner {
    ticks_fired: u64,
    successes: u64,
    failures: u64,
    skips: u64,
    consecutive_failures: u32,
    last_tick_at: Option<DateTime<Utc>>,
    last_outcome: Option<TickOutcome>,
    last_error: Option<String>,
}

/// Tick counters shared between the scheduler, the single-flight wrapper
/// and the quality surface
#[derive(Debug, Default)]
pub struct SchedulerHealth {
    inner: RwLock<HealthInner>,
}

/// Read-only copy of the current tick counters
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerHealthSnapshot {
    pub ticks_fired: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    pub consecutive_failures: u32,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
    pub last_error: Option<String>,
}

impl SchedulerHealth {
    pub fn new() -> Self {
        SchedulerHealth::default()
    }

    pub fn record_fired(&self) {
        let mut inner = self.write_inner();
        inner.ticks_fired += 1;
        inner.last_tick_at = Some(Utc::now());
    }

    pub fn record_success(&self) {
        let mut inner = self.write_inner();
        inner.successes += 1;
        inner.consecutive_failures = 0;
        inner.last_outcome = Some(TickOutcome::Success);
        inner.last_error = None;
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.write_inner();
        inner.failures += 1;
        inner.consecutive_failures += 1;
        inner.last_outcome = Some(TickOutcome::Failure);
        inner.last_error = Some(error.to_string());
    }

    /// A tick that fired but found the previous run still active
    pub fn record_skip(&self) {
        let mut inner = self.write_inner();
        inner.skips += 1;
        inner.last_outcome = Some(TickOutcome::Skipped);
    }

    pub fn snapshot(&self) -> SchedulerHealthSnapshot {
        let inner = match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        SchedulerHealthSnapshot {
            ticks_fired: inner.ticks_fired,
            successes: inner.successes,
            failures: inner.failures,
            skips: inner.skips,
            consecutive_failures: inner.consecutive_failures,
            last_tick_at: inner.last_tick_at,
            last_outcome: inner.last_outcome,
            last_error: inner.last_error,
        }
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, HealthInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Wrap a job so concurrent runs collapse to one.
///
/// When a tick fires while the previous run is still active, the new run
/// is dropped and the returned future resolves with [`TickSkipped`]. The
/// cadence is unaffected either way.
pub fn single_flight(label: &str, inner: JobFn) -> JobFn {
    let in_flight = Arc::new(AtomicBool::new(false));
    let label = label.to_string();
    Arc::new(move || {
        let in_flight = in_flight.clone();
        let inner = inner.clone();
        let label = label.clone();
        async move {
            if in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                warn!(job = %label, "tick skipped: previous run still active");
                return Err(TickSkipped.into());
            }
            let _reset = ResetOnDrop(in_flight);
            inner().await
        }
        .boxed()
    })
}

struct ResetOnDrop(Arc<AtomicBool>);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives a [`JobFn`] on a fixed interval.
///
/// The first tick fires one full interval after `start`. Each tick spawns
/// the job and moves on immediately; job errors are logged and counted but
/// never stop the timer. `start` and `stop` are idempotent.
pub struct IngestScheduler {
    label: String,
    job: JobFn,
    interval: Duration,
    health: Arc<SchedulerHealth>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl IngestScheduler {
    pub fn new(
        label: impl Into<String>,
        job: JobFn,
        interval: Duration,
        health: Arc<SchedulerHealth>,
    ) -> Self {
        IngestScheduler {
            label: label.into(),
            job,
            interval,
            health,
            timer: Mutex::new(None),
        }
    }

    pub fn health(&self) -> Arc<SchedulerHealth> {
        self.health.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer().is_some()
    }

    /// Begin ticking. Calling while already running leaves the existing
    /// timer untouched.
    pub fn start(&self) {
        let mut timer = self.lock_timer();
        if timer.is_some() {
            debug!(job = %self.label, "scheduler already running");
            return;
        }

        let job = self.job.clone();
        let health = self.health.clone();
        let label = self.label.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                health.record_fired();
                let job = job.clone();
                let health = health.clone();
                let label = label.clone();
                // Fire and forget: a slow run must not delay the next tick.
                tokio::spawn(async move {
                    match job().await {
                        Ok(()) => health.record_success(),
                        Err(e) if e.is::<TickSkipped>() => health.record_skip(),
                        Err(e) => {
                            error!(job = %label, error = %e, "scheduled job failed");
                            health.record_failure(&e.to_string());
                        }
                    }
                });
            }
        });

        *timer = Some(handle);
        info!(
            job = %self.label,
            interval_ms = self.interval.as_millis() as u64,
            "scheduler started"
        );
    }

    /// Stop ticking. Runs already spawned are left to finish on their own.
    pub fn stop(&self) {
        let mut timer = self.lock_timer();
        match timer.take() {
            Some(handle) => {
                handle.abort();
                info!(job = %self.label, "scheduler stopped");
            }
            None => debug!(job = %self.label, "scheduler already stopped"),
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
