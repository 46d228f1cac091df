//! Waiting out a peer's migration lock.

use crate::error::{EngineError, EngineResult};
use ev_core::EvolveConfig;
use ev_db::Session;
use ev_meta::LockCoordinator;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How a wait for the lock ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// The lock record disappeared.
    Released,
    /// The caller cancelled the wait.
    Cancelled,
}

/// Polling cadence and upper bound for [`wait_for_release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    /// `None` waits until the lock is released or the wait is cancelled.
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    pub fn from_config(config: &EvolveConfig) -> Self {
        Self {
            poll_interval: config.lock_poll_interval(),
            timeout: config.lock_wait_timeout(),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Poll until no lock record exists.
///
/// The first check happens one poll interval after the call. Cancellation and
/// the deadline are raced against each poll as well as the gaps between
/// polls; an abandoned poll is dropped mid-flight.
pub async fn wait_for_release<L: LockCoordinator + ?Sized>(
    lock: &L,
    session: &dyn Session,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> EngineResult<LockWait> {
    let started = Instant::now();
    let deadline = policy.timeout.map(|t| started + t);

    let mut interval = tokio::time::interval(policy.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; start counting from now instead
    interval.reset();

    loop {
        let held = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("Stopped waiting for the migration lock: cancelled");
                return Ok(LockWait::Cancelled);
            }
            _ = sleep_until(deadline) => {
                return Err(EngineError::LockWaitTimeout { waited: started.elapsed() });
            }
            held = poll_after_tick(lock, session, &mut interval) => held?,
        };
        if !held {
            log::debug!("Migration lock released after {:?}", started.elapsed());
            return Ok(LockWait::Released);
        }
        log::debug!("Migration lock still held, waiting");
    }
}

async fn poll_after_tick<L: LockCoordinator + ?Sized>(
    lock: &L,
    session: &dyn Session,
    interval: &mut tokio::time::Interval,
) -> EngineResult<bool> {
    interval.tick().await;
    Ok(lock.is_held(session).await?)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
