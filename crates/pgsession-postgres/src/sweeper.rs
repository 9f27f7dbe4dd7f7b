//! Background expiration sweep
//!
//! The sweeper is a tokio task that deletes expired sessions on a fixed
//! interval. Failures are handed to the host through [`SweepErrors`] as a
//! rendezvous: the task does not start another sweep until the host has
//! received the previous error. A host that stops draining the channel stops
//! the sweep.

use async_trait::async_trait;
use pgsession_core::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

/// Something that can delete expired sessions in one statement
#[async_trait]
pub trait ExpiredDeletion: Send + Sync + 'static {
    /// Delete every expired session, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// Lifecycle of the sweeper
///
/// `Stopped -> Running -> Stopped`. A stopped sweeper is never restarted;
/// build a new store to resume periodic cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    Stopped,
    Running,
}

/// Receiving half of the sweep error channel
///
/// Must be drained for as long as the store lives, or the sweep stalls.
#[derive(Debug)]
pub struct SweepErrors {
    rx: mpsc::Receiver<Error>,
}

impl SweepErrors {
    /// Wait for the next sweep failure
    ///
    /// Returns `None` once the sweeper has exited (or was never started).
    pub async fn recv(&mut self) -> Option<Error> {
        self.rx.recv().await
    }

    /// Take a pending sweep failure without waiting
    pub fn try_recv(&mut self) -> Option<Error> {
        self.rx.try_recv().ok()
    }
}

/// Create the sweep error channel. One slot: the sender waits on the second
/// reservation until the host has taken the first error.
pub(crate) fn error_channel() -> (mpsc::Sender<Error>, SweepErrors) {
    let (tx, rx) = mpsc::channel(1);
    (tx, SweepErrors { rx })
}

/// Handle to the background sweep task
pub(crate) struct Sweeper {
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Sweeper {
    /// A sweeper that was never started
    pub fn idle() -> Self {
        Self {
            stop_tx: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop
    ///
    /// Dropping the returned handle stops the loop as well.
    pub fn spawn<D: ExpiredDeletion>(
        target: Arc<D>,
        interval: Duration,
        errors: mpsc::Sender<Error>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();

        tracing::info!(interval_ms = interval.as_millis() as u64, "Starting session sweeper");
        tokio::spawn(sweep_loop(target, interval, errors, stop_rx));

        Self {
            stop_tx: Mutex::new(Some(stop_tx)),
        }
    }

    pub fn state(&self) -> SweeperState {
        let guard = self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) if !tx.is_closed() => SweeperState::Running,
            _ => SweeperState::Stopped,
        }
    }

    /// Signal the loop to exit. No-op unless running; never blocks.
    ///
    /// A sweep already in flight is not cancelled, only future ticks.
    pub fn stop(&self) {
        let stop_tx = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(tx) = stop_tx {
            // Err means the loop is already gone
            let _ = tx.send(());
        }
    }
}

async fn sweep_loop<D: ExpiredDeletion>(
    target: Arc<D>,
    interval: Duration,
    errors: mpsc::Sender<Error>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Fires on stop() and when the handle is dropped
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                match target.delete_expired().await {
                    Ok(deleted) => {
                        tracing::debug!(deleted, "Swept expired sessions");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Session sweep failed");
                        tokio::select! {
                            _ = &mut stop_rx => break,
                            delivered = deliver(&errors, e) => {
                                if !delivered {
                                    tracing::error!(
                                        "Sweep error receiver dropped; further sweep errors are only logged"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    tracing::info!("Session sweeper stopped");
}

/// Hand an error to the host and wait until it has been received.
///
/// Returns false if the receiver has been dropped.
async fn deliver(errors: &mpsc::Sender<Error>, error: Error) -> bool {
    match errors.reserve().await {
        Ok(permit) => permit.send(error),
        Err(_) => return false,
    }

    // The slot frees up only once the host has taken the error
    errors.reserve().await.is_ok()
}
