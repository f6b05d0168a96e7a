//! Scheduler tick for the batch loop.
//!
//! Two fixed delays drive the loop:
//! - pacing: after every folded batch, to bound load on the source
//! - backoff: after every failed fetch, before retrying the same cursor
//!
//! Both sleeps race a shutdown signal so the host can stop the loop between
//! batches without killing the process.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Outcome of a scheduler wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Delay elapsed; carry on
    Continue,
    /// Shutdown was requested while waiting
    Cancelled,
}

/// Requests a cooperative shutdown.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Ask every paired signal to stop at its next wait point.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another signal observing this handle.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        shutdown_channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Pends forever if the handle is
    /// dropped without triggering.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a paired shutdown handle and signal.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Paces the batch loop and backs off on source failures.
#[derive(Debug)]
pub struct Pacer {
    pacing_delay: Duration,
    backoff_delay: Duration,
    shutdown: ShutdownSignal,
    /// Failed fetches since the last success
    consecutive_failures: u32,
    /// Total time spent waiting
    total_wait: Duration,
}

impl Pacer {
    pub fn new(pacing_delay: Duration, backoff_delay: Duration, shutdown: ShutdownSignal) -> Self {
        if backoff_delay <= pacing_delay {
            warn!(
                pacing_ms = pacing_delay.as_millis() as u64,
                backoff_ms = backoff_delay.as_millis() as u64,
                "Backoff delay is not longer than pacing delay"
            );
        }
        Self {
            pacing_delay,
            backoff_delay,
            shutdown,
            consecutive_failures: 0,
            total_wait: Duration::ZERO,
        }
    }

    /// Wait the pacing delay after a successful batch.
    pub async fn pace(&mut self) -> Tick {
        self.consecutive_failures = 0;
        self.sleep(self.pacing_delay).await
    }

    /// Wait the backoff delay after a failed fetch.
    pub async fn backoff(&mut self) -> Tick {
        self.consecutive_failures += 1;
        debug!(
            consecutive_failures = self.consecutive_failures,
            backoff_ms = self.backoff_delay.as_millis() as u64,
            "Backing off"
        );
        self.sleep(self.backoff_delay).await
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }

    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Resolve once shutdown is requested.
    pub async fn cancelled(&mut self) {
        self.shutdown.wait().await
    }

    async fn sleep(&mut self, delay: Duration) -> Tick {
        if self.is_cancelled() {
            return Tick::Cancelled;
        }
        if delay.is_zero() {
            return Tick::Continue;
        }

        self.total_wait += delay;
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => Tick::Cancelled,
            _ = tokio::time::sleep(delay) => Tick::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pace_and_backoff_track_failures() {
        let mut pacer = Pacer::new(Duration::ZERO, Duration::from_millis(1), ShutdownSignal::never());
        assert_eq!(pacer.backoff().await, Tick::Continue);
        assert_eq!(pacer.backoff().await, Tick::Continue);
        assert_eq!(pacer.consecutive_failures(), 2);
        assert_eq!(pacer.pace().await, Tick::Continue);
        assert_eq!(pacer.consecutive_failures(), 0);
        assert_eq!(pacer.total_wait(), Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_long_sleep() {
        let (handle, signal) = shutdown_channel();
        let mut pacer = Pacer::new(Duration::from_secs(3600), Duration::from_secs(7200), signal);

        let started = Instant::now();
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.trigger();
        });

        assert_eq!(pacer.pace().await, Tick::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(60));
        trigger.await.unwrap();

        // Stays cancelled
        assert!(pacer.is_cancelled());
        assert_eq!(pacer.backoff().await, Tick::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, signal) = shutdown_channel();
        drop(handle);
        let mut pacer = Pacer::new(Duration::from_millis(1), Duration::from_millis(2), signal);
        assert_eq!(pacer.pace().await, Tick::Continue);
    }

    #[test]
    fn test_handle_creates_more_signals() {
        let (handle, first) = shutdown_channel();
        let second = handle.signal();
        assert!(!first.is_triggered());
        handle.trigger();
        assert!(first.is_triggered());
        assert!(second.is_triggered());
    }
}
