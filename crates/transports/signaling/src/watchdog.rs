//! Resettable single-shot countdown used for heartbeat pings
//!
//! The watchdog owns at most one pending timer task. Arming it again aborts the
//! pending task first, so an expiry is never queued behind another one.
//!
//! Every arm is numbered and the callback receives the number of the countdown
//! that fired. An expiry that was already delivered before a re-arm can be
//! recognised with [`Watchdog::is_current`].

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Callback invoked with the arm number when the countdown expires
pub type ExpiryCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Cancellable, resettable countdown timer
pub struct Watchdog {
    callback: ExpiryCallback,
    timeout: Option<Duration>,
    pending: Option<JoinHandle<()>>,
    arms: u64,
}

impl Watchdog {
    /// Create a disabled watchdog
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            timeout: None,
            pending: None,
            arms: 0,
        }
    }

    /// Arm the countdown with `timeout`, replacing any pending expiry and
    /// any previously configured timeout
    pub fn enable(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
        self.arm(timeout);
    }

    /// Re-arm with the configured timeout; no-op while disabled
    pub fn reset(&mut self) {
        if let Some(timeout) = self.timeout {
            self.arm(timeout);
        }
    }

    /// Cancel the pending expiry and forget the timeout
    pub fn disable(&mut self) {
        self.timeout = None;
        self.cancel();
    }

    /// Whether `enable` has been called since the last `disable`
    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// Whether `arm` is the latest countdown and the watchdog is still enabled
    pub fn is_current(&self, arm: u64) -> bool {
        self.is_enabled() && arm == self.arms
    }

    /// Configured timeout, if enabled
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn arm(&mut self, timeout: Duration) {
        self.cancel();
        self.arms += 1;

        let arm = self.arms;
        let callback = Arc::clone(&self.callback);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            trace!(arm, "Watchdog expired after {:?}", timeout);
            callback(arm);
        }));
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("timeout", &self.timeout)
            .field("armed", &self.pending.is_some())
            .finish()
    }
}
