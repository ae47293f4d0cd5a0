//! Wakeup monitor between consumers and the grab thread.
//!
//! A pending flag guarded by the mutex records notifications that arrive
//! while nobody waits, so a consumer freeing space just before the grab
//! thread goes idle still wakes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Mutex + condvar pair with a sticky wakeup.
#[derive(Debug, Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    /// Creates a signal with no pending wakeup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the waiter, or the next one to arrive.
    pub fn notify(&self) {
        *self.pending.lock() = true;
        self.cond.notify_all();
    }

    /// Blocks until notified or `stop` is set, consuming the wakeup.
    pub fn wait(&self, stop: &AtomicBool) {
        let mut pending = self.pending.lock();
        while !*pending && !stop.load(Ordering::Acquire) {
            self.cond.wait(&mut pending);
        }
        *pending = false;
    }

    /// Blocks until notified or `timeout` elapses. Returns true if notified.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if !*pending {
            self.cond.wait_for(&mut pending, timeout);
        }
        std::mem::replace(&mut *pending, false)
    }
}
