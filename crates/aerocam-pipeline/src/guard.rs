//! Single-flight guard for capture cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// At most one cycle holds the guard at a time. The holder gets a child of
/// the shutdown token so the in-flight cycle can also be cancelled on its
/// own via [`CycleGuard::cancel_in_flight`].
#[derive(Debug, Default)]
pub struct CycleGuard {
    busy: AtomicBool,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or `None` if a cycle is already running.
    pub fn try_acquire(&self, shutdown: &CancellationToken) -> Option<CycleLease<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let token = shutdown.child_token();
        *self.slot() = Some(token.clone());
        Some(CycleLease { guard: self, token })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Cancel the running cycle, if any. Returns whether one was running.
    pub fn cancel_in_flight(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of holding the [`CycleGuard`]. Dropping it frees the guard and
/// clears the in-flight handle, on every exit path including unwinding.
#[derive(Debug)]
pub struct CycleLease<'a> {
    guard: &'a CycleGuard,
    token: CancellationToken,
}

impl CycleLease<'_> {
    /// Cancellation token for this cycle.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CycleLease<'_> {
    fn drop(&mut self) {
        *self.guard.slot() = None;
        self.guard.busy.store(false, Ordering::Release);
    }
}
