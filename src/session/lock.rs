use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::PreviewError;

/// Binary semaphore guarding the device handle across open and close.
///
/// Unlike a mutex guard, an [`AccessPermit`] can be moved into the session
/// state and released from whichever thread delivers the open result.
pub(crate) struct AccessLock {
    held: Mutex<bool>,
    released: Condvar,
}

/// Ownership of the access lock; released on drop
pub(crate) struct AccessPermit {
    lock: Arc<AccessLock>,
}

impl AccessLock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            held: Mutex::new(false),
            released: Condvar::new(),
        })
    }

    pub(crate) fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<AccessPermit, PreviewError> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|_| PreviewError::poisoned_lock("device access lock"))?;

        while *held {
            let now = Instant::now();
            if now >= deadline {
                return Err(PreviewError::LockTimeout(timeout));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| PreviewError::poisoned_lock("device access lock"))?;
            held = guard;
        }

        *held = true;
        Ok(AccessPermit { lock: self.clone() })
    }

    /// Wait for the lock with no deadline. Only poisoning fails.
    pub(crate) fn acquire_blocking(self: &Arc<Self>) -> Result<AccessPermit, PreviewError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| PreviewError::poisoned_lock("device access lock"))?;

        while *held {
            held = self
                .released
                .wait(held)
                .map_err(|_| PreviewError::poisoned_lock("device access lock"))?;
        }

        *held = true;
        Ok(AccessPermit { lock: self.clone() })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        self.released.notify_one();
    }
}

impl Drop for AccessPermit {
    fn drop(&mut self) {
        self.lock.release();
    }
}
