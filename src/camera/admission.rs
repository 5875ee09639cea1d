//! Open/close admission lock.
//!
//! A single token guards opening and closing the device. An open takes the
//! token before asking the platform for the device and keeps it until the
//! platform reports the outcome; a close takes it before tearing down.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Binary semaphore with bounded acquisition.
#[derive(Clone, Default)]
pub struct AdmissionLock {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl AdmissionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the token, waiting at most `timeout`. Returns `None` on timeout.
    pub fn try_acquire_for(&self, timeout: Duration) -> Option<AdmissionGuard> {
        let (held, cvar) = &*self.inner;
        let held = held.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut held, _) = cvar
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *held {
            return None;
        }
        *held = true;
        Some(AdmissionGuard {
            lock: self.clone(),
            armed: true,
        })
    }

    /// Return the token. Releasing a free token is a no-op.
    pub fn release(&self) {
        let (held, cvar) = &*self.inner;
        *held.lock().unwrap_or_else(PoisonError::into_inner) = false;
        cvar.notify_one();
    }

    pub fn is_held(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AdmissionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionLock")
            .field("held", &self.is_held())
            .finish()
    }
}

/// Holds the token; releases it on drop, including during unwinding.
#[derive(Debug)]
pub struct AdmissionGuard {
    lock: AdmissionLock,
    armed: bool,
}

impl AdmissionGuard {
    /// Keep the token held past this guard. Whoever receives the outcome of
    /// the guarded operation must call [`AdmissionLock::release`].
    pub fn hand_off(mut self) {
        self.armed = false;
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.lock.release();
        }
    }
}
