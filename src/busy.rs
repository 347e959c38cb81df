//! Exclusive-operation token for destructive multi-step work.
//!
//! CSV imports, profile overwrites and database-file restores must never
//! interleave. Each of them acquires the [`BusyLock`] before touching the
//! store; a second caller is rejected immediately with
//! [`Error::OperationInProgress`] instead of being queued. The returned
//! guard resets the state on drop, so error paths release it for free.

use crate::errors::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// What the process is currently doing with the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BusyState {
    /// No exclusive operation is running
    #[default]
    Idle,
    /// A CSV import batch is writing transactions
    Importing,
    /// A profile overwrite or database-file restore is running
    Restoring,
}

impl std::fmt::Display for BusyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Importing => "import",
            Self::Restoring => "restore",
        };
        write!(f, "{label}")
    }
}

/// Process-wide token gating destructive operations.
#[derive(Clone, Debug, Default)]
pub struct BusyLock {
    state: Arc<Mutex<BusyState>>,
}

impl BusyLock {
    /// Creates a lock in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, for status displays.
    #[must_use]
    pub fn current(&self) -> BusyState {
        *self.lock()
    }

    /// Claims the token for `next`, rejecting the call when any exclusive
    /// operation is already running.
    ///
    /// # Errors
    /// [`Error::OperationInProgress`] naming the running operation.
    pub fn acquire(&self, next: BusyState) -> Result<BusyGuard> {
        let mut state = self.lock();
        if *state != BusyState::Idle {
            return Err(Error::OperationInProgress {
                current: state.to_string(),
            });
        }
        *state = next;
        drop(state);
        Ok(BusyGuard {
            state: Arc::clone(&self.state),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusyState> {
        // A poisoned lock only means a panicking holder; the state itself
        // stays consistent because the guard resets it on unwind.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII token proving exclusive access; resets the lock to idle on drop.
#[derive(Debug)]
pub struct BusyGuard {
    state: Arc<Mutex<BusyState>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = BusyState::Idle;
    }
}
