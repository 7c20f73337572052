//! Reentrancy guard for market entry points.
//!
//! `list`, `buy`, `cancel`, and the rescue hatches all invoke transfer
//! primitives on external ledgers — ledgers that could call back into the
//! market while a transfer is in flight. Each entry point takes the guard
//! on entry and releases it on every exit path; a nested entry observes
//! the in-flight flag and is rejected.

use carbonledger_types::{CarbonledgerError, Result};

/// Single-entry latch: at most one market entry point in flight at a time.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Take the latch.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::ReentrantCall`] if already held.
    pub fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(CarbonledgerError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    /// Release the latch. Must be called on every exit path of an entry
    /// point that took it, error paths included.
    pub fn exit(&mut self) {
        self.entered = false;
    }

    /// Whether an entry point is currently in flight.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
