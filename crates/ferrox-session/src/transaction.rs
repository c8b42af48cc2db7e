//! Transaction bookkeeping
//!
//! Inside a transaction, refreshes requested by operations are only marked
//! pending. They run once, when the outermost transaction ends.

use ferrox_types::{Error, Result};

/// Nesting depth and pending refreshes of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionState {
    depth: u32,
    suspended: bool,
    read_current_directory_pending: bool,
    read_directory_pending: bool,
}

/// Refresh flags saved across a reopen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRefresh {
    /// Re-read the current directory path
    pub read_current_directory: bool,
    /// Re-read the listing
    pub read_directory: bool,
}

impl TransactionState {
    /// Enter a transaction level; the outermost one starts with nothing pending
    pub fn begin(&mut self) -> u32 {
        if self.depth == 0 {
            self.read_current_directory_pending = false;
            self.read_directory_pending = false;
        }
        self.depth += 1;
        self.depth
    }

    /// Leave a transaction level, returning whether it was the outermost one
    pub fn end(&mut self) -> Result<bool> {
        if self.depth == 0 {
            return Err(Error::other("Can't end transaction, not in transaction"));
        }
        self.depth -= 1;
        Ok(self.depth == 0)
    }

    /// Current nesting depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Adopt another session's depth, dropping pending work
    pub fn align_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.read_current_directory_pending = false;
        self.read_directory_pending = false;
    }

    /// Whether refreshes are deferred right now
    pub fn in_transaction(&self) -> bool {
        self.depth > 0 && !self.suspended
    }

    /// Stop deferring while a reopen runs its own startup
    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    /// Defer a re-read of the current directory path
    pub fn mark_read_current_directory(&mut self) {
        self.read_current_directory_pending = true;
    }

    /// Defer a re-read of the listing
    pub fn mark_read_directory(&mut self) {
        self.read_directory_pending = true;
    }

    /// Whether the current directory path will be re-read
    pub fn read_current_directory_pending(&self) -> bool {
        self.read_current_directory_pending
    }

    /// Whether the listing will be re-read
    pub fn read_directory_pending(&self) -> bool {
        self.read_directory_pending
    }

    /// Clear the current directory flag once it was served
    pub fn clear_read_current_directory(&mut self) {
        self.read_current_directory_pending = false;
    }

    /// Pending work, for saving across a reopen
    pub fn pending(&self) -> PendingRefresh {
        PendingRefresh {
            read_current_directory: self.read_current_directory_pending,
            read_directory: self.read_directory_pending,
        }
    }

    /// Replace pending work
    pub fn set_pending(&mut self, pending: PendingRefresh) {
        self.read_current_directory_pending = pending.read_current_directory;
        self.read_directory_pending = pending.read_directory;
    }

    /// Drop pending work
    pub fn clear_pending(&mut self) {
        self.set_pending(PendingRefresh::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_outermost_end_reports_completion() {
        let mut state = TransactionState::default();
        assert_eq!(state.begin(), 1);
        assert_eq!(state.begin(), 2);
        assert!(!state.end().unwrap());
        assert!(state.in_transaction());
        assert!(state.end().unwrap());
        assert!(!state.in_transaction());
    }

    #[test]
    fn test_end_without_begin_fails() {
        let mut state = TransactionState::default();
        assert!(state.end().is_err());
    }

    #[test]
    fn test_outermost_begin_clears_pending() {
        let mut state = TransactionState::default();
        state.mark_read_directory();
        state.begin();
        assert!(!state.read_directory_pending());
        state.mark_read_current_directory();
        state.begin();
        assert!(state.read_current_directory_pending());
    }

    #[test]
    fn test_suspension_disables_deferral() {
        let mut state = TransactionState::default();
        state.begin();
        state.set_suspended(true);
        assert!(!state.in_transaction());
        state.set_suspended(false);
        assert!(state.in_transaction());
    }
}
