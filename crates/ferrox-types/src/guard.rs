//! Fatal-error capture around calls into caller-supplied callbacks
//!
//! Each session owns one [`GuardSlot`]. Entering the slot yields a
//! [`CallbackGuard`]; only the outermost guard is real; nested ones are no-ops.
//! While a guard is active, a fatal error raised by a callback is stored in the
//! slot and replaced by a silent [`Error::CallbackGuardAbort`]. The owner of the
//! real guard gets the stored error back from [`CallbackGuard::verify`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{Error, Result};

/// Single-slot latch shared by all guarded calls of one session
#[derive(Debug, Default)]
pub struct GuardSlot {
    active: AtomicBool,
    captured: Mutex<Option<Error>>,
}

impl GuardSlot {
    /// Create an idle slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a real guard currently holds the slot
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Enter a guarded region
    pub fn enter(&self) -> CallbackGuard<'_> {
        let real = self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        CallbackGuard { slot: self, real }
    }

    /// Route an error raised inside a guarded region
    ///
    /// Fatal errors are stored (the first one wins) and turned into a silent
    /// abort. Anything else, or any error outside a guarded region, is
    /// returned unchanged.
    pub fn capture(&self, error: Error) -> Error {
        if !self.is_active() || !error.is_fatal() {
            return error;
        }
        let mut captured = self.captured.lock().unwrap_or_else(PoisonError::into_inner);
        if captured.is_none() {
            *captured = Some(error);
        }
        Error::CallbackGuardAbort
    }

    /// Run a callback inside a guard and verify the slot on the way out
    pub fn guarded<T>(&self, callback: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.enter();
        let result = callback().map_err(|error| self.capture(error));
        guard.verify()?;
        result
    }

    fn take_captured(&self) -> Option<Error> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Scoped hold on a [`GuardSlot`]
///
/// Dropping the guard releases the slot and discards any captured error.
#[derive(Debug)]
#[must_use = "a guard releases its slot when dropped"]
pub struct CallbackGuard<'a> {
    slot: &'a GuardSlot,
    real: bool,
}

impl CallbackGuard<'_> {
    /// Whether this is the outermost guard
    pub fn is_real(&self) -> bool {
        self.real
    }

    /// Release the slot and re-raise a captured fatal error
    pub fn verify(self) -> Result<()> {
        if !self.real {
            return Ok(());
        }
        match self.slot.take_captured() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Release the slot without checking for a captured error
    pub fn dismiss(self) {}
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        if self.real {
            self.slot.take_captured();
            self.slot.active.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_outermost_guard_is_real() {
        let slot = GuardSlot::new();
        let outer = slot.enter();
        let inner = slot.enter();
        assert!(outer.is_real());
        assert!(!inner.is_real());
        drop(inner);
        assert!(slot.is_active());
        drop(outer);
        assert!(!slot.is_active());
    }

    #[test]
    fn test_fatal_outside_guard_is_untouched() {
        let slot = GuardSlot::new();
        let error = slot.capture(Error::fatal("lost"));
        assert_eq!(error, Error::fatal("lost"));
    }

    #[test]
    fn test_command_errors_pass_through_guard() {
        let slot = GuardSlot::new();
        let result: Result<()> = slot.guarded(|| Err(Error::command("denied")));
        assert_eq!(result, Err(Error::command("denied")));
        assert!(!slot.is_active());
    }

    #[test]
    fn test_nested_fatal_surfaces_once() {
        let slot = GuardSlot::new();
        let result: Result<()> = slot.guarded(|| {
            let inner: Result<()> = slot.guarded(|| Err(Error::fatal("first")));
            assert_eq!(inner, Err(Error::CallbackGuardAbort));
            let again: Result<()> = slot.guarded(|| Err(Error::fatal("second")));
            assert_eq!(again, Err(Error::CallbackGuardAbort));
            Ok(())
        });
        assert_eq!(result, Err(Error::fatal("first")));

        let after: Result<u8> = slot.guarded(|| Ok(7));
        assert_eq!(after, Ok(7));
    }

    #[test]
    fn test_dismiss_discards_capture() {
        let slot = GuardSlot::new();
        let guard = slot.enter();
        assert_eq!(slot.capture(Error::fatal("lost")), Error::CallbackGuardAbort);
        guard.dismiss();
        assert!(!slot.is_active());
        assert!(slot.guarded(|| Ok(())).is_ok());
    }
}
