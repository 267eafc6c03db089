//! Synchronization utilities for handling poisoned locks.

use std::sync::{Mutex, MutexGuard};

/// Extension trait for `Mutex` that ignores lock poisoning.
///
/// Lock poisoning occurs when a thread panics while holding a lock. In most
/// cases the original panic is the real error, not the poisoned lock state,
/// so callers that only mirror state (like the ledger's in-memory write log)
/// can safely take the guard anyway.
pub trait IgnoreLock<T> {
    /// Lock the mutex, ignoring any poison error.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_ignore_poison_returns_guard() {
        let mutex = Mutex::new(5_i32);
        {
            let guard = mutex.lock_ignore_poison();
            assert_eq!(*guard, 5);
        }
        *mutex.lock_ignore_poison() = 7;
        assert_eq!(*mutex.lock_ignore_poison(), 7);
    }
}
