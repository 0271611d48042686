use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked.
///
/// Every critical section in this crate leaves its data consistent before
/// any call that could panic, so a poisoned lock still guards valid state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
