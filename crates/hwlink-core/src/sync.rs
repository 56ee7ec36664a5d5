use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a short-lived synchronous mutex, recovering from poisoning.
///
/// Guards taken here are never held across an `.await`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
