//! Synchronization utilities for robust mutex handling

use std::sync::LockResult;

/// Convert a poisoned lock into an application error
///
/// A poisoned lock means a panic happened while the guard was held; callers
/// map it into their own fault variant instead of propagating the panic.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use websecscan::core::sync::handle_mutex_poison;
/// use websecscan::session::SessionError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |detail| SessionError::InternalFault { detail })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock: {}",
            poison_err
        ))
    })
}
