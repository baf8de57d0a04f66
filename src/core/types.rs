//! Common types used across inkblock modules.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reserved identity addressing the host editor.
pub const SYSTEM_IDENTITY: &str = "system";

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Whether an identity is reserved for the host.
pub fn is_reserved_identity(identity: &str) -> bool {
    identity == SYSTEM_IDENTITY
}

// Plugin hooks and handlers run under `catch_unwind`, so a poisoned lock can
// only come from a panic between two consistent writes. The data is still
// valid; keep serving it.

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Render a caught panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_identity() {
        assert!(is_reserved_identity("system"));
        assert!(!is_reserved_identity("System"));
        assert!(!is_reserved_identity("spellcheck"));
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom");

        let caught = std::panic::catch_unwind(|| panic!("{} failed", "render")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "render failed");
    }

    #[test]
    fn test_poisoned_lock_still_readable() {
        let lock = std::sync::Arc::new(RwLock::new(7));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.write().unwrap();
            panic!("poison");
        })
        .join();

        assert!(lock.is_poisoned());
        assert_eq!(*read_lock(&lock), 7);
    }
}
