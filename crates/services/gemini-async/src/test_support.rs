//! Helpers for tests that touch process-global state.
//!
//! Environment mutation is only sound while no other thread reads the
//! environment, so every test using [`EnvGuard`] must be marked
//! `#[serial(env)]`.

/// Restores an environment variable to its previous value on drop.
pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    /// Sets `key` to `val` until the guard is dropped.
    #[must_use]
    pub fn set(key: &'static str, val: &str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: callers serialize env access with `#[serial(env)]`.
        unsafe { std::env::set_var(key, val) };
        Self { key, prev }
    }

    /// Unsets `key` until the guard is dropped.
    #[must_use]
    pub fn remove(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: callers serialize env access with `#[serial(env)]`.
        unsafe { std::env::remove_var(key) };
        Self { key, prev }
    }

    /// Unsets every key in `keys`, returning one guard per key.
    #[must_use]
    pub fn clear_all(keys: &[&'static str]) -> Vec<Self> {
        keys.iter().map(|k| Self::remove(k)).collect()
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(self.key, v) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}
