//! Serial or concurrent access to per-thread state.
//!
//! A thread context is either owned by one walker thread (serial) or
//! shared between the walker and the jobs it spawned (concurrent). The
//! data sits behind a mutex in both cases; serial access goes through
//! `&mut` and never locks.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Guarded<T>(Mutex<T>);

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    /// Concurrent access, locks.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Serial access, no locking.
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        f(self.0.get_mut().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.0.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}
