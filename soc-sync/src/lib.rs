//! Synchronisation primitives for SoC clock-domain drivers
//!
//! Both the frequency-transition coordinator and the PHY controller keep
//! per-instance state that must never be observed half-updated by a
//! concurrent event. This crate provides the two pieces they are built on:
//!
//! - [NonReentrantMutex]: per-instance mutual exclusion on top of a
//!   `critical-section` implementation. Locking the same mutex again from
//!   inside its own critical section panics.
//! - [OnceFlag]: an atomic single-winner init cell. A failed initialisation
//!   attempt leaves the flag clear so a later caller can retry.
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![deny(missing_docs, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

use core::cell::{Cell, UnsafeCell};

mod once;

pub use once::{InitOutcome, OnceFlag};

/// A lock that can only be held once at a time.
///
/// The lock keeps the global critical section taken while it is held, and
/// tracks whether this particular instance is already locked so reentry can
/// be detected.
pub struct RawMutex {
    locked: Cell<bool>,
}

// Safety: `locked` is only accessed while the critical section is held.
unsafe impl Sync for RawMutex {}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex {
    /// Create a new, unlocked lock.
    pub const fn new() -> Self {
        Self {
            locked: Cell::new(false),
        }
    }

    /// Runs the callback with this lock locked.
    ///
    /// # Panics
    ///
    /// Panics if the lock is already held by the current context.
    pub fn lock_non_reentrant<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = LockGuard::new(self);
        f()
    }

    /// Returns `true` if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        critical_section::with(|_| self.locked.get())
    }
}

struct LockGuard<'a> {
    lock: &'a RawMutex,
    token: critical_section::RestoreState,
}

impl<'a> LockGuard<'a> {
    fn new(lock: &'a RawMutex) -> Self {
        // Safety: the matching release happens in `Drop`, or right below if
        // the lock turns out to be reentered.
        let token = unsafe { critical_section::acquire() };

        if lock.locked.replace(true) {
            unsafe { critical_section::release(token) };
            panic!("lock is not reentrant");
        }

        Self { lock, token }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.set(false);
        unsafe { critical_section::release(self.token) };
    }
}

/// A non-reentrant (panicking) mutex.
///
/// Largely equivalent to a `critical_section::Mutex<RefCell<T>>`, but the
/// data is owned by the instance and accessed through a closure only.
pub struct NonReentrantMutex<T> {
    lock_state: RawMutex,
    data: UnsafeCell<T>,
}

impl<T> NonReentrantMutex<T> {
    /// Create a new instance
    pub const fn new(data: T) -> Self {
        Self {
            lock_state: RawMutex::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Provide exclusive access to the protected data to the given closure.
    ///
    /// Calling this reentrantly will panic.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.lock_state
            .lock_non_reentrant(|| f(unsafe { &mut *self.data.get() }))
    }

    /// Returns `true` if some context is currently inside [Self::with].
    pub fn is_locked(&self) -> bool {
        self.lock_state.is_locked()
    }
}

unsafe impl<T: Send> Send for NonReentrantMutex<T> {}
unsafe impl<T: Send> Sync for NonReentrantMutex<T> {}
