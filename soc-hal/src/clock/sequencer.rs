//! # Ordered acquisition with rollback
//!
//! [acquire_all] brings an ordered list of [Resource]s up one after the
//! other. If resource `i` fails, resources `0..i` are released again in
//! strict reverse order before the error is returned, so a partial failure
//! never leaves anything acquired.
//!
//! On success the caller gets an [Acquired] guard that releases the whole
//! list in reverse order when dropped, exactly once. Drivers that keep the
//! resources up across calls [Acquired::commit] the guard and later release
//! (all or part of) the list themselves with [release_in_reverse].
//!
//! ```rust
//! use soc_hal::clock::sequencer::{acquire_all, Named};
//! # use soc_hal::{clock::Clock, Error, Rate};
//! # struct Gate(bool);
//! # impl Clock for Gate {
//! #     fn enable(&mut self) -> Result<(), Error> { self.0 = true; Ok(()) }
//! #     fn disable(&mut self) { self.0 = false; }
//! #     fn rate(&self) -> Rate { Rate::Hz(0) }
//! #     fn parent_rate(&self) -> Option<Rate> { None }
//! #     fn set_rate(&mut self, _: Rate) -> Result<(), Error> { Ok(()) }
//! # }
//! let mut clocks = [Named::new("axi", Gate(false)), Named::new("apb", Gate(false))];
//!
//! {
//!     let _enabled = acquire_all(&mut clocks).unwrap();
//!     // both clocks are running here
//! }
//!
//! // dropping the guard disabled them again
//! assert!(clocks.iter().all(|c| !c.clock().0));
//! ```

use core::ops::Deref;

use super::Clock;
use crate::Error;

/// Something that can be brought up and torn down again.
pub trait Resource {
    /// The name reported when acquisition fails.
    fn name(&self) -> &'static str;

    /// Brings the resource up.
    fn acquire(&mut self) -> Result<(), Error>;

    /// Tears down a previously acquired resource.
    fn release(&mut self);
}

/// A [Clock] with a name, acquired by enabling it.
#[derive(Debug)]
pub struct Named<C> {
    name: &'static str,
    clock: C,
}

impl<C> Named<C> {
    /// Attaches `name` to `clock`.
    pub const fn new(name: &'static str, clock: C) -> Self {
        Self { name, clock }
    }

    /// The wrapped clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> Resource for Named<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn acquire(&mut self) -> Result<(), Error> {
        self.clock.enable()
    }

    fn release(&mut self) {
        self.clock.disable()
    }
}

/// The failure reported by [acquire_all].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquireError {
    /// Position of the failing resource in the list.
    pub index: usize,
    /// Name of the failing resource.
    pub name: &'static str,
    /// Why it failed.
    pub cause: Error,
}

impl core::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Failed to acquire resource {} ({}): {}",
            self.index, self.name, self.cause
        )
    }
}

impl core::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Acquires every resource in `resources`, in order.
///
/// If one fails, everything acquired before it is released in reverse order
/// and the failing position, name and cause are returned.
pub fn acquire_all<R: Resource>(resources: &mut [R]) -> Result<Acquired<'_, R>, AcquireError> {
    for index in 0..resources.len() {
        if let Err(cause) = resources[index].acquire() {
            let name = resources[index].name();
            warn!(
                "Failed to acquire {} ({:?}), rolling back {} resource(s)",
                name, cause, index
            );

            release_in_reverse(&mut resources[..index]);
            return Err(AcquireError { index, name, cause });
        }

        trace!("Acquired {}", resources[index].name());
    }

    Ok(Acquired { resources })
}

/// Releases every resource in `resources`, last one first.
///
/// The caller guarantees all of them are currently acquired.
pub fn release_in_reverse<R: Resource>(resources: &mut [R]) {
    for resource in resources.iter_mut().rev() {
        trace!("Releasing {}", resource.name());
        resource.release();
    }
}

/// A fully acquired resource list.
///
/// Releases the list in reverse order when dropped.
#[must_use = "dropping the guard releases the resources immediately"]
pub struct Acquired<'a, R: Resource> {
    resources: &'a mut [R],
}

impl<'a, R: Resource> Acquired<'a, R> {
    /// Releases the resources now.
    pub fn release(self) {}

    /// Keeps the resources acquired past the guard's lifetime.
    ///
    /// The caller takes over the obligation to release them, for example
    /// with [release_in_reverse].
    pub fn commit(mut self) -> &'a mut [R] {
        core::mem::take(&mut self.resources)
    }
}

impl<R: Resource> Deref for Acquired<'_, R> {
    type Target = [R];

    fn deref(&self) -> &Self::Target {
        self.resources
    }
}

impl<R: Resource> Drop for Acquired<'_, R> {
    fn drop(&mut self) {
        release_in_reverse(self.resources);
    }
}
