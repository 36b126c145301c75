//! # Clock lines
//!
//! A [Clock] is a handle to one named, independently controllable clock line.
//! Handles are obtained from a [ClockProvider] by name, relative to the
//! device node that references them. Dropping a handle releases it, so a
//! handle can never be released twice or used after release.
//!
//! Enabling a clock is fallible and counted by the provider: every
//! successful [Clock::enable] must eventually be balanced by one
//! [Clock::disable]. The [sequencer] module does this bookkeeping for
//! ordered groups of clocks.

use crate::{Error, Rate};

pub mod sequencer;

/// A handle to a clock line.
pub trait Clock {
    /// Prepares and enables the clock.
    fn enable(&mut self) -> Result<(), Error>;

    /// Disables and unprepares the clock. Balances one successful
    /// [Self::enable].
    fn disable(&mut self);

    /// The current rate of the clock.
    fn rate(&self) -> Rate;

    /// The current rate of the clock's parent, `None` for root clocks.
    fn parent_rate(&self) -> Option<Rate>;

    /// Requests a new rate.
    fn set_rate(&mut self, rate: Rate) -> Result<(), Error>;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn enable(&mut self) -> Result<(), Error> {
        (**self).enable()
    }

    fn disable(&mut self) {
        (**self).disable()
    }

    fn rate(&self) -> Rate {
        (**self).rate()
    }

    fn parent_rate(&self) -> Option<Rate> {
        (**self).parent_rate()
    }

    fn set_rate(&mut self, rate: Rate) -> Result<(), Error> {
        (**self).set_rate(rate)
    }
}

/// Looks up clocks by name.
pub trait ClockProvider {
    /// The device node clocks are looked up from.
    type Node: crate::opp::DeviceNode + ?Sized;

    /// The handle type returned by [Self::get].
    type Clock: Clock;

    /// Looks up the clock called `name` referenced by `node`.
    ///
    /// Returns [Error::NotFound] if the node references no such clock.
    fn get(&self, node: &Self::Node, name: &str) -> Result<Self::Clock, Error>;
}

impl<P: ClockProvider + ?Sized> ClockProvider for &P {
    type Node = P::Node;
    type Clock = P::Clock;

    fn get(&self, node: &Self::Node, name: &str) -> Result<Self::Clock, Error> {
        (**self).get(node, name)
    }
}
