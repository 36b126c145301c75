use std::sync::{Mutex, PoisonError};

use soc_hal::{
    notifier::{NotifierChain, PolicyNotifier, StaticNotifierChain, TransitionNotifier},
    Error,
};

/// A registration call seen by a [FlakyChain].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A transition notifier was registered.
    Transition,
    /// A transition notifier was unregistered.
    UnregisterTransition,
    /// A policy notifier was registered.
    Policy,
    /// A policy notifier was unregistered.
    UnregisterPolicy,
}

/// A [StaticNotifierChain] whose registrations can be made to fail.
pub struct FlakyChain<'d> {
    /// The chain registrations are forwarded to.
    pub inner: StaticNotifierChain<'d, 4>,
    fail_transition: bool,
    fail_policy: bool,
    calls: Mutex<Vec<Registration>>,
}

impl FlakyChain<'_> {
    /// A chain that accepts every registration.
    pub fn new() -> Self {
        Self {
            inner: StaticNotifierChain::new(),
            fail_transition: false,
            fail_policy: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rejects transition notifier registrations.
    pub fn failing_transition(mut self) -> Self {
        self.fail_transition = true;
        self
    }

    /// Rejects policy notifier registrations.
    pub fn failing_policy(mut self) -> Self {
        self.fail_policy = true;
        self
    }

    /// The registration calls seen so far, in order.
    pub fn calls(&self) -> Vec<Registration> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log(&self, call: Registration) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl Default for FlakyChain<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> NotifierChain<'d> for FlakyChain<'d> {
    fn register_transition(&self, notifier: &'d dyn TransitionNotifier) -> Result<(), Error> {
        self.log(Registration::Transition);
        if self.fail_transition {
            return Err(Error::Busy);
        }
        self.inner.register_transition(notifier)
    }

    fn unregister_transition(&self, notifier: &'d dyn TransitionNotifier) {
        self.log(Registration::UnregisterTransition);
        self.inner.unregister_transition(notifier)
    }

    fn register_policy(&self, notifier: &'d dyn PolicyNotifier) -> Result<(), Error> {
        self.log(Registration::Policy);
        if self.fail_policy {
            return Err(Error::Busy);
        }
        self.inner.register_policy(notifier)
    }

    fn unregister_policy(&self, notifier: &'d dyn PolicyNotifier) {
        self.log(Registration::UnregisterPolicy);
        self.inner.unregister_policy(notifier)
    }
}
