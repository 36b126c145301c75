//! # Frequency notifiers
//!
//! ## Overview
//!
//! The frequency-scaling core announces two kinds of events:
//!
//! - [PolicyAttach]: a frequency policy was attached to a group of CPUs.
//! - [FreqTransition]: the frequency of a policy is about to change
//!   ([TransitionPhase::PreChange]), or has just changed
//!   ([TransitionPhase::PostChange]).
//!
//! Drivers implement [TransitionNotifier] and/or [PolicyNotifier] and
//! register them on a [NotifierChain]. [StaticNotifierChain] is a
//! fixed-capacity chain that also drives transitions with the ordering the
//! notifiers rely on: every pre-change notifier returns before the new
//! frequency is applied, and post-change notifiers only run after.
//!
//! ## Examples
//!
//! ```rust
//! use soc_hal::{
//!     notifier::{
//!         FreqTransition, NotifierChain, NotifyResult, StaticNotifierChain, TransitionNotifier,
//!     },
//!     CpuId, Frequency,
//! };
//!
//! struct Tracer;
//!
//! impl TransitionNotifier for Tracer {
//!     fn on_transition(&self, event: &FreqTransition) -> NotifyResult {
//!         println!("{:?} {} -> {} kHz", event.phase, event.old.raw(), event.new.raw());
//!         NotifyResult::Done
//!     }
//! }
//!
//! let tracer = Tracer;
//! let chain = StaticNotifierChain::<'_, 4>::new();
//! chain.register_transition(&tracer)?;
//!
//! chain.transition(
//!     CpuId(0),
//!     Frequency::kHz(1_000_000),
//!     Frequency::kHz(1_600_000),
//!     || Ok(()),
//! )?;
//! # Ok::<(), soc_hal::Error>(())
//! ```

use soc_sync::NonReentrantMutex;

use crate::{CpuId, Error, Frequency};

/// What a notifier asks the chain to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyResult {
    /// The event was not of interest; continue.
    Done,
    /// The event was handled; continue.
    Ok,
    /// Do not deliver the event to the remaining notifiers.
    Stop,
}

/// The phase of a frequency transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionPhase {
    /// Delivered before the new frequency is applied.
    PreChange,
    /// Delivered after the new frequency was applied.
    PostChange,
}

/// A CPU frequency change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqTransition {
    /// First CPU of the policy changing frequency.
    pub cpu: CpuId,
    /// Frequency before the change.
    pub old: Frequency,
    /// Frequency after the change.
    pub new: Frequency,
    /// Which side of the change this event is delivered on.
    pub phase: TransitionPhase,
}

/// A frequency policy was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PolicyAttach {
    /// First CPU of the attached policy.
    pub cpu: CpuId,
}

/// Receives [FreqTransition] events.
pub trait TransitionNotifier: Sync {
    /// Handles one phase of a transition.
    fn on_transition(&self, event: &FreqTransition) -> NotifyResult;
}

/// Receives [PolicyAttach] events.
pub trait PolicyNotifier: Sync {
    /// Handles a policy attachment.
    fn on_policy_attach(&self, event: &PolicyAttach) -> NotifyResult;
}

/// A dispatcher notifiers can be registered with.
///
/// Notifiers are identified by address: unregistering removes the
/// registration made with the same reference.
pub trait NotifierChain<'d> {
    /// Registers a transition notifier.
    fn register_transition(&self, notifier: &'d dyn TransitionNotifier) -> Result<(), Error>;

    /// Removes a transition notifier. Unknown notifiers are ignored.
    fn unregister_transition(&self, notifier: &'d dyn TransitionNotifier);

    /// Registers a policy notifier.
    fn register_policy(&self, notifier: &'d dyn PolicyNotifier) -> Result<(), Error>;

    /// Removes a policy notifier. Unknown notifiers are ignored.
    fn unregister_policy(&self, notifier: &'d dyn PolicyNotifier);
}

struct Lists<'d, const N: usize> {
    transition: heapless::Vec<&'d dyn TransitionNotifier, N>,
    policy: heapless::Vec<&'d dyn PolicyNotifier, N>,
}

/// A notifier chain with room for `N` notifiers of each kind.
pub struct StaticNotifierChain<'d, const N: usize> {
    lists: NonReentrantMutex<Lists<'d, N>>,
}

impl<const N: usize> Default for StaticNotifierChain<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize> StaticNotifierChain<'d, N> {
    /// Creates an empty chain.
    pub const fn new() -> Self {
        Self {
            lists: NonReentrantMutex::new(Lists {
                transition: heapless::Vec::new(),
                policy: heapless::Vec::new(),
            }),
        }
    }

    /// Number of registered transition and policy notifiers.
    pub fn registered(&self) -> (usize, usize) {
        self.lists.with(|l| (l.transition.len(), l.policy.len()))
    }

    /// Delivers a policy attachment to every policy notifier.
    pub fn attach_policy(&self, cpu: CpuId) {
        let event = PolicyAttach { cpu };
        // Dispatch on a snapshot so notifiers can use the chain themselves.
        let notifiers = self.lists.with(|l| l.policy.clone());

        debug!("Policy attached on CPU {}", cpu.0);
        for notifier in notifiers {
            if notifier.on_policy_attach(&event) == NotifyResult::Stop {
                break;
            }
        }
    }

    /// Delivers one phase of a transition to every transition notifier.
    pub fn notify_transition(&self, event: &FreqTransition) {
        let notifiers = self.lists.with(|l| l.transition.clone());

        trace!("Delivering {:?} to {} notifier(s)", event, notifiers.len());
        for notifier in notifiers {
            if notifier.on_transition(event) == NotifyResult::Stop {
                break;
            }
        }
    }

    /// Changes the frequency of the policy of `cpu` from `old` to `new`.
    ///
    /// Delivers [TransitionPhase::PreChange], runs `apply`, then delivers
    /// [TransitionPhase::PostChange]. If `apply` fails, the post-change event
    /// reports that the frequency stayed at `old` and the error is returned.
    pub fn transition(
        &self,
        cpu: CpuId,
        old: Frequency,
        new: Frequency,
        apply: impl FnOnce() -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut event = FreqTransition {
            cpu,
            old,
            new,
            phase: TransitionPhase::PreChange,
        };
        self.notify_transition(&event);

        let result = apply();
        if let Err(e) = result {
            warn!(
                "Failed to set CPU {} to {} kHz: {:?}",
                cpu.0,
                new.raw(),
                e
            );
            event.new = old;
        }

        event.phase = TransitionPhase::PostChange;
        self.notify_transition(&event);

        result
    }
}

impl<'d, const N: usize> NotifierChain<'d> for StaticNotifierChain<'d, N> {
    fn register_transition(&self, notifier: &'d dyn TransitionNotifier) -> Result<(), Error> {
        self.lists.with(|l| register(&mut l.transition, notifier))
    }

    fn unregister_transition(&self, notifier: &'d dyn TransitionNotifier) {
        self.lists.with(|l| unregister(&mut l.transition, notifier))
    }

    fn register_policy(&self, notifier: &'d dyn PolicyNotifier) -> Result<(), Error> {
        self.lists.with(|l| register(&mut l.policy, notifier))
    }

    fn unregister_policy(&self, notifier: &'d dyn PolicyNotifier) {
        self.lists.with(|l| unregister(&mut l.policy, notifier))
    }
}

fn register<'d, T: ?Sized, const N: usize>(
    list: &mut heapless::Vec<&'d T, N>,
    notifier: &'d T,
) -> Result<(), Error> {
    if list.iter().any(|n| core::ptr::addr_eq(*n, notifier)) {
        return Err(Error::InvalidInput);
    }

    list.push(notifier).map_err(|_| Error::Busy)
}

fn unregister<T: ?Sized, const N: usize>(list: &mut heapless::Vec<&T, N>, notifier: &T) {
    list.retain(|n| !core::ptr::addr_eq(*n, notifier));
}
