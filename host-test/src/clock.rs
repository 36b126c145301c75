use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use soc_hal::{
    clock::{Clock, ClockProvider},
    Error,
    Rate,
};

use crate::node::SimNode;

/// A side effect observed on the simulated platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A clock handle was looked up.
    Get(String),
    /// A clock handle was released.
    Put(String),
    /// A clock was enabled.
    Enable(String),
    /// A clock was disabled.
    Disable(String),
    /// A clock accepted a new rate, in Hz.
    SetRate(String, u64),
    /// An operating-point table reference was released.
    TablePut(u32),
    /// A register was written.
    Write32 {
        /// Name of the register block.
        block: &'static str,
        /// Byte offset of the register.
        offset: usize,
        /// Value written.
        value: u32,
    },
}

#[derive(Debug, Default)]
struct SimClockState {
    rate: u64,
    parent_rate: Option<u64>,
    enable_count: u32,
    fail_enable: bool,
    fail_set_rate: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    clocks: HashMap<String, SimClockState>,
    handles: usize,
    pub(crate) events: Vec<Event>,
}

/// A clock tree with named clocks and a shared event log.
///
/// Cloning gives another view of the same tree.
#[derive(Debug, Clone, Default)]
pub struct SimClockTree {
    shared: Arc<Mutex<Shared>>,
}

impl SimClockTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clock<R>(&self, name: &str, f: impl FnOnce(&mut SimClockState) -> R) -> R {
        let mut state = self.state();
        let clock = state
            .clocks
            .get_mut(name)
            .unwrap_or_else(|| panic!("no clock named {name}"));
        f(clock)
    }

    /// Adds a root clock running at `rate_hz`.
    pub fn add(&self, name: &str, rate_hz: u64) -> &Self {
        self.state().clocks.insert(
            name.to_string(),
            SimClockState {
                rate: rate_hz,
                ..Default::default()
            },
        );
        self
    }

    /// Adds a clock whose parent runs at `parent_hz`.
    pub fn add_child(&self, name: &str, rate_hz: u64, parent_hz: u64) -> &Self {
        self.add(name, rate_hz);
        self.clock(name, |c| c.parent_rate = Some(parent_hz));
        self
    }

    /// Removes a clock; later lookups fail with [Error::NotFound].
    pub fn remove(&self, name: &str) {
        self.state().clocks.remove(name);
    }

    /// Makes every future enable of `name` fail.
    pub fn fail_enable(&self, name: &str) {
        self.clock(name, |c| c.fail_enable = true);
    }

    /// Makes every future rate change of `name` fail.
    pub fn fail_set_rate(&self, name: &str) {
        self.clock(name, |c| c.fail_set_rate = true);
    }

    /// Clears the failures injected into `name`.
    pub fn heal(&self, name: &str) {
        self.clock(name, |c| {
            c.fail_enable = false;
            c.fail_set_rate = false;
        });
    }

    /// The current rate of `name`, in Hz.
    pub fn rate(&self, name: &str) -> u64 {
        self.clock(name, |c| c.rate)
    }

    /// How many enables of `name` are outstanding.
    pub fn enable_count(&self, name: &str) -> u32 {
        self.clock(name, |c| c.enable_count)
    }

    /// Returns `true` if `name` has outstanding enables.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enable_count(name) > 0
    }

    /// Number of clock handles currently alive.
    pub fn live_handles(&self) -> usize {
        self.state().handles
    }

    /// A snapshot of the event log.
    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    /// The logged rate changes, as `(clock, Hz)` pairs.
    pub fn rate_changes(&self) -> Vec<(String, u64)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::SetRate(name, hz) => Some((name.clone(), *hz)),
                _ => None,
            })
            .collect()
    }

    /// Empties the event log.
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub(crate) fn record(&self, event: Event) {
        self.state().events.push(event);
    }

    pub(crate) fn set_rate(&self, name: &str, rate: Rate) -> Result<(), Error> {
        let mut state = self.state();
        let clock = state.clocks.get_mut(name).ok_or(Error::NotFound)?;
        if clock.fail_set_rate {
            return Err(Error::InvalidInput);
        }
        clock.rate = rate.raw();
        state
            .events
            .push(Event::SetRate(name.to_string(), rate.raw()));
        Ok(())
    }
}

impl ClockProvider for SimClockTree {
    type Node = SimNode;
    type Clock = SimClock;

    fn get(&self, _node: &SimNode, name: &str) -> Result<SimClock, Error> {
        let mut state = self.state();
        if !state.clocks.contains_key(name) {
            return Err(Error::NotFound);
        }
        state.handles += 1;
        state.events.push(Event::Get(name.to_string()));

        Ok(SimClock {
            tree: self.clone(),
            name: name.to_string(),
        })
    }
}

/// A handle into a [SimClockTree].
#[derive(Debug)]
pub struct SimClock {
    tree: SimClockTree,
    name: String,
}

impl SimClock {
    /// The clock's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Clock for SimClock {
    fn enable(&mut self) -> Result<(), Error> {
        let mut state = self.tree.state();
        let clock = state.clocks.get_mut(&self.name).ok_or(Error::NotFound)?;
        if clock.fail_enable {
            return Err(Error::Io);
        }
        clock.enable_count += 1;
        state.events.push(Event::Enable(self.name.clone()));
        Ok(())
    }

    fn disable(&mut self) {
        let mut state = self.tree.state();
        if let Some(clock) = state.clocks.get_mut(&self.name) {
            assert!(clock.enable_count > 0, "unbalanced disable of {}", self.name);
            clock.enable_count -= 1;
            state.events.push(Event::Disable(self.name.clone()));
        }
    }

    fn rate(&self) -> Rate {
        Rate::from_raw(self.tree.rate(&self.name))
    }

    fn parent_rate(&self) -> Option<Rate> {
        self.tree
            .clock(&self.name, |c| c.parent_rate)
            .map(Rate::from_raw)
    }

    fn set_rate(&mut self, rate: Rate) -> Result<(), Error> {
        self.tree.set_rate(&self.name, rate)
    }
}

impl Drop for SimClock {
    fn drop(&mut self) {
        let mut state = self.tree.state();
        state.handles -= 1;
        state.events.push(Event::Put(self.name.clone()));
    }
}
