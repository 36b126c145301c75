use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use soc_hal::reg_access::RegisterBlock;

use crate::{clock::Event, SimClockTree};

/// A register block backed by memory, logging writes to a [SimClockTree].
#[derive(Debug)]
pub struct SimRegisters {
    name: &'static str,
    tree: SimClockTree,
    values: Mutex<HashMap<usize, u32>>,
}

impl SimRegisters {
    /// A zeroed block called `name`.
    pub fn new(name: &'static str, tree: &SimClockTree) -> Self {
        Self {
            name,
            tree: tree.clone(),
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Number of writes made to the register at `offset`.
    pub fn writes_to(&self, offset: usize) -> usize {
        self.tree
            .events()
            .iter()
            .filter(|e| {
                matches!(e, Event::Write32 { block, offset: o, .. } if *block == self.name && *o == offset)
            })
            .count()
    }
}

impl RegisterBlock for SimRegisters {
    fn read32(&self, offset: usize) -> u32 {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(offset, value);
        self.tree.record(Event::Write32 {
            block: self.name,
            offset,
            value,
        });
    }
}
