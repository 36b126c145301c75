use std::{collections::HashMap, sync::Arc};

use soc_hal::{
    opp::{OppResolver, OppTable},
    CpuId,
    Error,
    Rate,
};

use crate::{clock::Event, node::SimNode, SimClockTree};

#[derive(Debug)]
struct TableEntry {
    node: Arc<SimNode>,
    main_clock: String,
}

/// Maps CPUs to operating-point tables.
///
/// A table's main clock is a clock of the shared [SimClockTree], so rate
/// changes made through the table show up in the tree's event log.
#[derive(Debug)]
pub struct SimOppResolver {
    tree: SimClockTree,
    tables: HashMap<CpuId, TableEntry>,
}

impl SimOppResolver {
    /// A resolver without tables.
    pub fn new(tree: &SimClockTree) -> Self {
        Self {
            tree: tree.clone(),
            tables: HashMap::new(),
        }
    }

    /// Associates `cpu` with a table described by `node`, whose main clock
    /// is `main_clock` in the tree.
    pub fn with_table(mut self, cpu: CpuId, node: SimNode, main_clock: &str) -> Self {
        self.tables.insert(
            cpu,
            TableEntry {
                node: Arc::new(node),
                main_clock: main_clock.to_string(),
            },
        );
        self
    }
}

impl OppResolver for SimOppResolver {
    type Table = SimOppTable;

    fn table_for_cpu(&self, cpu: CpuId) -> Result<SimOppTable, Error> {
        let entry = self.tables.get(&cpu).ok_or(Error::NotFound)?;

        Ok(SimOppTable {
            tree: self.tree.clone(),
            cpu,
            node: entry.node.clone(),
            main_clock: entry.main_clock.clone(),
        })
    }
}

/// A table reference handed out by [SimOppResolver].
#[derive(Debug)]
pub struct SimOppTable {
    tree: SimClockTree,
    cpu: CpuId,
    node: Arc<SimNode>,
    main_clock: String,
}

impl OppTable for SimOppTable {
    type Node = SimNode;

    fn node(&self) -> &SimNode {
        &self.node
    }

    fn set_clock_rate(&mut self, rate: Rate) -> Result<(), Error> {
        self.tree.set_rate(&self.main_clock, rate)
    }
}

impl Drop for SimOppTable {
    fn drop(&mut self) {
        self.tree.record(Event::TablePut(self.cpu.0));
    }
}
