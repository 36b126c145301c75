//! # Operating-point tables
//!
//! Every CPU that takes part in frequency scaling is associated with an
//! operating-point table. Besides the list of frequency points the table
//! carries a device node with platform properties (for example
//! `cci-hz` or `tcm-hz`), and it owns the main clock of the CPU cluster.
//!
//! A table reference obtained from an [OppResolver] is released when it is
//! dropped.

use crate::{CpuId, Error, Rate};

/// A device-tree node.
pub trait DeviceNode {
    /// Reads the first cell of a 64-bit integer property.
    fn read_u64(&self, name: &str) -> Result<u64, Error>;

    /// Reads a string property.
    fn read_str(&self, name: &str) -> Result<&str, Error>;

    /// Reads a 64-bit property holding a rate in Hz.
    fn read_rate(&self, name: &str) -> Result<Rate, Error> {
        self.read_u64(name).map(Rate::from_raw)
    }
}

impl<N: DeviceNode + ?Sized> DeviceNode for &N {
    fn read_u64(&self, name: &str) -> Result<u64, Error> {
        (**self).read_u64(name)
    }

    fn read_str(&self, name: &str) -> Result<&str, Error> {
        (**self).read_str(name)
    }
}

/// A reference to the operating-point table of a CPU cluster.
pub trait OppTable {
    /// The table's device node type.
    type Node: DeviceNode + ?Sized;

    /// The device node carrying the table's properties.
    fn node(&self) -> &Self::Node;

    /// Sets the rate of the cluster's main clock.
    fn set_clock_rate(&mut self, rate: Rate) -> Result<(), Error>;
}

/// Resolves CPUs to their operating-point tables.
pub trait OppResolver {
    /// The table reference type.
    type Table: OppTable;

    /// Finds the table of the cluster `cpu` belongs to.
    fn table_for_cpu(&self, cpu: CpuId) -> Result<Self::Table, Error>;
}

impl<R: OppResolver + ?Sized> OppResolver for &R {
    type Table = R::Table;

    fn table_for_cpu(&self, cpu: CpuId) -> Result<Self::Table, Error> {
        (**self).table_for_cpu(cpu)
    }
}
