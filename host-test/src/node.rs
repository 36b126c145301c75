use std::collections::HashMap;

use soc_hal::{opp::DeviceNode, Error};

#[derive(Debug, Clone)]
enum Property {
    U64(u64),
    Str(String),
}

/// A device-tree node with a fixed set of properties.
#[derive(Debug, Clone, Default)]
pub struct SimNode {
    properties: HashMap<String, Property>,
}

impl SimNode {
    /// A node without properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a 64-bit integer property.
    pub fn with_u64(mut self, name: &str, value: u64) -> Self {
        self.properties
            .insert(name.to_string(), Property::U64(value));
        self
    }

    /// Adds a string property.
    pub fn with_str(mut self, name: &str, value: &str) -> Self {
        self.properties
            .insert(name.to_string(), Property::Str(value.to_string()));
        self
    }
}

impl DeviceNode for SimNode {
    fn read_u64(&self, name: &str) -> Result<u64, Error> {
        match self.properties.get(name) {
            Some(Property::U64(value)) => Ok(*value),
            Some(Property::Str(_)) => Err(Error::InvalidInput),
            None => Err(Error::NotFound),
        }
    }

    fn read_str(&self, name: &str) -> Result<&str, Error> {
        match self.properties.get(name) {
            Some(Property::Str(value)) => Ok(value),
            Some(Property::U64(_)) => Err(Error::InvalidInput),
            None => Err(Error::NotFound),
        }
    }
}
