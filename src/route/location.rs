//! Location graph nodes

use std::collections::HashMap;

/// Index of a location within the wired graph that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub usize);

/// A location in the graph
///
/// Destinations refer to other locations by [`LocationId`] into the same
/// collection, so a location never owns another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Unique name
    name: String,
    /// Cost of visiting this location
    cost: u32,
    /// Reachable locations by name
    destinations: HashMap<String, LocationId>,
}

impl Location {
    pub fn new(name: impl Into<String>, cost: u32) -> Self {
        Self {
            name: name.into(),
            cost,
            destinations: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn destinations(&self) -> &HashMap<String, LocationId> {
        &self.destinations
    }

    /// Mark `name` as reachable from here. Adding it again is a no-op.
    pub fn add_destination(&mut self, name: impl Into<String>, id: LocationId) {
        self.destinations.insert(name.into(), id);
    }

    pub fn destination_is_valid(&self, name: &str) -> bool {
        self.destinations.contains_key(name)
    }

    pub fn clear_destinations(&mut self) {
        self.destinations.clear();
    }
}
