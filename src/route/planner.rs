//! Least-cost route planning
//!
//! Costs belong to locations rather than to the edges between them: moving to
//! a location costs that location's cost, and the start location's cost is
//! added once to the final total.

use std::collections::HashMap;

use super::{Location, LocationId, LocationSource, RouteError, RouteResult, RouteSource};

/// Wires locations and routes into a graph and answers route queries
pub struct RoutePlanner {
    location_source: Box<dyn LocationSource>,
    route_source: Box<dyn RouteSource>,
    /// Wired locations, in source order
    locations: Vec<Location>,
    /// Location name to index into `locations`
    index: HashMap<String, LocationId>,
}

impl RoutePlanner {
    pub fn new(location_source: Box<dyn LocationSource>, route_source: Box<dyn RouteSource>) -> Self {
        Self {
            location_source,
            route_source,
            locations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Reload both sources and rewire the graph if either changed
    ///
    /// A source that fails to load keeps its previous data and counts as
    /// unchanged. When nothing changed the route source is not queried.
    pub fn setup_routes(&mut self) -> &[Location] {
        let locations_changed = self.location_source.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load locations: {}", e);
            false
        });
        let routes_changed = self.route_source.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load routes: {}", e);
            false
        });

        if locations_changed || routes_changed {
            self.rewire();
        }

        &self.locations
    }

    fn rewire(&mut self) {
        let mut locations = self.location_source.locations().to_vec();
        let index: HashMap<String, LocationId> = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name().to_string(), LocationId(i)))
            .collect();

        let mut edges = 0;
        for location in locations.iter_mut() {
            location.clear_destinations();

            for destination in self.route_source.routes(location.name()) {
                match index.get(&destination) {
                    // Repeated route entries wire a single edge
                    Some(_) if location.destination_is_valid(&destination) => {}
                    Some(id) => {
                        location.add_destination(destination, *id);
                        edges += 1;
                    }
                    None => {
                        tracing::debug!(
                            "Dropping route {} -> {}: unknown destination",
                            location.name(),
                            destination
                        );
                    }
                }
            }
        }

        tracing::info!("Wired {} location(s) with {} route(s)", locations.len(), edges);
        self.locations = locations;
        self.index = index;
    }

    /// Location names in source order, reloading the sources first
    pub fn location_names(&mut self) -> Vec<String> {
        self.setup_routes()
            .iter()
            .map(|l| l.name().to_string())
            .collect()
    }

    fn resolve(&self, name: &str) -> RouteResult<LocationId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RouteError::UnknownLocation(name.to_string()))
    }

    /// Cost of the cheapest route from `start` to `end`
    ///
    /// The total includes the cost of every location visited, the start and
    /// end locations included. A route from a location to itself costs that
    /// location's cost.
    pub fn route_cost(&mut self, start: &str, end: &str) -> RouteResult<u64> {
        self.setup_routes();

        let start_id = self.resolve(start)?;
        let end_id = self.resolve(end)?;
        self.wired_route_cost(start_id, end_id)
    }

    /// Like [`route_cost`](Self::route_cost), for locations given by their
    /// index in the graph wired by the last
    /// [`setup_routes`](Self::setup_routes). The sources are not reloaded.
    pub fn wired_route_cost(&self, start_id: LocationId, end_id: LocationId) -> RouteResult<u64> {
        let count = self.locations.len();
        let (Some(start), Some(end)) = (self.locations.get(start_id.0), self.locations.get(end_id.0))
        else {
            let missing = if start_id.0 >= count { start_id } else { end_id };
            return Err(RouteError::UnknownLocation(format!("#{}", missing.0)));
        };

        let mut costs: Vec<Option<u64>> = vec![None; count];
        let mut processed = vec![false; count];
        costs[start_id.0] = Some(0);

        for _ in 0..count.saturating_sub(1) {
            // First index wins ties
            let next = (0..count)
                .filter(|i| !processed[*i])
                .filter_map(|i| costs[i].map(|cost| (i, cost)))
                .min_by_key(|(_, cost)| *cost);

            let Some((current, base)) = next else {
                break;
            };

            processed[current] = true;
            if current == end_id.0 {
                break;
            }

            for id in self.locations[current].destinations().values() {
                let candidate = base + u64::from(self.locations[id.0].cost());
                if costs[id.0].map_or(true, |cost| candidate < cost) {
                    costs[id.0] = Some(candidate);
                }
            }
        }

        let cost = costs[end_id.0].ok_or_else(|| RouteError::Unreachable {
            start: start.name().to_string(),
            end: end.name().to_string(),
        })?;

        let total = cost + u64::from(start.cost());
        tracing::debug!("Route cost. start={} end={} cost={}", start.name(), end.name(), total);
        Ok(total)
    }
}
