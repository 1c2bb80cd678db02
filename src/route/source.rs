//! Location and route data sources
//!
//! The planner reads its graph from two sources: one listing locations and
//! their costs, and one listing which locations are reachable from each
//! start location. The file backed sources read simple CSV files:
//!
//! ```text
//! # locations: name, cost
//! London, 3
//! Brighton, 1
//!
//! # routes: start, destination, destination, ...
//! London, Brighton, Oxford
//! Brighton, London
//! ```
//!
//! A file counts as changed when its modification time or its length differs
//! from the last successful load. A rewrite that keeps both is not noticed.
//!
//! A reload is all-or-nothing: if the file cannot be read or parsed the
//! previously loaded data is kept.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{Location, SourceError, SourceResult};
use crate::protocol::LOCATIONS_MAX_CHARS;

/// A source of locations, responsible for their lifetime
pub trait LocationSource: Send {
    /// Load or reload the locations
    ///
    /// Returns true if the locations changed since the last successful load.
    fn load(&mut self) -> SourceResult<bool>;

    /// All locations in source order
    fn locations(&self) -> &[Location];

    /// A location by name
    fn location(&self, name: &str) -> Option<&Location>;
}

/// A source of routes between location names
pub trait RouteSource: Send {
    /// Load or reload the routes
    ///
    /// Returns true if the routes changed since the last successful load.
    fn load(&mut self) -> SourceResult<bool>;

    /// Names of the locations reachable from `start`
    fn routes(&self, start: &str) -> Vec<String>;
}

/// Modification time and length of a file, compared between loads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> SourceResult<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            modified: metadata.modified()?,
            len: metadata.len(),
        })
    }
}

/// Non-empty, non-comment lines with their 1-based line numbers
fn data_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn malformed(line: usize, reason: impl Into<String>) -> SourceError {
    SourceError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// Parse `name, cost` lines
pub fn parse_locations(contents: &str) -> SourceResult<Vec<Location>> {
    let mut locations: Vec<Location> = Vec::new();

    for (line_no, line) in data_lines(contents) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let [name, cost] = fields[..] else {
            return Err(malformed(line_no, format!("expected 'name, cost', got '{}'", line)));
        };

        if name.is_empty() {
            return Err(malformed(line_no, "empty location name"));
        }

        // Every name must fit in a single locations response with its separator
        if name.len() >= LOCATIONS_MAX_CHARS {
            return Err(malformed(line_no, format!("location name '{}' is too long", name)));
        }

        if locations.iter().any(|l| l.name() == name) {
            return Err(malformed(line_no, format!("duplicate location '{}'", name)));
        }

        let cost: u32 = cost
            .parse()
            .map_err(|_| malformed(line_no, format!("invalid cost '{}' for '{}'", cost, name)))?;

        tracing::debug!("Adding location. name={} cost={}", name, cost);
        locations.push(Location::new(name, cost));
    }

    if locations.is_empty() {
        return Err(SourceError::Empty);
    }

    Ok(locations)
}

/// Parse `start, destination...` lines, merging repeated start names
pub fn parse_routes(contents: &str) -> SourceResult<HashMap<String, Vec<String>>> {
    let mut routes: HashMap<String, Vec<String>> = HashMap::new();

    for (line_no, line) in data_lines(contents) {
        let mut fields = line.split(',').map(str::trim);

        let start = fields.next().unwrap_or_default();
        if start.is_empty() {
            return Err(malformed(line_no, "empty start location"));
        }

        routes
            .entry(start.to_string())
            .or_default()
            .extend(fields.filter(|f| !f.is_empty()).map(str::to_string));
    }

    if routes.is_empty() {
        return Err(SourceError::Empty);
    }

    Ok(routes)
}

/// Locations read from a CSV file
pub struct FileLocationSource {
    path: PathBuf,
    locations: Vec<Location>,
    index: HashMap<String, usize>,
    loaded: Option<FileStamp>,
}

impl FileLocationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locations: Vec::new(),
            index: HashMap::new(),
            loaded: None,
        }
    }
}

impl LocationSource for FileLocationSource {
    fn load(&mut self) -> SourceResult<bool> {
        let stamp = FileStamp::of(&self.path)?;
        if self.loaded == Some(stamp) {
            return Ok(false);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let locations = parse_locations(&contents)?;

        self.index = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name().to_string(), i))
            .collect();
        self.locations = locations;
        self.loaded = Some(stamp);

        tracing::info!(
            "Loaded {} location(s) from {}",
            self.locations.len(),
            self.path.display()
        );
        Ok(true)
    }

    fn locations(&self) -> &[Location] {
        &self.locations
    }

    fn location(&self, name: &str) -> Option<&Location> {
        self.index.get(name).map(|i| &self.locations[*i])
    }
}

/// Routes read from a CSV file
pub struct FileRouteSource {
    path: PathBuf,
    routes: HashMap<String, Vec<String>>,
    loaded: Option<FileStamp>,
}

impl FileRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            routes: HashMap::new(),
            loaded: None,
        }
    }
}

impl RouteSource for FileRouteSource {
    fn load(&mut self) -> SourceResult<bool> {
        let stamp = FileStamp::of(&self.path)?;
        if self.loaded == Some(stamp) {
            return Ok(false);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        self.routes = parse_routes(&contents)?;
        self.loaded = Some(stamp);

        tracing::info!(
            "Loaded routes for {} location(s) from {}",
            self.routes.len(),
            self.path.display()
        );
        Ok(true)
    }

    fn routes(&self, start: &str) -> Vec<String> {
        self.routes.get(start).cloned().unwrap_or_default()
    }
}
