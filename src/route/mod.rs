//! Route module - Location graph and shortest-route calculation
//!
//! Provides:
//! - Locations with a visiting cost and reachable destinations
//! - Location and route data sources, including CSV file backed ones
//! - A route planner that wires the graph and computes least-cost routes

mod location;
mod planner;
mod source;

pub use location::*;
pub use planner::*;
pub use source::*;

use thiserror::Error;

/// Data source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed entry on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("No entries found")]
    Empty,
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Route calculation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("No route from {start} to {end}")]
    Unreachable { start: String, end: String },
}

pub type RouteResult<T> = Result<T, RouteError>;
