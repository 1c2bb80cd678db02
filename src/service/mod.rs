//! Service module - Route requests answered over the message protocol
//!
//! Provides:
//! - Server side request handling backed by the route planner
//! - Client side driver that lists locations and asks for a route cost

mod driver;
mod handler;

pub use driver::*;
pub use handler::*;

use thiserror::Error;

use crate::route::RouteError;

/// Request handling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Index {index} out of range for {count} location(s)")]
    OutOfRangeIndex { index: u64, count: usize },

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Unexpected message type: {0}")]
    UnexpectedMessage(u32),
}

pub type RequestResult<T> = Result<T, RequestError>;
