//! Protocol module - Defines the wire protocol for Waypoint communication
//!
//! Every message is a fixed-size header followed by a fixed-size body:
//! - 4 bytes message id (big-endian)
//! - 4 bytes total message length including the header (big-endian)
//! - 8 bytes timestamp, seconds since the unix epoch (big-endian)
//! - Body bytes, layout determined by the message id

mod codec;
mod factory;
mod message;

pub use codec::*;
pub use factory::*;
pub use message::*;

/// Default port for Waypoint communication
pub const DEFAULT_PORT: u16 = 8080;

/// Size of the encoded header: id(4) + length(4) + timestamp(8)
pub const HEADER_SIZE: usize = 16;

/// Capacity of the packed name buffer carried by a locations response
pub const LOCATIONS_MAX_CHARS: usize = 100;

/// Separator between names in a locations response
pub const LOCATION_SEPARATOR: u8 = b'\n';

pub const MSG_HEADER_ID: u32 = 100;
pub const MSG_STATUS_REQUEST_ID: u32 = 101;
pub const MSG_STATUS_RESPONSE_ID: u32 = 102;
pub const MSG_LOCATIONS_REQUEST_ID: u32 = 103;
pub const MSG_LOCATIONS_RESPONSE_ID: u32 = 104;
pub const MSG_ROUTE_REQUEST_ID: u32 = 105;
pub const MSG_ROUTE_RESPONSE_ID: u32 = 106;
