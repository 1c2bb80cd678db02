//! Protocol message definitions
//!
//! Defines the header and the fixed-size bodies of every message exchanged
//! between a Waypoint client and server, and how each is packed on the wire.
//!
//! All integers are written big-endian with fixed widths. Fields are packed
//! one by one, so the encoding never depends on in-memory struct layout.

use bytes::{Buf, BufMut, BytesMut};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    HEADER_SIZE, LOCATIONS_MAX_CHARS, LOCATION_SEPARATOR, MSG_HEADER_ID,
    MSG_LOCATIONS_REQUEST_ID, MSG_LOCATIONS_RESPONSE_ID, MSG_ROUTE_REQUEST_ID,
    MSG_ROUTE_RESPONSE_ID, MSG_STATUS_REQUEST_ID, MSG_STATUS_RESPONSE_ID,
};

/// Current time as whole seconds since the unix epoch
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Fixed-size prefix carried by every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message type identifier
    id: u32,
    /// Total message length in bytes, header included
    length: u32,
    /// Creation time, seconds since the unix epoch
    timestamp: i64,
}

impl MessageHeader {
    /// Create a header for a message of type `id` carrying `body_length` body bytes
    pub fn new(id: u32, body_length: usize) -> Self {
        Self {
            id,
            length: (HEADER_SIZE + body_length) as u32,
            timestamp: unix_timestamp(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn length(&self) -> usize {
        self.length as usize
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.id);
        buf.put_u32(self.length);
        buf.put_i64(self.timestamp);
    }

    /// Decode a header from the first `HEADER_SIZE` bytes of `buf`
    fn decode(mut buf: &[u8]) -> Self {
        Self {
            id: buf.get_u32(),
            length: buf.get_u32(),
            timestamp: buf.get_i64(),
        }
    }
}

/// A body with a fixed encoded size
trait FixedBody: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut BytesMut);

    /// Decode from exactly `SIZE` bytes
    fn decode(buf: &[u8]) -> Self;
}

/// Request for the list of known locations, starting at `start_index`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationsRequest {
    pub start_index: u64,
}

impl FixedBody for LocationsRequest {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.start_index);
    }

    fn decode(mut buf: &[u8]) -> Self {
        Self {
            start_index: buf.get_u64(),
        }
    }
}

/// One page of location names, packed into a fixed-capacity buffer
///
/// Names are separated by [`LOCATION_SEPARATOR`]. When a name does not fit
/// in the remaining capacity the response is marked as paginated and the
/// caller is expected to request the rest starting after the last name it
/// received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationsResponse {
    char_count: u64,
    locations: [u8; LOCATIONS_MAX_CHARS],
    is_paginated: bool,
}

impl Default for LocationsResponse {
    fn default() -> Self {
        Self {
            char_count: 0,
            locations: [0; LOCATIONS_MAX_CHARS],
            is_paginated: false,
        }
    }
}

impl LocationsResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name followed by a separator
    ///
    /// Returns false and marks the response as paginated if the name does not
    /// fit in the remaining capacity. The buffer is left unchanged in that case.
    pub fn add_location(&mut self, name: &str) -> bool {
        let start = self.char_count();
        let end = start + name.len() + 1;

        if end > LOCATIONS_MAX_CHARS {
            self.is_paginated = true;
            return false;
        }

        self.locations[start..end - 1].copy_from_slice(name.as_bytes());
        self.locations[end - 1] = LOCATION_SEPARATOR;
        self.char_count = end as u64;
        true
    }

    /// Names carried by this page, in insertion order
    pub fn locations(&self) -> Vec<String> {
        self.locations[..self.char_count()]
            .split(|b| *b == LOCATION_SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect()
    }

    /// Number of bytes used, separators included
    pub fn char_count(&self) -> usize {
        (self.char_count as usize).min(LOCATIONS_MAX_CHARS)
    }

    /// True when more names remain on the server
    pub fn is_paginated(&self) -> bool {
        self.is_paginated
    }
}

impl FixedBody for LocationsResponse {
    const SIZE: usize = 8 + LOCATIONS_MAX_CHARS + 1;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.char_count);
        buf.put_slice(&self.locations);
        buf.put_u8(self.is_paginated as u8);
    }

    fn decode(mut buf: &[u8]) -> Self {
        let char_count = buf.get_u64();
        let mut locations = [0; LOCATIONS_MAX_CHARS];
        buf.copy_to_slice(&mut locations);
        let is_paginated = buf.get_u8() != 0;

        Self {
            char_count,
            locations,
            is_paginated,
        }
    }
}

/// Request for the cost of travelling between two locations, by list index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRequest {
    pub start_index: u64,
    pub end_index: u64,
}

impl FixedBody for RouteRequest {
    const SIZE: usize = 16;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.start_index);
        buf.put_u64(self.end_index);
    }

    fn decode(mut buf: &[u8]) -> Self {
        Self {
            start_index: buf.get_u64(),
            end_index: buf.get_u64(),
        }
    }
}

/// Calculated cost of a route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteResponse {
    pub cost: u64,
}

impl FixedBody for RouteResponse {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.cost);
    }

    fn decode(mut buf: &[u8]) -> Self {
        Self {
            cost: buf.get_u64(),
        }
    }
}

/// All message bodies, tagged by message id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Bare header, used as a placeholder while the real type is unknown
    Header,
    StatusRequest,
    StatusResponse,
    LocationsRequest(LocationsRequest),
    LocationsResponse(LocationsResponse),
    RouteRequest(RouteRequest),
    RouteResponse(RouteResponse),
}

impl MessageBody {
    /// Default body for a message id, or None if the id is not known
    pub fn for_id(id: u32) -> Option<Self> {
        let body = match id {
            MSG_HEADER_ID => MessageBody::Header,
            MSG_STATUS_REQUEST_ID => MessageBody::StatusRequest,
            MSG_STATUS_RESPONSE_ID => MessageBody::StatusResponse,
            MSG_LOCATIONS_REQUEST_ID => MessageBody::LocationsRequest(Default::default()),
            MSG_LOCATIONS_RESPONSE_ID => MessageBody::LocationsResponse(Default::default()),
            MSG_ROUTE_REQUEST_ID => MessageBody::RouteRequest(Default::default()),
            MSG_ROUTE_RESPONSE_ID => MessageBody::RouteResponse(Default::default()),
            _ => return None,
        };
        Some(body)
    }

    /// The message type identifier
    pub fn id(&self) -> u32 {
        match self {
            MessageBody::Header => MSG_HEADER_ID,
            MessageBody::StatusRequest => MSG_STATUS_REQUEST_ID,
            MessageBody::StatusResponse => MSG_STATUS_RESPONSE_ID,
            MessageBody::LocationsRequest(_) => MSG_LOCATIONS_REQUEST_ID,
            MessageBody::LocationsResponse(_) => MSG_LOCATIONS_RESPONSE_ID,
            MessageBody::RouteRequest(_) => MSG_ROUTE_REQUEST_ID,
            MessageBody::RouteResponse(_) => MSG_ROUTE_RESPONSE_ID,
        }
    }

    /// Encoded body size in bytes
    pub fn size(&self) -> usize {
        match self {
            MessageBody::Header | MessageBody::StatusRequest | MessageBody::StatusResponse => 0,
            MessageBody::LocationsRequest(_) => LocationsRequest::SIZE,
            MessageBody::LocationsResponse(_) => LocationsResponse::SIZE,
            MessageBody::RouteRequest(_) => RouteRequest::SIZE,
            MessageBody::RouteResponse(_) => RouteResponse::SIZE,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            MessageBody::Header | MessageBody::StatusRequest | MessageBody::StatusResponse => {}
            MessageBody::LocationsRequest(body) => body.encode(buf),
            MessageBody::LocationsResponse(body) => body.encode(buf),
            MessageBody::RouteRequest(body) => body.encode(buf),
            MessageBody::RouteResponse(body) => body.encode(buf),
        }
    }

    /// Overwrite the body fields from exactly `size()` bytes
    fn decode_from(&mut self, buf: &[u8]) {
        match self {
            MessageBody::Header | MessageBody::StatusRequest | MessageBody::StatusResponse => {}
            MessageBody::LocationsRequest(body) => *body = LocationsRequest::decode(buf),
            MessageBody::LocationsResponse(body) => *body = LocationsResponse::decode(buf),
            MessageBody::RouteRequest(body) => *body = RouteRequest::decode(buf),
            MessageBody::RouteResponse(body) => *body = RouteResponse::decode(buf),
        }
    }
}

/// A header plus its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: MessageHeader,
    body: MessageBody,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(body: MessageBody) -> Self {
        Self {
            header: MessageHeader::new(body.id(), body.size()),
            body,
        }
    }

    pub fn status_request() -> Self {
        Self::new(MessageBody::StatusRequest)
    }

    pub fn status_response() -> Self {
        Self::new(MessageBody::StatusResponse)
    }

    pub fn locations_request(start_index: u64) -> Self {
        Self::new(MessageBody::LocationsRequest(LocationsRequest { start_index }))
    }

    pub fn locations_response(response: LocationsResponse) -> Self {
        Self::new(MessageBody::LocationsResponse(response))
    }

    pub fn route_request(start_index: u64, end_index: u64) -> Self {
        Self::new(MessageBody::RouteRequest(RouteRequest {
            start_index,
            end_index,
        }))
    }

    pub fn route_response(cost: u64) -> Self {
        Self::new(MessageBody::RouteResponse(RouteResponse { cost }))
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn id(&self) -> u32 {
        self.header.id()
    }

    pub fn length(&self) -> usize {
        self.header.length()
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp()
    }

    /// Encode into exactly `length()` bytes, header first
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.length());
        self.header.encode(&mut buf);
        self.body.encode(&mut buf);
        buf.resize(self.length(), 0);
        buf
    }

    /// Decode as much of the message as `buf` allows
    ///
    /// Returns 0 if `buf` holds less than a header, `HEADER_SIZE` if only the
    /// header could be decoded, or `length()` once the body was decoded too.
    /// Fields are left untouched when fewer than `HEADER_SIZE` bytes are given,
    /// so a caller can retry as more bytes arrive.
    pub fn deserialize(&mut self, buf: &[u8]) -> usize {
        if buf.len() < HEADER_SIZE {
            return 0;
        }

        self.header = MessageHeader::decode(&buf[..HEADER_SIZE]);
        let mut consumed = HEADER_SIZE;

        let body_size = self.body.size();
        let length = self.length();
        if body_size > 0 && buf.len() >= length && length >= HEADER_SIZE + body_size {
            self.body.decode_from(&buf[HEADER_SIZE..HEADER_SIZE + body_size]);
            consumed = length;
        }

        consumed
    }

    pub fn is_status_request(&self) -> bool {
        matches!(self.body, MessageBody::StatusRequest)
    }

    pub fn is_status_response(&self) -> bool {
        matches!(self.body, MessageBody::StatusResponse)
    }

    pub fn as_locations_request(&self) -> Option<&LocationsRequest> {
        match &self.body {
            MessageBody::LocationsRequest(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_locations_response(&self) -> Option<&LocationsResponse> {
        match &self.body {
            MessageBody::LocationsResponse(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_route_request(&self) -> Option<&RouteRequest> {
        match &self.body {
            MessageBody::RouteRequest(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_route_response(&self) -> Option<&RouteResponse> {
        match &self.body {
            MessageBody::RouteResponse(body) => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(original: &Message) -> Message {
        let bytes = original.serialize();
        assert_eq!(bytes.len(), original.length());

        let mut decoded = Message::new(MessageBody::for_id(original.id()).unwrap());
        assert_eq!(decoded.deserialize(&bytes), original.length());
        decoded
    }

    #[test]
    fn test_header_layout() {
        let msg = Message::new(MessageBody::Header);
        let bytes = msg.serialize();

        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], &MSG_HEADER_ID.to_be_bytes());
        assert_eq!(&bytes[4..8], &(HEADER_SIZE as u32).to_be_bytes());
        assert_eq!(&bytes[8..16], &msg.timestamp().to_be_bytes());
    }

    #[test]
    fn test_round_trip_every_variant() {
        let mut locations = LocationsResponse::new();
        assert!(locations.add_location("Leeds"));
        assert!(locations.add_location("Bath"));

        let messages = vec![
            Message::new(MessageBody::Header),
            Message::status_request(),
            Message::status_response(),
            Message::locations_request(7),
            Message::locations_response(locations),
            Message::route_request(3, 11),
            Message::route_response(42),
        ];

        for original in &messages {
            let decoded = round_trip(original);
            assert_eq!(decoded.id(), original.id());
            assert_eq!(decoded.length(), original.length());
            assert_eq!(decoded.timestamp(), original.timestamp());
            assert_eq!(decoded.body(), original.body());
        }
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let msg = Message::route_request(1, 2);
        assert_eq!(msg.serialize(), msg.serialize());
    }

    #[test]
    fn test_partial_header_leaves_fields_untouched() {
        let sent = Message::route_request(5, 6);
        let bytes = sent.serialize();

        let mut received = Message::new(MessageBody::RouteRequest(Default::default()));
        let before = received.clone();

        assert_eq!(received.deserialize(&bytes[..HEADER_SIZE - 1]), 0);
        assert_eq!(received, before);
    }

    #[test]
    fn test_header_only_when_body_incomplete() {
        let sent = Message::route_request(5, 6);
        let bytes = sent.serialize();

        let mut received = Message::new(MessageBody::RouteRequest(Default::default()));
        assert_eq!(received.deserialize(&bytes[..HEADER_SIZE + 4]), HEADER_SIZE);
        assert_eq!(received.id(), sent.id());
        assert_eq!(received.length(), sent.length());
        assert_eq!(received.timestamp(), sent.timestamp());
        assert_eq!(received.as_route_request(), Some(&RouteRequest::default()));

        assert_eq!(received.deserialize(&bytes), sent.length());
        assert_eq!(received.as_route_request(), sent.as_route_request());
    }

    #[test]
    fn test_downcast_wrong_type() {
        let msg = Message::route_response(9);

        assert!(msg.as_route_request().is_none());
        assert!(msg.as_locations_response().is_none());
        assert!(!msg.is_status_request());
        assert_eq!(msg.as_route_response().map(|r| r.cost), Some(9));
    }

    #[test]
    fn test_message_lengths() {
        assert_eq!(Message::status_request().length(), HEADER_SIZE);
        assert_eq!(Message::locations_request(0).length(), HEADER_SIZE + 8);
        assert_eq!(
            Message::locations_response(LocationsResponse::new()).length(),
            HEADER_SIZE + 8 + LOCATIONS_MAX_CHARS + 1
        );
        assert_eq!(Message::route_request(0, 0).length(), HEADER_SIZE + 16);
        assert_eq!(Message::route_response(0).length(), HEADER_SIZE + 8);
    }

    #[test]
    fn test_locations_response_pagination() {
        let mut response = LocationsResponse::new();
        assert_eq!(response.char_count(), 0);
        assert!(!response.is_paginated());

        // 15 characters plus a separator, the 7th add overflows 100 bytes
        let names = [
            "c19ecpm2lq98vj9",
            "jhh0cbadeifukpk",
            "zdjubir1rz796oh",
            "uhvik04r2ippd1d",
            "c7n845q7j9c7odz",
            "bhr472bpw4d0w89",
        ];

        for (i, name) in names.iter().enumerate() {
            assert!(response.add_location(name));
            assert_eq!(response.char_count(), (i + 1) * 16);
            assert!(!response.is_paginated());
        }

        assert!(!response.add_location("rlo9nx1gc08vuhg"));
        assert_eq!(response.char_count(), 96);
        assert!(response.is_paginated());

        assert_eq!(response.locations(), names);
    }

    #[test]
    fn test_locations_response_survives_round_trip() {
        let mut response = LocationsResponse::new();
        response.add_location("John O'Groats");
        response.add_location("Brighton");

        let decoded = round_trip(&Message::locations_response(response));
        let body = decoded.as_locations_response().unwrap();

        assert_eq!(body.locations(), vec!["John O'Groats", "Brighton"]);
        assert!(!body.is_paginated());
    }

    #[test]
    fn test_bare_header_serialize_pads_to_declared_length() {
        let sent = Message::route_response(3);
        let mut header = Message::new(MessageBody::Header);
        header.deserialize(&sent.serialize());

        assert_eq!(header.id(), MSG_ROUTE_RESPONSE_ID);
        assert_eq!(header.serialize().len(), sent.length());
    }
}
