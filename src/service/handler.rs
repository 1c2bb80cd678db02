//! Server side request handling

use parking_lot::Mutex;

use super::{RequestError, RequestResult};
use crate::protocol::{LocationsResponse, Message};
use crate::route::{LocationId, RoutePlanner};

/// Answers status, locations and route requests
///
/// Shared by every server session; the planner is locked for the duration of
/// a single request.
pub struct RouteService {
    planner: Mutex<RoutePlanner>,
}

impl RouteService {
    pub fn new(planner: RoutePlanner) -> Self {
        Self {
            planner: Mutex::new(planner),
        }
    }

    /// Answer `message`, or None if it cannot be answered
    pub fn handle(&self, message: Message) -> Option<Message> {
        match self.respond(&message) {
            Ok(response) => Some(response),
            Err(RequestError::UnexpectedMessage(id)) => {
                tracing::warn!("Ignoring unexpected message id={}", id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to handle message id={}: {}", message.id(), e);
                None
            }
        }
    }

    fn respond(&self, message: &Message) -> RequestResult<Message> {
        if message.is_status_request() {
            tracing::info!("Received status request. timestamp={}", message.timestamp());
            return Ok(Message::status_response());
        }

        if let Some(request) = message.as_locations_request() {
            tracing::info!("Received locations request. start_index={}", request.start_index);
            return self.locations_page(request.start_index);
        }

        if let Some(request) = message.as_route_request() {
            tracing::info!(
                "Received route request. start_index={} end_index={}",
                request.start_index,
                request.end_index
            );
            return self.route(request.start_index, request.end_index);
        }

        Err(RequestError::UnexpectedMessage(message.id()))
    }

    /// Pack location names starting at `start_index` into one response
    pub fn locations_page(&self, start_index: u64) -> RequestResult<Message> {
        let names = self.planner.lock().location_names();

        // Starting just past the last name yields an empty page
        let start = usize::try_from(start_index)
            .ok()
            .filter(|i| *i <= names.len())
            .ok_or(RequestError::OutOfRangeIndex {
                index: start_index,
                count: names.len(),
            })?;

        let mut response = LocationsResponse::new();
        for name in &names[start..] {
            if !response.add_location(name) {
                break;
            }
        }

        Ok(Message::locations_response(response))
    }

    /// Cost of the route between two locations given by index
    pub fn route(&self, start_index: u64, end_index: u64) -> RequestResult<Message> {
        let mut planner = self.planner.lock();
        let count = planner.setup_routes().len();

        let start = checked_index(start_index, count)?;
        let end = checked_index(end_index, count)?;

        let cost = planner.wired_route_cost(LocationId(start), LocationId(end))?;
        Ok(Message::route_response(cost))
    }
}

/// `index` as a usize if it refers to one of `count` locations
fn checked_index(index: u64, count: usize) -> RequestResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < count)
        .ok_or(RequestError::OutOfRangeIndex { index, count })
}
