//! Client side conversation driver
//!
//! Checks the server is alive, lists every location page by page, then
//! optionally asks for the cost of one route.

use crate::protocol::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    AwaitingStatus,
    AwaitingLocations,
    AwaitingRoute,
    Done,
}

/// Answers server responses for one client conversation
#[derive(Debug)]
pub struct ClientDriver {
    state: DriverState,
    /// Route to price once the locations are known, by name
    route: Option<(String, String)>,
    /// Locations received so far, in server order
    locations: Vec<String>,
    /// Cost of the requested route, once answered
    cost: Option<u64>,
}

impl ClientDriver {
    pub fn new(route: Option<(String, String)>) -> Self {
        Self {
            state: DriverState::AwaitingStatus,
            route,
            locations: Vec::new(),
            cost: None,
        }
    }

    /// Message that opens the conversation
    pub fn initial_message(&self) -> Message {
        Message::status_request()
    }

    /// Answer one server message, or None to end the conversation
    pub fn handle(&mut self, message: Message) -> Option<Message> {
        let response = match self.state {
            DriverState::AwaitingStatus if message.is_status_response() => {
                tracing::info!("Server is up. timestamp={}", message.timestamp());
                self.state = DriverState::AwaitingLocations;
                Some(Message::locations_request(0))
            }
            DriverState::AwaitingLocations if message.as_locations_response().is_some() => {
                self.next_page(&message)
            }
            DriverState::AwaitingRoute if message.as_route_response().is_some() => {
                self.cost = message.as_route_response().map(|route| route.cost);
                None
            }
            state => {
                tracing::warn!("Unexpected message id={} in state {:?}", message.id(), state);
                None
            }
        };

        if response.is_none() {
            self.state = DriverState::Done;
        }
        response
    }

    fn next_page(&mut self, message: &Message) -> Option<Message> {
        let page = message.as_locations_response()?;
        let names = page.locations();
        tracing::debug!(
            "Received {} location(s), paginated={}",
            names.len(),
            page.is_paginated()
        );
        let more = page.is_paginated() && !names.is_empty();
        self.locations.extend(names);

        if more {
            Some(Message::locations_request(self.locations.len() as u64))
        } else {
            self.request_route()
        }
    }

    fn request_route(&mut self) -> Option<Message> {
        let (start, end) = self.route.as_ref()?;

        let Some(start_index) = self.index_of(start) else {
            tracing::error!("Unknown start location: {}", start);
            return None;
        };
        let Some(end_index) = self.index_of(end) else {
            tracing::error!("Unknown end location: {}", end);
            return None;
        };

        self.state = DriverState::AwaitingRoute;
        Some(Message::route_request(start_index, end_index))
    }

    fn index_of(&self, name: &str) -> Option<u64> {
        self.locations
            .iter()
            .position(|l| l.eq_ignore_ascii_case(name))
            .map(|i| i as u64)
    }

    /// Locations listed by the server
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Cost of the requested route, if the server answered it
    pub fn cost(&self) -> Option<u64> {
        self.cost
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        self.state == DriverState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Client, MessageHandler, NetworkConfig, Server};
    use crate::protocol::{LocationsResponse, MessageFactory, LOCATIONS_MAX_CHARS};
    use crate::route::{FileLocationSource, FileRouteSource, RoutePlanner};
    use crate::service::RouteService;
    use std::sync::Arc;

    fn page(names: &[&str]) -> Message {
        let mut response = LocationsResponse::new();
        for name in names {
            assert!(response.add_location(name));
        }
        Message::locations_response(response)
    }

    fn paginated_page(names: &[&str]) -> Message {
        let mut response = LocationsResponse::new();
        for name in names {
            assert!(response.add_location(name));
        }
        assert!(!response.add_location(&"x".repeat(LOCATIONS_MAX_CHARS)));
        Message::locations_response(response)
    }

    #[test]
    fn test_listing_without_route() {
        let mut driver = ClientDriver::new(None);
        assert!(driver.initial_message().is_status_request());

        let next = driver.handle(Message::status_response()).unwrap();
        assert_eq!(next.as_locations_request().unwrap().start_index, 0);

        let next = driver.handle(paginated_page(&["London", "Bath"])).unwrap();
        assert_eq!(next.as_locations_request().unwrap().start_index, 2);

        assert!(driver.handle(page(&["Oxford"])).is_none());
        assert_eq!(driver.locations(), &["London", "Bath", "Oxford"]);
        assert!(driver.is_done());
        assert_eq!(driver.cost(), None);
    }

    #[test]
    fn test_empty_paginated_page_stops_listing() {
        let mut driver = ClientDriver::new(None);
        driver.handle(Message::status_response());

        assert!(driver.handle(paginated_page(&[])).is_none());
        assert!(driver.locations().is_empty());
    }

    #[test]
    fn test_route_request_after_listing() {
        let mut driver = ClientDriver::new(Some(("oxford".to_string(), "London".to_string())));
        driver.handle(Message::status_response());

        let next = driver.handle(page(&["London", "Bath", "Oxford"])).unwrap();
        let request = next.as_route_request().unwrap();
        assert_eq!((request.start_index, request.end_index), (2, 0));

        assert!(driver.handle(Message::route_response(4)).is_none());
        assert_eq!(driver.cost(), Some(4));
        assert!(driver.is_done());
    }

    #[test]
    fn test_unknown_route_location_ends_conversation() {
        let mut driver = ClientDriver::new(Some(("Paris".to_string(), "London".to_string())));
        driver.handle(Message::status_response());

        assert!(driver.handle(page(&["London"])).is_none());
        assert!(driver.is_done());
    }

    #[test]
    fn test_unexpected_message_ends_conversation() {
        let mut driver = ClientDriver::new(None);

        assert!(driver.handle(Message::route_response(1)).is_none());
        assert!(driver.is_done());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_route() {
        let planner = RoutePlanner::new(
            Box::new(FileLocationSource::new(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/data/locations.csv"
            ))),
            Box::new(FileRouteSource::new(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/data/routes.csv"
            ))),
        );
        let service = Arc::new(RouteService::new(planner));
        let handler: MessageHandler = Arc::new(move |message: Message| service.handle(message));

        let factory = Arc::new(MessageFactory::new());
        let config = NetworkConfig::new(0).with_bind_address("127.0.0.1");
        let server = Server::bind(config, factory.clone(), handler).await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(server.run());

        let driver = tokio::task::spawn_blocking(move || {
            let mut driver = ClientDriver::new(Some((
                "Manchester".to_string(),
                "Brighton".to_string(),
            )));
            let mut client = Client::new(NetworkConfig::new(port), factory);
            client.connect("127.0.0.1").unwrap();
            client
                .run(driver.initial_message(), |message| driver.handle(message))
                .unwrap();
            driver
        })
        .await
        .unwrap();

        assert_eq!(driver.locations().len(), 15);
        assert_eq!(driver.locations()[14], "Brighton");
        assert_eq!(driver.cost(), Some(13));
    }
}
