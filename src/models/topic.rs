//! Topic naming shared by the router, the registry and the server.

/// Topic for control frames (subscription acks).
pub const CONTROL_TOPIC: &str = "control";

const DRIVER_PREFIX: &str = "driver:";
const ROUTE_PREFIX: &str = "route:";

/// Topic carrying live updates for one driver.
pub fn driver_topic(driver_id: &str) -> String {
    format!("{}{}", DRIVER_PREFIX, driver_id)
}

/// Topic carrying live updates for one route.
pub fn route_topic(route_id: &str) -> String {
    format!("{}{}", ROUTE_PREFIX, route_id)
}

/// Entity kind addressed by a topic string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind<'a> {
    Driver(&'a str),
    Route(&'a str),
    Control,
    Other(&'a str),
}

pub fn parse_topic(topic: &str) -> TopicKind<'_> {
    if topic == CONTROL_TOPIC {
        TopicKind::Control
    } else if let Some(id) = topic.strip_prefix(DRIVER_PREFIX) {
        TopicKind::Driver(id)
    } else if let Some(id) = topic.strip_prefix(ROUTE_PREFIX) {
        TopicKind::Route(id)
    } else {
        TopicKind::Other(topic)
    }
}
