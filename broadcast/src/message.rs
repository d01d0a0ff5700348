use crate::connection::ConnectionId;
use serde::Serialize;
use serde_json::Value;

/// Trait for getting the wire event name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Outbound events. The payload is serialized on its own; the event name travels
/// next to it (SSE `event:` field or the `event` key of a WebSocket envelope).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    /// Latest location of a vehicle: `{ id, busNumber, lat, lng, speed, routeId, ts }`
    BusUpdate(Value),

    /// Rejection of a driver's own submission, never broadcast.
    DriverError { error: String },

    // System events
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished { connection_id: String },
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::BusUpdate(_) => "bus:update",
            Event::DriverError { .. } => "driver:error",
            Event::ConnectionEstablished { .. } => "connection:established",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send to one connection only
    Connection { connection_id: ConnectionId },
    /// Send to every connection that joined the route group
    Route { route_id: String },
    /// Send to all connected subscribers
    Broadcast,
}
