use crate::connection::{ConnectionId, ConnectionRegistry, Frame, FrameSender};
use crate::message::{EventType, Message, MessageScope};
use log::*;
use std::sync::Arc;

pub struct Manager {
    registry: Arc<ConnectionRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(&self, sender: FrameSender) -> ConnectionId {
        let connection_id = self.registry.register(sender);
        info!("Registered new connection {connection_id}");
        connection_id
    }

    /// Register a connection that is unregistered again when the returned guard drops.
    pub fn register_guarded(self: &Arc<Self>, sender: FrameSender) -> ConnectionGuard {
        ConnectionGuard {
            connection_id: self.register_connection(sender),
            manager: Arc::clone(self),
        }
    }

    /// Unregister a connection by ID, leaving every route group it joined
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        info!("Unregistering connection {connection_id}");
        self.registry.unregister(connection_id);
    }

    /// Subscribe a connection to a route group. Empty route ids are ignored.
    pub fn join_route(&self, connection_id: &ConnectionId, route_id: &str) {
        if route_id.is_empty() {
            debug!("Ignoring empty route subscription from {connection_id}");
            return;
        }
        if self.registry.join(connection_id, route_id) {
            debug!("Connection {connection_id} joined {route_id}");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn route_members(&self, route_id: &str) -> usize {
        self.registry.route_members(route_id)
    }

    /// Send a message based on its scope
    pub fn send_message(&self, message: Message) {
        let event_type = message.event.event_type();

        let data = match serde_json::to_string(&message.event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {event_type} event: {e}");
                return;
            }
        };

        let frame = Frame {
            event: event_type,
            data,
        };

        match message.scope {
            MessageScope::Connection { connection_id } => {
                self.registry.send_to_connection(&connection_id, frame);
            }
            MessageScope::Route { route_id } => {
                self.registry.send_to_route(&route_id, frame);
            }
            MessageScope::Broadcast => {
                self.registry.broadcast(frame);
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection registered for as long as it lives. Transports hold one
/// for the lifetime of the socket or stream, so a client that vanishes without
/// a clean close still leaves every group.
pub struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister_connection(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Event;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn connection_scope_targets_a_single_connection() {
        let manager = Manager::new();
        let (tx, mut rx) = unbounded_channel();
        let (other_tx, mut other_rx) = unbounded_channel();
        let id = manager.register_connection(tx);
        manager.register_connection(other_tx);

        manager.send_message(Message {
            event: Event::DriverError {
                error: "invalid token".to_string(),
            },
            scope: MessageScope::Connection { connection_id: id },
        });

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.event, "driver:error");
        assert_eq!(frame.data, r#"{"error":"invalid token"}"#);
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn empty_route_is_not_joined() {
        let manager = Manager::new();
        let (tx, _rx) = unbounded_channel();
        let id = manager.register_connection(tx);

        manager.join_route(&id, "");

        assert_eq!(manager.route_members(""), 0);
    }

    #[test]
    fn dropping_the_guard_unregisters() {
        let manager = Arc::new(Manager::new());
        let (tx, mut rx) = unbounded_channel();
        let guard = manager.register_guarded(tx);
        manager.join_route(guard.id(), "route-9");
        assert_eq!(manager.connection_count(), 1);

        drop(guard);

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.route_members("route-9"), 0);
        // the registry held the only sender
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_removes_the_connection() {
        let manager = Manager::new();
        let (tx, _rx) = unbounded_channel();
        let id = manager.register_connection(tx);
        manager.join_route(&id, "route-3");

        manager.unregister_connection(&id);

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.route_members("route-3"), 0);
    }
}
