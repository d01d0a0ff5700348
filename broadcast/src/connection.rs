use dashmap::DashMap;
use log::*;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;

/// Name of a route group, e.g. `route-7`.
pub type RouteId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transport-neutral outbound message: an event name and its JSON payload.
/// The web layer renders it as a WebSocket text frame or an SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: &'static str,
    pub data: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: &'a RawValue,
}

impl Frame {
    /// `{"event":"<name>","data":<payload>}`. Fails if `data` is not valid JSON.
    pub fn to_envelope(&self) -> serde_json::Result<String> {
        let data: &RawValue = serde_json::from_str(&self.data)?;
        serde_json::to_string(&Envelope {
            event: self.event,
            data,
        })
    }
}

pub type FrameSender = UnboundedSender<Frame>;

/// Connection information: its outbound channel and the route groups it joined.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub sender: FrameSender,
    pub routes: HashSet<RouteId>,
}

/// Connection registry with dual indices: connections by id, and route group
/// membership by route id.
///
/// Every registered connection belongs to the unfiltered group reached by
/// [`ConnectionRegistry::broadcast`]. Route groups are an additional channel on top.
///
/// Locks on the two maps are never held at the same time.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: route group members for route-scoped routing - O(1)
    route_index: DashMap<RouteId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            route_index: DashMap::new(),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, sender: FrameSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                sender,
                routes: HashSet::new(),
            },
        );

        connection_id
    }

    /// Unregister a connection and drop it from every route group it joined.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        let Some((_, info)) = self.connections.remove(connection_id) else {
            return;
        };

        for route_id in info.routes {
            if let Some(mut members) = self.route_index.get_mut(&route_id) {
                members.remove(connection_id);

                // Clean up empty route entries
                if members.is_empty() {
                    drop(members); // Release lock before removal
                    self.route_index.remove_if(&route_id, |_, m| m.is_empty());
                }
            }
        }
    }

    /// Add a connection to a route group. Joining twice changes nothing; joining
    /// another route keeps the earlier memberships.
    ///
    /// Returns false when the connection is not registered.
    pub fn join(&self, connection_id: &ConnectionId, route_id: &str) -> bool {
        {
            let Some(mut info) = self.connections.get_mut(connection_id) else {
                warn!(
                    "Ignoring join of {} for unknown connection {}",
                    route_id,
                    connection_id.as_str()
                );
                return false;
            };
            if !info.routes.insert(route_id.to_string()) {
                return true;
            }
        }

        self.route_index
            .entry(route_id.to_string())
            .or_default()
            .insert(connection_id.clone());

        true
    }

    /// Route groups a connection currently belongs to.
    pub fn routes_of(&self, connection_id: &ConnectionId) -> HashSet<RouteId> {
        self.connections
            .get(connection_id)
            .map(|info| info.routes.clone())
            .unwrap_or_default()
    }

    pub fn route_members(&self, route_id: &str) -> usize {
        self.route_index
            .get(route_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a frame to a single connection - O(1)
    pub fn send_to_connection(&self, connection_id: &ConnectionId, frame: Frame) {
        if let Some(info) = self.connections.get(connection_id) {
            if let Err(e) = info.sender.send(frame) {
                warn!(
                    "Failed to send event to connection {}: {}. Connection will be cleaned up.",
                    connection_id.as_str(),
                    e
                );
            }
        }
    }

    /// Send a frame to every member of a route group - O(k) where k = members
    pub fn send_to_route(&self, route_id: &str, frame: Frame) {
        let members: Vec<ConnectionId> = match self.route_index.get(route_id) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };

        for connection_id in members {
            self.send_to_connection(&connection_id, frame.clone());
        }
    }

    /// Broadcast a frame to all connections - O(n) (unavoidable, but explicit)
    pub fn broadcast(&self, frame: Frame) {
        for entry in self.connections.iter() {
            if let Err(e) = entry.value().sender.send(frame.clone()) {
                warn!(
                    "Failed to send broadcast to connection {}: {}",
                    entry.key().as_str(),
                    e
                );
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
