//! Event system infrastructure for the transit hub.
//!
//! This crate decouples the ingestion pipeline from the transports that deliver
//! updates to subscribers (WebSocket and SSE fan-out).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Record data is carried as serialized JSON values.

use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// Domain events emitted once an operation has completed successfully.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Emitted after a location update passed authorization and replaced the
    /// stored state for its vehicle.
    VehicleLocationUpdated {
        /// Producer id the update belongs to.
        vehicle_id: String,
        /// Route group the update is tagged with (already defaulted).
        route_id: String,
        /// Complete serialized location record, exactly as it is stored.
        location: Value,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::VehicleLocationUpdated { .. } => "vehicle_location_updated",
        }
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like fan-out to connected subscribers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    /// Handlers have no failure path back to the caller.
    pub async fn publish(&self, event: DomainEvent) {
        trace!(
            "Publishing {} to {} handler(s)",
            event.name(),
            self.handlers.len()
        );
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
