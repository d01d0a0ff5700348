use crate::message::{Event, Message, MessageScope};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Delivers accepted location updates to subscribers.
///
/// Every update goes to the members of its route group and then to every
/// connection, so a member of that route group receives it twice. Route
/// membership adds a channel, it does not narrow the unfiltered one. Delivery
/// is fire-and-forget.
pub struct LocationFanout {
    manager: Arc<Manager>,
}

impl LocationFanout {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for LocationFanout {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::VehicleLocationUpdated {
                vehicle_id,
                route_id,
                location,
            } => {
                debug!("Fanning out location of {vehicle_id} on {route_id}");

                let update = Event::BusUpdate(location.clone());

                self.manager.send_message(Message {
                    event: update.clone(),
                    scope: MessageScope::Route {
                        route_id: route_id.clone(),
                    },
                });
                self.manager.send_message(Message {
                    event: update,
                    scope: MessageScope::Broadcast,
                });
            }
        }
    }
}
