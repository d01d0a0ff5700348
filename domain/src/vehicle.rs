use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Latest known state of one vehicle. Serialized as
/// `{ id, busNumber, lat, lng, speed, routeId, ts }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleLocation {
    pub id: String,
    /// Human readable label shown to commuters, defaults to `id`.
    pub bus_number: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub route_id: String,
    /// Time the update was accepted, milliseconds since the Unix epoch.
    pub ts: i64,
}

/// In-memory, last-write-wins map of vehicle id to its latest location.
///
/// Records are never evicted; a vehicle that stops reporting keeps its last
/// position for the lifetime of the process.
#[derive(Debug, Default)]
pub struct VehicleStore {
    vehicles: RwLock<BTreeMap<String, VehicleLocation>>,
}

impl VehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is stored for `location.id` with `location`.
    pub fn upsert(&self, location: VehicleLocation) {
        let mut vehicles = self
            .vehicles
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        vehicles.insert(location.id.clone(), location);
    }

    pub fn get(&self, id: &str) -> Option<VehicleLocation> {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, VehicleLocation> {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str, bus_number: &str, lat: f64, route_id: &str) -> VehicleLocation {
        VehicleLocation {
            id: id.to_string(),
            bus_number: bus_number.to_string(),
            lat,
            lng: 20.0,
            speed: 0.0,
            route_id: route_id.to_string(),
            ts: 1,
        }
    }

    #[test]
    fn second_update_fully_replaces_the_first() {
        let store = VehicleStore::new();
        store.upsert(location("bus-1", "BUS-1", 10.0, "route-1"));
        store.upsert(location("bus-1", "bus-1", 11.0, "route-2"));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("bus-1"),
            Some(location("bus-1", "bus-1", 11.0, "route-2"))
        );
    }

    #[test]
    fn snapshot_is_keyed_by_vehicle_id() {
        let store = VehicleStore::new();
        assert!(store.is_empty());
        store.upsert(location("bus-2", "B2", 1.0, "route-1"));
        store.upsert(location("bus-1", "B1", 2.0, "route-1"));

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.keys().collect::<Vec<_>>(),
            vec!["bus-1", "bus-2"]
        );
        assert_eq!(snapshot["bus-2"].lat, 1.0);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let value = serde_json::to_value(location("bus-1", "BUS-1", 10.0, "route-5")).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "id": "bus-1",
                "busNumber": "BUS-1",
                "lat": 10.0,
                "lng": 20.0,
                "speed": 0.0,
                "routeId": "route-5",
                "ts": 1
            })
        );
    }
}
