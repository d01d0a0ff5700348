//! The single authorization and ingestion pipeline shared by the streaming
//! (WebSocket) and one-shot (HTTP) entry paths.
//!
//! 1. reject submissions without a vehicle id
//! 2. verify the token against the claimed vehicle id
//! 3. normalize the loosely typed payload into a [`VehicleLocation`]
//! 4. overwrite the vehicle's stored state
//! 5. publish a [`DomainEvent::VehicleLocationUpdated`] for fan-out
//!
//! Fan-out has no failure path back to the producer: once a location is stored the
//! submission is acknowledged.

use crate::error::{ingestion_error, Error, IngestionErrorKind};
use crate::token::{now_millis, TokenRegistry};
use crate::vehicle::{VehicleLocation, VehicleStore};
use events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use service::config::DEFAULT_ROUTE_ID;
use std::fmt;
use std::sync::Arc;

/// Which transport a submission arrived on. Only used for log context; both
/// paths run the same pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPath {
    Stream,
    Request,
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntryPath::Stream => write!(f, "stream"),
            EntryPath::Request => write!(f, "request"),
        }
    }
}

/// A location update as submitted by a driver device.
///
/// Devices send coordinates either as JSON numbers or as numeric strings, and
/// ids either as strings or numbers, so those fields are accepted loosely and
/// coerced during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSubmission {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub bus_number: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
    #[serde(default)]
    pub speed: Option<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    pub route_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub token: Option<String>,
}

impl LocationSubmission {
    /// Use `token` in place of the body field when it is present and non-empty.
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }
        self
    }

    fn vehicle_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Coerce a JSON number or numeric string into a finite `f64`.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Turn an authorized submission into the record that gets stored.
fn normalize(submission: LocationSubmission, id: String, now_ms: i64) -> Result<VehicleLocation, Error> {
    let (Some(lat), Some(lng)) = (
        coerce_number(submission.lat.as_ref()),
        coerce_number(submission.lng.as_ref()),
    ) else {
        return Err(ingestion_error(
            IngestionErrorKind::InvalidCoordinates,
            "latitude and longitude must be finite numbers",
        ));
    };

    Ok(VehicleLocation {
        bus_number: non_empty_or(submission.bus_number, &id),
        lat,
        lng,
        speed: coerce_number(submission.speed.as_ref()).unwrap_or(0.0),
        route_id: non_empty_or(submission.route_id, DEFAULT_ROUTE_ID),
        ts: now_ms,
        id,
    })
}

/// Authorizes, stores and publishes location submissions.
#[derive(Clone)]
pub struct Ingestion {
    tokens: Arc<TokenRegistry>,
    vehicles: Arc<VehicleStore>,
    publisher: EventPublisher,
}

impl Ingestion {
    pub fn new(
        tokens: Arc<TokenRegistry>,
        vehicles: Arc<VehicleStore>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            tokens,
            vehicles,
            publisher,
        }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn vehicles(&self) -> &VehicleStore {
        &self.vehicles
    }

    pub async fn submit(
        &self,
        submission: LocationSubmission,
        entry: EntryPath,
    ) -> Result<VehicleLocation, Error> {
        let Some(id) = submission.vehicle_id().map(str::to_owned) else {
            debug!("Rejecting {entry} submission without a vehicle id");
            return Err(ingestion_error(
                IngestionErrorKind::MissingIdentity,
                "submission has no vehicle id",
            ));
        };

        if !self.tokens.verify(submission.token.as_deref(), Some(&id)) {
            warn!("Invalid token from driver {id} ({entry})");
            return Err(ingestion_error(
                IngestionErrorKind::Unauthorized,
                "token missing, expired or bound to another vehicle",
            ));
        }

        let location = normalize(submission, id, now_millis()).inspect_err(|_| {
            warn!("Rejecting {entry} submission with unusable coordinates");
        })?;

        self.vehicles.upsert(location.clone());
        trace!("Stored location for {}: {:?}", location.id, location);

        match serde_json::to_value(&location) {
            Ok(value) => {
                self.publisher
                    .publish(DomainEvent::VehicleLocationUpdated {
                        vehicle_id: location.id.clone(),
                        route_id: location.route_id.clone(),
                        location: value,
                    })
                    .await
            }
            Err(e) => error!("Failed to serialize location for {}: {e}", location.id),
        }

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainErrorKind;
    use crate::token::JsonFileTokenStore;
    use async_trait::async_trait;
    use events::EventHandler;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CapturingHandler {
        events: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for CapturingHandler {
        async fn handle(&self, event: &DomainEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct Fixture {
        _dir: TempDir,
        ingestion: Ingestion,
        handler: Arc<CapturingHandler>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let tokens = Arc::new(TokenRegistry::load(
            JsonFileTokenStore::new(dir.path().join("tokens.json")),
            Duration::from_secs(3600),
        ));
        let handler = Arc::new(CapturingHandler::default());
        let publisher = EventPublisher::new().with_handler(handler.clone());
        Fixture {
            _dir: dir,
            ingestion: Ingestion::new(tokens, Arc::new(VehicleStore::new()), publisher),
            handler,
        }
    }

    fn submission(value: Value) -> LocationSubmission {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn accepted_update_is_stored_and_published() {
        let f = fixture();
        let token = f.ingestion.tokens().issue("bus-42", Some("route-5"), None);

        let location = f
            .ingestion
            .submit(
                submission(json!({
                    "id": "bus-42", "lat": 10, "lng": 20, "routeId": "route-5", "token": token
                })),
                EntryPath::Stream,
            )
            .await
            .unwrap();

        let stored = f.ingestion.vehicles().get("bus-42").unwrap();
        assert_eq!(stored, location);
        assert_eq!((stored.lat, stored.lng), (10.0, 20.0));
        assert_eq!(stored.bus_number, "bus-42");
        assert_eq!(stored.speed, 0.0);

        let events = f.handler.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let DomainEvent::VehicleLocationUpdated {
            vehicle_id,
            route_id,
            location,
        } = &events[0];
        assert_eq!(vehicle_id, "bus-42");
        assert_eq!(route_id, "route-5");
        assert_eq!(location["lat"], 10.0);
    }

    #[tokio::test]
    async fn missing_id_is_distinct_from_unauthorized() {
        let f = fixture();

        let err = f
            .ingestion
            .submit(submission(json!({ "lat": 1, "lng": 2 })), EntryPath::Request)
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Ingestion(IngestionErrorKind::MissingIdentity)
        );

        let err = f
            .ingestion
            .submit(submission(json!({ "id": "", "lat": 1, "lng": 2 })), EntryPath::Request)
            .await
            .unwrap_err();
        assert!(!err.is_unauthorized());
    }

    #[tokio::test]
    async fn token_for_another_vehicle_is_unauthorized() {
        let f = fixture();
        let token = f.ingestion.tokens().issue("bus-1", None, None);

        let err = f
            .ingestion
            .submit(
                submission(json!({ "id": "bus-2", "lat": 1, "lng": 2, "token": token })),
                EntryPath::Request,
            )
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert!(f.ingestion.vehicles().get("bus-2").is_none());
        assert!(f.handler.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let f = fixture();

        let err = f
            .ingestion
            .submit(submission(json!({ "id": "bus-1", "lat": 1, "lng": 2 })), EntryPath::Stream)
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn unusable_coordinates_are_rejected_without_storing() {
        let f = fixture();
        let token = f.ingestion.tokens().issue("bus-1", None, None);

        for payload in [
            json!({ "id": "bus-1", "lat": "north", "lng": 2, "token": token }),
            json!({ "id": "bus-1", "lng": 2, "token": token }),
            json!({ "id": "bus-1", "lat": "NaN", "lng": 2, "token": token }),
        ] {
            let err = f
                .ingestion
                .submit(submission(payload), EntryPath::Request)
                .await
                .unwrap_err();
            assert_eq!(
                err.error_kind,
                DomainErrorKind::Ingestion(IngestionErrorKind::InvalidCoordinates)
            );
        }

        assert!(f.ingestion.vehicles().is_empty());
    }

    #[tokio::test]
    async fn normalization_coerces_strings_and_applies_defaults() {
        let f = fixture();
        let token = f.ingestion.tokens().issue("7", None, None);

        let location = f
            .ingestion
            .submit(
                submission(json!({
                    "id": 7, "busNumber": "", "lat": " 12.5 ", "lng": "-3",
                    "speed": "fast", "routeId": "", "token": token
                })),
                EntryPath::Request,
            )
            .await
            .unwrap();

        assert_eq!(location.id, "7");
        assert_eq!(location.bus_number, "7");
        assert_eq!((location.lat, location.lng), (12.5, -3.0));
        assert_eq!(location.speed, 0.0);
        assert_eq!(location.route_id, "route-1");
        assert!(location.ts > 0);
    }

    #[tokio::test]
    async fn later_update_fully_overwrites_the_record() {
        let f = fixture();
        let token = f.ingestion.tokens().issue("bus-1", None, None);

        f.ingestion
            .submit(
                submission(json!({
                    "id": "bus-1", "busNumber": "BUS-1", "lat": 1, "lng": 1,
                    "speed": 30, "routeId": "route-3", "token": token
                })),
                EntryPath::Stream,
            )
            .await
            .unwrap();
        f.ingestion
            .submit(
                submission(json!({ "id": "bus-1", "lat": 2, "lng": 2, "token": token })),
                EntryPath::Request,
            )
            .await
            .unwrap();

        let stored = f.ingestion.vehicles().get("bus-1").unwrap();
        assert_eq!(stored.bus_number, "bus-1");
        assert_eq!(stored.speed, 0.0);
        assert_eq!(stored.route_id, "route-1");
        assert_eq!((stored.lat, stored.lng), (2.0, 2.0));
    }

    #[test]
    fn header_token_takes_precedence_over_body() {
        let body = submission(json!({ "id": "bus-1", "token": "tk_body" }));

        let overridden = body.clone().with_token_override(Some("tk_header".to_string()));
        assert_eq!(overridden.token.as_deref(), Some("tk_header"));

        let kept = body.clone().with_token_override(Some(String::new()));
        assert_eq!(kept.token.as_deref(), Some("tk_body"));

        let kept = body.with_token_override(None);
        assert_eq!(kept.token.as_deref(), Some("tk_body"));
    }

    #[test]
    fn coerce_number_rejects_non_finite_values() {
        assert_eq!(coerce_number(Some(&json!(1.5))), Some(1.5));
        assert_eq!(coerce_number(Some(&json!("inf"))), None);
        assert_eq!(coerce_number(Some(&json!(true))), None);
        assert_eq!(coerce_number(Some(&Value::Null)), None);
        assert_eq!(coerce_number(None), None);
    }
}
