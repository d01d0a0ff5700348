//! Core of the transit hub: driver tokens, the latest-location store and the
//! ingestion pipeline that ties them to event publication.
//!
//! The registry and store are plain owned objects. The binary builds one of each
//! at startup and shares them behind `Arc`s with whichever layer needs them.

pub use events::{DomainEvent, EventHandler, EventPublisher};

pub mod error;
pub mod ingestion;
pub mod token;
pub mod vehicle;

pub use ingestion::{EntryPath, Ingestion, LocationSubmission};
pub use token::{JsonFileTokenStore, TokenRecord, TokenRegistry, TokenStore};
pub use vehicle::{VehicleLocation, VehicleStore};
