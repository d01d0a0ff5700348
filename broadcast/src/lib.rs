//! Subscriber connection tracking and fan-out of vehicle updates.
//!
//! # Architecture
//!
//! - **Dual-index registry**: O(1) lookups for connection management and for
//!   route-scoped routing via separate DashMap indices.
//! - **Connection, Route and Broadcast scopes**: messages go to one connection
//!   (driver errors), to the members of a route group, or to everyone.
//! - **Ephemeral messages**: a subscriber that is offline misses the update and
//!   sees fresh data on the next `/api/buses` snapshot or the next update.
//! - **Transport neutral**: connections receive [`connection::Frame`]s; the web
//!   layer turns them into WebSocket text frames or SSE events.
//!
//! # Message Flow
//!
//! 1. A subscriber opens `/ws` or `/sse` and is registered with the [`Manager`]
//! 2. `subscribe:route` (or `/sse?routeId=`) joins it to a route group
//! 3. An accepted driver update is published as a `DomainEvent`
//! 4. [`fanout::LocationFanout`] sends `bus:update` to the route group and to everyone
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, ConnectionId and Frame
//! - `manager`: High-level message routing (delegates to ConnectionRegistry)
//! - `message`: Type-safe event and scope definitions
//! - `fanout`: Domain event handler that routes location updates

pub mod connection;
pub mod fanout;
pub mod manager;
pub mod message;

pub use fanout::LocationFanout;
pub use manager::{ConnectionGuard, Manager};
