//! SSE HTTP handler for receive-only subscribers (commuter screens).
//!
//! Route groups, fan-out and connection bookkeeping live in the `broadcast`
//! crate; this module only adapts its frames to Server-Sent Events.

pub mod handler;
