//! Bidirectional streaming path used by driver devices and commuter pages.

pub(crate) mod handler;
pub(crate) mod session;
