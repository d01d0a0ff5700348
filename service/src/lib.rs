//! Infrastructure concerns shared by every layer: command line / environment
//! configuration and the process-wide logger.

pub mod config;
pub mod logging;
