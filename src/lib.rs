//! Platmond: management core of a platform-monitoring daemon.
//!
//! Discovers remote hardware endpoints (termini) over a point-to-point
//! transport, schedules per-terminus sensor polling, and dispatches
//! asynchronous platform events to registered handlers.

pub mod app;
pub mod config;
pub mod daemon;
pub mod platform;
pub mod protocol;
pub mod transport;
