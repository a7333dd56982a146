//! Platform monitoring core: terminus registry, polling scheduler, event
//! dispatch and the manager facade tying them together.

pub mod event_manager;
pub mod manager;
pub mod sensor_manager;
pub mod terminus;
pub mod terminus_manager;

#[cfg(test)]
pub(crate) mod testutil;

pub use event_manager::{EventHandler, EventManager};
pub use manager::{Manager, OemPollHandler};
pub use sensor_manager::SensorManager;
pub use terminus::{NumericSensor, TerminiMapper, Terminus};
pub use terminus_manager::TerminusManager;
