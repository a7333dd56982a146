//! Command channel trait, endpoint descriptors, and transport error types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{CompletionCode, Eid, SensorId, Tid};

pub mod sim;

/// Failure of one request/response exchange, after transport-level retry.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("command timed out")]
    Timeout,
    #[error("terminus busy")]
    Busy,
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("unknown terminus or sensor")]
    Unknown,
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ChannelError {
    /// Map a channel failure onto the protocol completion code reported to
    /// callers of the event/polling paths.
    pub fn completion_code(&self) -> CompletionCode {
        match self {
            ChannelError::Busy => CompletionCode::ErrorNotReady,
            ChannelError::Unknown => CompletionCode::ErrorInvalidData,
            _ => CompletionCode::Error,
        }
    }
}

/// Endpoint descriptor delivered by the discovery layer. The sensor catalog
/// comes from resource-descriptor discovery, which happens below this seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub eid: Eid,
    pub name: String,
    pub sensors: Vec<SensorDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub sensor_id: SensorId,
    pub name: String,
    pub unit: String,
    pub max_threshold: Option<f64>,
    pub crit_threshold: Option<f64>,
}

/// One part of a (possibly segmented) poll-for-event transfer.
#[derive(Debug, Clone)]
pub struct PolledEventChunk {
    pub event_id: u16,
    pub event_class: u8,
    pub data: Vec<u8>,
    /// True when further parts remain; resume with `next_transfer_handle`.
    pub more: bool,
    pub next_transfer_handle: u32,
}

/// Async request/response primitive toward a terminus.
///
/// Implementations own the wire encoding, per-request timeout and retry; a
/// returned error means the exchange is over for this cycle.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Issue a getSensorReading exchange for one sensor.
    async fn read_sensor(&self, tid: Tid, sensor_id: SensorId) -> Result<f64, ChannelError>;

    /// Issue a pollForPlatformEventMessage exchange, retrieving one part of
    /// the event identified by `event_id`.
    async fn poll_for_event(
        &self,
        tid: Tid,
        event_id: u16,
        transfer_handle: u32,
    ) -> Result<PolledEventChunk, ChannelError>;

    /// Notification that the management core changed an endpoint's
    /// availability; transports that track link state may override this.
    async fn endpoint_availability_updated(&self, _eid: Eid, _available: bool) {}
}
