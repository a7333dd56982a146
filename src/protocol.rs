//! Management-protocol primitives: identifiers, completion codes, event classes.

use serde::{Deserialize, Serialize};

/// Terminus identifier. 0x00 and 0xFF are reserved by the protocol;
/// assignable range is 1..=254.
pub type Tid = u8;

/// Endpoint identifier on the point-to-point transport.
pub type Eid = u8;

/// Numeric sensor identifier, unique within one terminus.
pub type SensorId = u16;

pub const TID_UNASSIGNED: Tid = 0x00;
pub const TID_RESERVED: Tid = 0xFF;

/// Event id carried by unsolicited event messages (no explicit id).
pub const EVENT_ID_NULL: u16 = 0x0000;
/// Event id meaning "acknowledge only, nothing to pull".
pub const EVENT_ID_ACK_ONLY: u16 = 0xFFFF;

/// Transfer handle that starts a fresh poll-for-event transfer.
pub const TRANSFER_HANDLE_NULL: u32 = 0;

/// Protocol completion codes returned by event/command handling routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompletionCode {
    Success = 0x00,
    Error = 0x01,
    ErrorInvalidData = 0x02,
    ErrorInvalidLength = 0x03,
    ErrorNotReady = 0x04,
    ErrorUnsupported = 0x05,
    /// No handler registered for the event class (dispatcher-local).
    UnknownEventClass = 0x80,
}

impl CompletionCode {
    pub fn is_success(self) -> bool {
        self == CompletionCode::Success
    }
}

/// Event classes routed by the event dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventClass {
    Sensor = 0x00,
    MessagePoll = 0x05,
    Cper = 0x07,
}

impl EventClass {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(EventClass::Sensor),
            0x05 => Some(EventClass::MessagePoll),
            0x07 => Some(EventClass::Cper),
            _ => None,
        }
    }
}

/// Extract the event-data region of an inbound event message payload.
///
/// `payload_len` is the valid length of `payload`; the event data starts at
/// `offset` and runs to the end of the valid region. Returns `None` when the
/// offset lies outside the valid region or `payload_len` overruns the buffer.
pub fn event_data_at(payload: &[u8], payload_len: usize, offset: usize) -> Option<&[u8]> {
    if payload_len > payload.len() || offset > payload_len {
        return None;
    }
    Some(&payload[offset..payload_len])
}
