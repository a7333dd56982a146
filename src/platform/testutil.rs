//! Shared test doubles: scripted command channel and registry builders.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::platform::terminus::{TerminiMapper, Terminus};
use crate::protocol::{Eid, SensorId, Tid};
use crate::transport::{
    ChannelError, CommandChannel, EndpointDescriptor, PolledEventChunk, SensorDescriptor,
};

pub(crate) fn endpoint_with_sensors(eid: Eid, name: &str, count: u16) -> EndpointDescriptor {
    EndpointDescriptor {
        eid,
        name: name.to_string(),
        sensors: (1..=count)
            .map(|sensor_id| SensorDescriptor {
                sensor_id,
                name: format!("{}_temp{}", name, sensor_id),
                unit: "degrees_c".to_string(),
                max_threshold: Some(80.0),
                crit_threshold: None,
            })
            .collect(),
    }
}

/// Build a registry holding one terminus per `(tid, sensor_count)` pair.
pub(crate) fn registry_with(entries: &[(Tid, u16)]) -> Arc<RwLock<TerminiMapper>> {
    let mut map = TerminiMapper::new();
    for (tid, count) in entries {
        let endpoint = endpoint_with_sensors(100 + tid, &format!("t{}", tid), *count);
        map.insert(*tid, Arc::new(Terminus::from_endpoint(*tid, &endpoint)));
    }
    Arc::new(RwLock::new(map))
}

/// Scripted command channel recording every issued exchange.
pub(crate) struct MockChannel {
    reads: Mutex<Vec<(Tid, SensorId)>>,
    polls: Mutex<Vec<(Tid, u16, u32)>>,
    poll_script: Mutex<VecDeque<Result<PolledEventChunk, ChannelError>>>,
    fail_reads: RwLock<bool>,
    gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    availability_notices: Mutex<Vec<(Eid, bool)>>,
}

impl MockChannel {
    pub(crate) fn new() -> Self {
        Self {
            reads: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
            poll_script: Mutex::new(VecDeque::new()),
            fail_reads: RwLock::new(false),
            gate: Mutex::new(None),
            availability_notices: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn reads(&self) -> Vec<(Tid, SensorId)> {
        self.reads.lock().await.clone()
    }

    pub(crate) async fn read_count(&self) -> usize {
        self.reads.lock().await.len()
    }

    pub(crate) async fn polls(&self) -> Vec<(Tid, u16, u32)> {
        self.polls.lock().await.clone()
    }

    pub(crate) async fn fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    /// Make subsequent reads block until `release_reads`.
    pub(crate) async fn block_reads(&self) {
        *self.gate.lock().await = Some(Arc::new(tokio::sync::Semaphore::new(0)));
    }

    pub(crate) async fn release_reads(&self) {
        if let Some(gate) = self.gate.lock().await.take() {
            gate.add_permits(usize::MAX >> 4);
        }
    }

    pub(crate) async fn script_poll(&self, result: Result<PolledEventChunk, ChannelError>) {
        self.poll_script.lock().await.push_back(result);
    }

    pub(crate) async fn availability_notices(&self) -> Vec<(Eid, bool)> {
        self.availability_notices.lock().await.clone()
    }
}

#[async_trait]
impl CommandChannel for MockChannel {
    async fn read_sensor(&self, tid: Tid, sensor_id: SensorId) -> Result<f64, ChannelError> {
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        if *self.fail_reads.read().await {
            return Err(ChannelError::Timeout);
        }
        self.reads.lock().await.push((tid, sensor_id));
        Ok(20.0 + sensor_id as f64)
    }

    async fn poll_for_event(
        &self,
        tid: Tid,
        event_id: u16,
        transfer_handle: u32,
    ) -> Result<PolledEventChunk, ChannelError> {
        self.polls.lock().await.push((tid, event_id, transfer_handle));
        self.poll_script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(ChannelError::Timeout))
    }

    async fn endpoint_availability_updated(&self, eid: Eid, available: bool) {
        self.availability_notices.lock().await.push((eid, available));
    }
}

/// Event handler double that records invocations and returns a fixed code.
pub(crate) struct RecordingHandler {
    pub(crate) calls: Mutex<Vec<(Tid, u16, Vec<u8>)>>,
    pub(crate) code: crate::protocol::CompletionCode,
}

impl RecordingHandler {
    pub(crate) fn returning(code: crate::protocol::CompletionCode) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            code,
        })
    }
}

#[async_trait]
impl crate::platform::event_manager::EventHandler for RecordingHandler {
    async fn handle(&self, tid: Tid, event_id: u16, data: &[u8]) -> crate::protocol::CompletionCode {
        self.calls.lock().await.push((tid, event_id, data.to_vec()));
        self.code
    }
}
