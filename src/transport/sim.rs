//! Simulated command channel for bring-up and --test runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::types::TransportSettings;
use crate::protocol::{Eid, SensorId, Tid, EVENT_ID_ACK_ONLY, TRANSFER_HANDLE_NULL};
use crate::transport::{
    ChannelError, CommandChannel, EndpointDescriptor, PolledEventChunk, SensorDescriptor,
};

/// Loopback channel serving a configurable set of simulated termini.
///
/// Readings are deterministic: a per-sensor base value plus a small ramp
/// derived from a global exchange counter, so repeated sweeps show movement
/// without needing real hardware behind the transport.
pub struct SimChannel {
    endpoints: Vec<EndpointDescriptor>,
    bases: HashMap<(Eid, SensorId), f64>,
    exchanges: AtomicU64,
    offline: RwLock<HashMap<Eid, bool>>,
}

impl SimChannel {
    pub fn new(settings: &TransportSettings) -> Self {
        let mut endpoints = Vec::new();
        let mut bases = HashMap::new();

        for n in 0..settings.sim_termini {
            let eid = 10 + n;
            let mut sensors = Vec::new();
            for s in 0..settings.sim_sensors_per_terminus {
                let sensor_id = s + 1;
                sensors.push(SensorDescriptor {
                    sensor_id,
                    name: format!("sim{}_temp{}", n, sensor_id),
                    unit: "degrees_c".to_string(),
                    max_threshold: Some(80.0),
                    crit_threshold: Some(95.0),
                });
                // Spread base values so termini are distinguishable in logs
                bases.insert((eid, sensor_id), 25.0 + n as f64 * 5.0 + s as f64);
            }
            endpoints.push(EndpointDescriptor {
                eid,
                name: format!("sim-terminus-{}", n),
                sensors,
            });
        }

        Self {
            endpoints,
            bases,
            exchanges: AtomicU64::new(0),
            offline: RwLock::new(HashMap::new()),
        }
    }

    /// Endpoint descriptors to feed into the discovery entry point.
    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        self.endpoints.clone()
    }

    fn eid_for_tid(&self, tid: Tid) -> Option<Eid> {
        // Simulated endpoints are registered in order, so the discovery layer
        // assigns TIDs 1..=N to EIDs 10..=10+N-1.
        let index = tid.checked_sub(1)? as usize;
        self.endpoints.get(index).map(|e| e.eid)
    }
}

#[async_trait]
impl CommandChannel for SimChannel {
    async fn read_sensor(&self, tid: Tid, sensor_id: SensorId) -> Result<f64, ChannelError> {
        let eid = self.eid_for_tid(tid).ok_or(ChannelError::Unknown)?;
        if *self.offline.read().await.get(&eid).unwrap_or(&false) {
            return Err(ChannelError::Timeout);
        }
        let base = self
            .bases
            .get(&(eid, sensor_id))
            .ok_or(ChannelError::Unknown)?;
        let tick = self.exchanges.fetch_add(1, Ordering::Relaxed);
        let value = base + (tick % 10) as f64 * 0.1;
        Ok((value * 10.0).round() / 10.0)
    }

    async fn poll_for_event(
        &self,
        _tid: Tid,
        _event_id: u16,
        _transfer_handle: u32,
    ) -> Result<PolledEventChunk, ChannelError> {
        // The simulator raises no asynchronous events
        Ok(PolledEventChunk {
            event_id: EVENT_ID_ACK_ONLY,
            event_class: 0,
            data: Vec::new(),
            more: false,
            next_transfer_handle: TRANSFER_HANDLE_NULL,
        })
    }

    async fn endpoint_availability_updated(&self, eid: Eid, available: bool) {
        debug!("Sim endpoint {} availability -> {}", eid, available);
        self.offline.write().await.insert(eid, !available);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TransportSettings {
        TransportSettings {
            backend: "sim".to_string(),
            sim_termini: 2,
            sim_sensors_per_terminus: 3,
        }
    }

    #[tokio::test]
    async fn readings_are_deterministic_and_bounded() {
        let sim = SimChannel::new(&settings());
        assert_eq!(sim.endpoints().len(), 2);

        let first = sim.read_sensor(1, 1).await.unwrap();
        assert!((25.0..=26.0).contains(&first));
        assert!(sim.read_sensor(1, 99).await.is_err());
        assert!(sim.read_sensor(9, 1).await.is_err());
    }

    #[tokio::test]
    async fn offline_endpoint_times_out() {
        let sim = SimChannel::new(&settings());
        sim.endpoint_availability_updated(10, false).await;
        assert!(matches!(
            sim.read_sensor(1, 1).await,
            Err(ChannelError::Timeout)
        ));
    }
}
