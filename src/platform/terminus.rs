//! Terminus registry entries and shared numeric sensor records.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::protocol::{Eid, SensorId, Tid};
use crate::transport::{EndpointDescriptor, SensorDescriptor};

/// Map of currently registered termini, keyed by TID.
///
/// Single writer (the discovery path), many readers. Any per-TID side table
/// elsewhere must be cleared when a TID is erased here.
pub type TerminiMapper = HashMap<Tid, Arc<Terminus>>;

/// Shared numeric sensor record.
///
/// The reading has interior mutability so the polling scheduler can update it
/// while the catalog and external observers hold the same `Arc`. `None` is the
/// "numerically invalid" marker set when the terminus becomes unavailable.
#[derive(Debug)]
pub struct NumericSensor {
    pub sensor_id: SensorId,
    pub name: String,
    pub unit: String,
    pub max_threshold: Option<f64>,
    pub crit_threshold: Option<f64>,
    reading: RwLock<Option<f64>>,
}

impl NumericSensor {
    pub fn new(desc: &SensorDescriptor) -> Self {
        Self {
            sensor_id: desc.sensor_id,
            name: desc.name.clone(),
            unit: desc.unit.clone(),
            max_threshold: desc.max_threshold,
            crit_threshold: desc.crit_threshold,
            reading: RwLock::new(None),
        }
    }

    pub async fn update_reading(&self, value: f64) {
        *self.reading.write().await = Some(value);
    }

    /// Mark the sensor numerically invalid without touching its metadata.
    pub async fn mark_invalid(&self) {
        *self.reading.write().await = None;
    }

    pub async fn reading(&self) -> Option<f64> {
        *self.reading.read().await
    }

    pub async fn is_valid(&self) -> bool {
        self.reading.read().await.is_some()
    }
}

/// A discovered terminus: TID, source endpoint, and its ordered sensor catalog.
#[derive(Debug)]
pub struct Terminus {
    pub tid: Tid,
    pub eid: Eid,
    pub name: String,
    pub sensors: Vec<Arc<NumericSensor>>,
}

impl Terminus {
    pub fn from_endpoint(tid: Tid, endpoint: &EndpointDescriptor) -> Self {
        let sensors = endpoint
            .sensors
            .iter()
            .map(|desc| Arc::new(NumericSensor::new(desc)))
            .collect();
        Self {
            tid,
            eid: endpoint.eid,
            name: endpoint.name.clone(),
            sensors,
        }
    }

    pub fn sensor(&self, sensor_id: SensorId) -> Option<&Arc<NumericSensor>> {
        self.sensors.iter().find(|s| s.sensor_id == sensor_id)
    }
}
