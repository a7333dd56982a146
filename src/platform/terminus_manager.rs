//! Terminus discovery bookkeeping: endpoint/TID mapping and registry writes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::platform::terminus::{TerminiMapper, Terminus};
use crate::protocol::{Eid, Tid, TID_RESERVED, TID_UNASSIGNED};
use crate::transport::{CommandChannel, EndpointDescriptor};

/// Owns the endpoint-to-TID mapping and is the only writer of the terminus
/// registry. The handshake and resource-descriptor parsing live below the
/// transport seam; this component works from finished endpoint descriptors.
pub struct TerminusManager {
    termini: Arc<RwLock<TerminiMapper>>,
    channel: Arc<dyn CommandChannel>,
    eid_to_tid: RwLock<HashMap<Eid, Tid>>,
    /// Link-level availability per endpoint, as last reported by transport.
    endpoint_available: RwLock<HashMap<Eid, bool>>,
}

impl TerminusManager {
    pub fn new(termini: Arc<RwLock<TerminiMapper>>, channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            termini,
            channel,
            eid_to_tid: RwLock::new(HashMap::new()),
            endpoint_available: RwLock::new(HashMap::new()),
        }
    }

    /// Register newly discovered endpoints, returning the TIDs assigned to
    /// endpoints that were not already registered.
    pub async fn discover_endpoints(&self, endpoints: &[EndpointDescriptor]) -> Vec<Tid> {
        let mut added = Vec::new();
        for endpoint in endpoints {
            if let Some(tid) = self.eid_to_tid.read().await.get(&endpoint.eid) {
                debug!("Endpoint EID {} already registered as TID {}", endpoint.eid, tid);
                continue;
            }

            let tid = match self.allocate_tid().await {
                Some(tid) => tid,
                None => {
                    warn!("TID space exhausted, cannot register EID {}", endpoint.eid);
                    continue;
                }
            };

            let terminus = Arc::new(Terminus::from_endpoint(tid, endpoint));
            info!(
                "Registered terminus '{}' (EID {}) as TID {} with {} sensors",
                endpoint.name,
                endpoint.eid,
                tid,
                terminus.sensors.len()
            );
            self.termini.write().await.insert(tid, terminus);
            self.eid_to_tid.write().await.insert(endpoint.eid, tid);
            self.endpoint_available.write().await.insert(endpoint.eid, true);
            added.push(tid);
        }
        added
    }

    /// Erase removed endpoints from the registry, returning the TIDs that
    /// were dropped so the caller can clear every per-TID side table in the
    /// same logical step.
    pub async fn remove_endpoints(&self, endpoints: &[EndpointDescriptor]) -> Vec<Tid> {
        let mut removed = Vec::new();
        for endpoint in endpoints {
            let tid = match self.eid_to_tid.write().await.remove(&endpoint.eid) {
                Some(tid) => tid,
                None => continue,
            };
            self.endpoint_available.write().await.remove(&endpoint.eid);
            if self.termini.write().await.remove(&tid).is_some() {
                info!("Removed terminus TID {} (EID {})", tid, endpoint.eid);
                removed.push(tid);
            }
        }
        removed
    }

    /// Resolve an endpoint to the TID of its registered terminus.
    pub async fn to_tid(&self, eid: Eid) -> Option<Tid> {
        self.eid_to_tid.read().await.get(&eid).copied()
    }

    /// Record the transport-reported endpoint availability and echo it back
    /// to the channel so link state and management state stay aligned.
    pub async fn update_endpoint_availability(&self, eid: Eid, available: bool) {
        self.endpoint_available.write().await.insert(eid, available);
        self.channel.endpoint_availability_updated(eid, available).await;
    }

    /// Look up the EID for a terminus by name, absent when the name is
    /// unknown or the endpoint is not currently active.
    pub async fn get_active_eid_by_name(&self, terminus_name: &str) -> Option<Eid> {
        let termini = self.termini.read().await;
        let eid = termini
            .values()
            .find(|t| t.name == terminus_name)
            .map(|t| t.eid)?;
        drop(termini);

        if *self.endpoint_available.read().await.get(&eid).unwrap_or(&false) {
            Some(eid)
        } else {
            None
        }
    }

    /// First free TID in the assignable range.
    async fn allocate_tid(&self) -> Option<Tid> {
        let termini = self.termini.read().await;
        ((TID_UNASSIGNED + 1)..TID_RESERVED).find(|tid| !termini.contains_key(tid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testutil::{endpoint_with_sensors, MockChannel};

    fn make() -> (TerminusManager, Arc<RwLock<TerminiMapper>>, Arc<MockChannel>) {
        let termini = Arc::new(RwLock::new(TerminiMapper::new()));
        let channel = Arc::new(MockChannel::new());
        let tm = TerminusManager::new(Arc::clone(&termini), channel.clone());
        (tm, termini, channel)
    }

    #[tokio::test]
    async fn discovery_assigns_sequential_tids_once_per_endpoint() {
        let (tm, termini, _) = make();
        let eps = vec![
            endpoint_with_sensors(10, "alpha", 2),
            endpoint_with_sensors(11, "beta", 1),
        ];

        let added = tm.discover_endpoints(&eps).await;
        assert_eq!(added, vec![1, 2]);

        // Re-announcing the same endpoints adds nothing
        let again = tm.discover_endpoints(&eps).await;
        assert!(again.is_empty());
        assert_eq!(termini.read().await.len(), 2);
        assert_eq!(tm.to_tid(11).await, Some(2));
    }

    #[tokio::test]
    async fn removal_returns_dropped_tids_and_clears_maps() {
        let (tm, termini, _) = make();
        let eps = vec![endpoint_with_sensors(10, "alpha", 1)];
        tm.discover_endpoints(&eps).await;

        let removed = tm.remove_endpoints(&eps).await;
        assert_eq!(removed, vec![1]);
        assert!(termini.read().await.is_empty());
        assert_eq!(tm.to_tid(10).await, None);

        // Removing an unknown endpoint is a silent no-op
        assert!(tm.remove_endpoints(&eps).await.is_empty());
    }

    #[tokio::test]
    async fn freed_tids_are_reused() {
        let (tm, _, _) = make();
        let first = vec![endpoint_with_sensors(10, "alpha", 1)];
        tm.discover_endpoints(&first).await;
        tm.remove_endpoints(&first).await;

        let next = tm
            .discover_endpoints(&[endpoint_with_sensors(12, "gamma", 1)])
            .await;
        assert_eq!(next, vec![1]);
    }

    #[tokio::test]
    async fn active_eid_lookup_requires_available_endpoint() {
        let (tm, _, channel) = make();
        tm.discover_endpoints(&[endpoint_with_sensors(10, "alpha", 1)])
            .await;

        assert_eq!(tm.get_active_eid_by_name("alpha").await, Some(10));
        assert_eq!(tm.get_active_eid_by_name("nonesuch").await, None);

        tm.update_endpoint_availability(10, false).await;
        assert_eq!(tm.get_active_eid_by_name("alpha").await, None);
        assert_eq!(channel.availability_notices().await, vec![(10, false)]);
    }
}
