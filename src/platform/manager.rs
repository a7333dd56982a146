//! Manager facade: single seam between discovery, protocol dispatch and the
//! polling/event components.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::platform::event_manager::{EventHandler, EventManager};
use crate::platform::sensor_manager::SensorManager;
use crate::platform::terminus::{TerminiMapper, Terminus};
use crate::platform::terminus_manager::TerminusManager;
use crate::protocol::{event_data_at, CompletionCode, Eid, EventClass, Tid, EVENT_ID_NULL};
use crate::transport::{CommandChannel, EndpointDescriptor};

/// Vendor-extension poll routine, tried in registration order.
#[async_trait]
pub trait OemPollHandler: Send + Sync {
    async fn poll(&self, tid: Tid) -> CompletionCode;
}

/// Entry point used by the transport-discovery layer and by the protocol
/// command dispatch layer. Owns the terminus registry and wires the
/// discovery bookkeeping, sensor polling scheduler and event dispatcher.
pub struct Manager {
    termini: Arc<RwLock<TerminiMapper>>,
    terminus_manager: TerminusManager,
    sensor_manager: SensorManager,
    event_manager: EventManager,
    oem_poll_handlers: RwLock<Vec<Arc<dyn OemPollHandler>>>,
}

impl Manager {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        poll_interval: Duration,
        poll_batch: usize,
    ) -> Self {
        let termini: Arc<RwLock<TerminiMapper>> = Arc::new(RwLock::new(TerminiMapper::new()));
        Self {
            terminus_manager: TerminusManager::new(Arc::clone(&termini), Arc::clone(&channel)),
            sensor_manager: SensorManager::new(
                Arc::clone(&termini),
                Arc::clone(&channel),
                poll_interval,
                poll_batch,
            ),
            event_manager: EventManager::new(Arc::clone(&termini), channel),
            oem_poll_handlers: RwLock::new(Vec::new()),
            termini,
        }
    }

    /// Discovery reported new endpoints: register them and start their
    /// polling activity.
    pub async fn handle_mctp_endpoints(&self, endpoints: &[EndpointDescriptor]) {
        for tid in self.terminus_manager.discover_endpoints(endpoints).await {
            self.sensor_manager.update_available_state(tid, true).await;
            self.event_manager.update_available_state(tid, true).await;
            self.sensor_manager.start_sensor_poll_timer(tid).await;
        }
    }

    /// Discovery reported removed endpoints: erase them and, in the same
    /// logical step, clear every per-TID side table.
    pub async fn handle_removed_mctp_endpoints(&self, endpoints: &[EndpointDescriptor]) {
        for tid in self.terminus_manager.remove_endpoints(endpoints).await {
            self.sensor_manager.remove_terminus(tid).await;
            self.event_manager.remove_terminus(tid).await;
        }
    }

    /// Availability change for an endpoint. Unknown endpoints are a silent
    /// no-op: the change may race terminus promotion and must not fail.
    pub async fn update_mctp_endpoint_availability(&self, eid: Eid, available: bool) {
        if let Some(tid) = self.terminus_manager.to_tid(eid).await {
            if available {
                self.sensor_manager.start_sensor_poll_timer(tid).await;
            } else {
                self.sensor_manager.disable_terminus_sensors(tid).await;
            }
            self.update_available_state(tid, available).await;
        } else {
            trace!("Availability change for unknown EID {}, ignoring", eid);
        }
        self.terminus_manager
            .update_endpoint_availability(eid, available)
            .await;
    }

    pub async fn start_sensor_polling(&self, tid: Tid) {
        self.sensor_manager.start_polling(tid).await;
    }

    pub async fn stop_sensor_polling(&self, tid: Tid) {
        self.sensor_manager.stop_polling(tid).await;
    }

    /// Propagate availability to the scheduler and dispatcher tables so that
    /// running tasks observe it at their next check point. The `false` state
    /// is the cooperative stop signal, never a forced cancellation.
    pub async fn update_available_state(&self, tid: Tid, state: bool) {
        if !self.termini.read().await.contains_key(&tid) {
            return;
        }
        self.sensor_manager.update_available_state(tid, state).await;
        self.event_manager.update_available_state(tid, state).await;
        debug!("TID {} availability -> {}", tid, state);
    }

    pub async fn handle_sensor_event(
        &self,
        payload: &[u8],
        payload_len: usize,
        tid: Tid,
        event_data_offset: usize,
    ) -> CompletionCode {
        self.handle_event_message(EventClass::Sensor, payload, payload_len, tid, event_data_offset)
            .await
    }

    pub async fn handle_cper_event(
        &self,
        payload: &[u8],
        payload_len: usize,
        tid: Tid,
        event_data_offset: usize,
    ) -> CompletionCode {
        self.handle_event_message(EventClass::Cper, payload, payload_len, tid, event_data_offset)
            .await
    }

    pub async fn handle_message_poll_event(
        &self,
        payload: &[u8],
        payload_len: usize,
        tid: Tid,
        event_data_offset: usize,
    ) -> CompletionCode {
        self.handle_event_message(
            EventClass::MessagePoll,
            payload,
            payload_len,
            tid,
            event_data_offset,
        )
        .await
    }

    /// The three unsolicited-event entry points differ only in event class.
    async fn handle_event_message(
        &self,
        class: EventClass,
        payload: &[u8],
        payload_len: usize,
        tid: Tid,
        event_data_offset: usize,
    ) -> CompletionCode {
        let data = match event_data_at(payload, payload_len, event_data_offset) {
            Some(data) => data,
            None => return CompletionCode::ErrorInvalidLength,
        };
        self.event_manager
            .handle_platform_event(tid, EVENT_ID_NULL, class, data)
            .await
    }

    /// Pull the full event announced by a message-poll notification and
    /// dispatch it; returns a non-success code without dispatching on any
    /// pull failure.
    pub async fn poll_for_platform_event(
        &self,
        tid: Tid,
        poll_event_id: u16,
        poll_data_transfer_handle: u32,
    ) -> CompletionCode {
        self.event_manager
            .poll_for_platform_event(tid, poll_event_id, poll_data_transfer_handle)
            .await
    }

    /// Dispatch a polled event whose payload already carries its event id.
    pub async fn handle_polled_cper_event(
        &self,
        tid: Tid,
        event_id: u16,
        data: &[u8],
    ) -> CompletionCode {
        self.event_manager
            .handle_platform_event(tid, event_id, EventClass::Cper, data)
            .await
    }

    pub async fn register_polled_event_handler(
        &self,
        class: EventClass,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) {
        self.event_manager
            .register_polled_event_handler(class, handlers)
            .await;
    }

    /// Append a vendor poll routine to the ordered extension list.
    pub async fn register_oem_poll_method(&self, handler: Arc<dyn OemPollHandler>) {
        self.oem_poll_handlers.write().await.push(handler);
    }

    /// Try the registered OEM poll routines in order; the first success wins,
    /// exhaustion is reported as failure.
    pub async fn oem_poll_for_platform_event(&self, tid: Tid) -> CompletionCode {
        let handlers = self.oem_poll_handlers.read().await.clone();
        for handler in handlers {
            let code = handler.poll(tid).await;
            if code.is_success() {
                return code;
            }
        }
        CompletionCode::Error
    }

    pub async fn get_active_eid_by_name(&self, terminus_name: &str) -> Option<Eid> {
        self.terminus_manager.get_active_eid_by_name(terminus_name).await
    }

    pub async fn terminus(&self, tid: Tid) -> Option<Arc<Terminus>> {
        self.termini.read().await.get(&tid).map(Arc::clone)
    }

    /// Registered TIDs in ascending order.
    pub async fn tids(&self) -> Vec<Tid> {
        let mut tids: Vec<Tid> = self.termini.read().await.keys().copied().collect();
        tids.sort_unstable();
        tids
    }

    pub fn sensor_manager(&self) -> &SensorManager {
        &self.sensor_manager
    }
}
