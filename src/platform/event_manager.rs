//! Event dispatcher: class-keyed handler registry and poll-for-event pulls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::platform::terminus::TerminiMapper;
use crate::protocol::{CompletionCode, EventClass, Tid, EVENT_ID_ACK_ONLY};
use crate::transport::CommandChannel;

/// Handler invoked for events of one registered class.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, tid: Tid, event_id: u16, data: &[u8]) -> CompletionCode;
}

/// Routes inbound and polled event payloads to registered handlers and
/// mirrors per-terminus availability for event-driven background flows.
pub struct EventManager {
    termini: Arc<RwLock<TerminiMapper>>,
    channel: Arc<dyn CommandChannel>,
    handlers: RwLock<HashMap<EventClass, Vec<Arc<dyn EventHandler>>>>,
    /// Availability per TID; absent means unavailable.
    available: RwLock<HashMap<Tid, bool>>,
}

impl EventManager {
    pub fn new(termini: Arc<RwLock<TerminiMapper>>, channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            termini,
            channel,
            handlers: RwLock::new(HashMap::new()),
            available: RwLock::new(HashMap::new()),
        }
    }

    /// Install the handler list for an event class; the last registration for
    /// a class wins.
    pub async fn register_polled_event_handler(
        &self,
        class: EventClass,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) {
        debug!("Registered {} handler(s) for {:?} events", handlers.len(), class);
        self.handlers.write().await.insert(class, handlers);
    }

    /// Invoke the handlers registered for `class` in order. Returns the first
    /// non-success code, success when all handlers accept the event, or the
    /// unknown-class code when nothing is registered.
    pub async fn handle_platform_event(
        &self,
        tid: Tid,
        event_id: u16,
        class: EventClass,
        data: &[u8],
    ) -> CompletionCode {
        let handlers = match self.handlers.read().await.get(&class) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => {
                trace!("No handler registered for {:?} event from TID {}", class, tid);
                return CompletionCode::UnknownEventClass;
            }
        };

        for handler in handlers {
            let code = handler.handle(tid, event_id, data).await;
            if !code.is_success() {
                return code;
            }
        }
        CompletionCode::Success
    }

    /// Pull the full event announced by a message-poll notification,
    /// reassembling a segmented transfer, then dispatch it like an unsolicited
    /// event of its class. No dispatch happens on a failed pull.
    pub async fn poll_for_platform_event(
        &self,
        tid: Tid,
        poll_event_id: u16,
        poll_data_transfer_handle: u32,
    ) -> CompletionCode {
        if poll_event_id == EVENT_ID_ACK_ONLY {
            return CompletionCode::Success;
        }
        if !self.get_available_state(tid).await {
            return CompletionCode::ErrorNotReady;
        }

        let mut transfer_handle = poll_data_transfer_handle;
        let mut data = Vec::new();
        let mut event_id = poll_event_id;
        let mut class_byte = 0u8;

        loop {
            // The terminus can vanish between parts; fail safely, not loudly
            if !self.termini.read().await.contains_key(&tid) {
                return CompletionCode::ErrorNotReady;
            }

            match self
                .channel
                .poll_for_event(tid, poll_event_id, transfer_handle)
                .await
            {
                Ok(chunk) => {
                    event_id = chunk.event_id;
                    class_byte = chunk.event_class;
                    data.extend_from_slice(&chunk.data);
                    if !chunk.more {
                        break;
                    }
                    transfer_handle = chunk.next_transfer_handle;
                }
                Err(err) => {
                    warn!("Poll for event {} on TID {} failed: {}", poll_event_id, tid, err);
                    return err.completion_code();
                }
            }
        }

        if event_id == EVENT_ID_ACK_ONLY {
            // Terminus had nothing pending after all
            return CompletionCode::Success;
        }

        match EventClass::from_u8(class_byte) {
            Some(class) => self.handle_platform_event(tid, event_id, class, &data).await,
            None => {
                warn!("TID {} delivered unsupported event class 0x{:02x}", tid, class_byte);
                CompletionCode::ErrorUnsupported
            }
        }
    }

    pub async fn update_available_state(&self, tid: Tid, state: bool) {
        self.available.write().await.insert(tid, state);
    }

    /// Absent entries read as unavailable.
    pub async fn get_available_state(&self, tid: Tid) -> bool {
        *self.available.read().await.get(&tid).unwrap_or(&false)
    }

    /// Side-table cleanup for the aggregate terminus-removal step.
    pub async fn remove_terminus(&self, tid: Tid) {
        self.available.write().await.remove(&tid);
    }

    #[cfg(test)]
    pub(crate) async fn has_side_table_entries(&self, tid: Tid) -> bool {
        self.available.read().await.contains_key(&tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testutil::{registry_with, MockChannel, RecordingHandler};
    use crate::protocol::TRANSFER_HANDLE_NULL;
    use crate::transport::{ChannelError, PolledEventChunk};

    fn dispatcher(
        termini: Arc<RwLock<TerminiMapper>>,
        channel: Arc<MockChannel>,
    ) -> EventManager {
        EventManager::new(termini, channel)
    }

    #[tokio::test]
    async fn unregistered_class_returns_unknown_code() {
        let em = dispatcher(registry_with(&[(1, 1)]), Arc::new(MockChannel::new()));
        let code = em
            .handle_platform_event(1, 0, EventClass::Sensor, &[1, 2, 3])
            .await;
        assert_eq!(code, CompletionCode::UnknownEventClass);
    }

    #[tokio::test]
    async fn handlers_run_in_order_and_first_failure_wins() {
        let em = dispatcher(registry_with(&[(1, 1)]), Arc::new(MockChannel::new()));
        let ok = RecordingHandler::returning(CompletionCode::Success);
        let bad = RecordingHandler::returning(CompletionCode::Error);
        let unreached = RecordingHandler::returning(CompletionCode::Success);
        em.register_polled_event_handler(
            EventClass::Cper,
            vec![ok.clone(), bad.clone(), unreached.clone()],
        )
        .await;

        let code = em
            .handle_platform_event(1, 7, EventClass::Cper, b"payload")
            .await;
        assert_eq!(code, CompletionCode::Error);
        assert_eq!(ok.calls.lock().await.len(), 1);
        assert_eq!(bad.calls.lock().await.len(), 1);
        assert!(unreached.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn last_registration_for_a_class_wins() {
        let em = dispatcher(registry_with(&[(1, 1)]), Arc::new(MockChannel::new()));
        let first = RecordingHandler::returning(CompletionCode::Success);
        let second = RecordingHandler::returning(CompletionCode::Success);
        em.register_polled_event_handler(EventClass::Sensor, vec![first.clone()])
            .await;
        em.register_polled_event_handler(EventClass::Sensor, vec![second.clone()])
            .await;

        em.handle_platform_event(1, 0, EventClass::Sensor, &[]).await;
        assert!(first.calls.lock().await.is_empty());
        assert_eq!(second.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn segmented_pull_reassembles_before_dispatch() {
        let channel = Arc::new(MockChannel::new());
        let em = dispatcher(registry_with(&[(2, 1)]), channel.clone());
        em.update_available_state(2, true).await;

        let handler = RecordingHandler::returning(CompletionCode::Success);
        em.register_polled_event_handler(EventClass::Cper, vec![handler.clone()])
            .await;

        channel
            .script_poll(Ok(PolledEventChunk {
                event_id: 0x0011,
                event_class: EventClass::Cper as u8,
                data: vec![0xAA, 0xBB],
                more: true,
                next_transfer_handle: 99,
            }))
            .await;
        channel
            .script_poll(Ok(PolledEventChunk {
                event_id: 0x0011,
                event_class: EventClass::Cper as u8,
                data: vec![0xCC],
                more: false,
                next_transfer_handle: TRANSFER_HANDLE_NULL,
            }))
            .await;

        let code = em
            .poll_for_platform_event(2, 0x0011, TRANSFER_HANDLE_NULL)
            .await;
        assert_eq!(code, CompletionCode::Success);

        let calls = handler.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (2, 0x0011, vec![0xAA, 0xBB, 0xCC]));

        // Second exchange resumed with the announced transfer handle
        assert_eq!(channel.polls().await[1], (2, 0x0011, 99));
    }

    #[tokio::test]
    async fn failed_pull_dispatches_nothing() {
        let channel = Arc::new(MockChannel::new());
        let em = dispatcher(registry_with(&[(2, 1)]), channel.clone());
        em.update_available_state(2, true).await;

        let handler = RecordingHandler::returning(CompletionCode::Success);
        em.register_polled_event_handler(EventClass::Cper, vec![handler.clone()])
            .await;
        channel.script_poll(Err(ChannelError::Busy)).await;

        let code = em
            .poll_for_platform_event(2, 0x0022, TRANSFER_HANDLE_NULL)
            .await;
        assert_eq!(code, CompletionCode::ErrorNotReady);
        assert!(handler.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unavailable_terminus_pulls_nothing() {
        let channel = Arc::new(MockChannel::new());
        let em = dispatcher(registry_with(&[(2, 1)]), channel.clone());

        let code = em
            .poll_for_platform_event(2, 0x0033, TRANSFER_HANDLE_NULL)
            .await;
        assert_eq!(code, CompletionCode::ErrorNotReady);
        assert!(channel.polls().await.is_empty());
    }

    #[tokio::test]
    async fn ack_only_event_id_is_a_successful_noop() {
        let channel = Arc::new(MockChannel::new());
        let em = dispatcher(registry_with(&[(2, 1)]), channel.clone());
        em.update_available_state(2, true).await;

        let code = em
            .poll_for_platform_event(2, EVENT_ID_ACK_ONLY, TRANSFER_HANDLE_NULL)
            .await;
        assert_eq!(code, CompletionCode::Success);
        assert!(channel.polls().await.is_empty());
    }
}
