//! Sensor polling scheduler: per-terminus timers, poll tasks, availability gating.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::platform::terminus::{NumericSensor, TerminiMapper};
use crate::protocol::{CompletionCode, Tid};
use crate::transport::CommandChannel;

/// Runs one periodic polling activity per terminus.
///
/// Invariants:
/// - at most one poll task in flight per TID (`start_polling` is idempotent
///   while a task is live);
/// - a task checks availability at the start of each cycle and ends without
///   issuing a command when the terminus is unavailable (cooperative stop,
///   an in-flight exchange is never aborted);
/// - each cycle reads at most `poll_batch` sensors, resuming at the
///   round-robin cursor so large catalogs make fair progress across ticks.
pub struct SensorManager {
    state: Arc<PollState>,
}

/// Shared scheduler state, cloned into timer and poll tasks.
struct PollState {
    termini: Arc<RwLock<TerminiMapper>>,
    channel: Arc<dyn CommandChannel>,
    poll_interval: Duration,
    poll_batch: usize,
    /// Per-TID recurring timers driving `start_polling`.
    timers: Mutex<HashMap<Tid, JoinHandle<()>>>,
    /// Per-TID poll task handles; a finished handle is stale bookkeeping.
    poll_tasks: Mutex<HashMap<Tid, JoinHandle<()>>>,
    /// Availability per TID; absent means unavailable.
    available: RwLock<HashMap<Tid, bool>>,
    /// Round-robin position into each terminus's sensor catalog.
    cursors: Mutex<HashMap<Tid, usize>>,
    /// Outcome of the most recently completed poll cycle per TID.
    last_outcome: RwLock<HashMap<Tid, CompletionCode>>,
}

impl SensorManager {
    pub fn new(
        termini: Arc<RwLock<TerminiMapper>>,
        channel: Arc<dyn CommandChannel>,
        poll_interval: Duration,
        poll_batch: usize,
    ) -> Self {
        Self {
            state: Arc::new(PollState {
                termini,
                channel,
                poll_interval,
                poll_batch: poll_batch.max(1),
                timers: Mutex::new(HashMap::new()),
                poll_tasks: Mutex::new(HashMap::new()),
                available: RwLock::new(HashMap::new()),
                cursors: Mutex::new(HashMap::new()),
                last_outcome: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Arm (or re-arm) the recurring poll timer for a terminus. The timer only
    /// invokes `start_polling` on each firing; it performs no protocol I/O
    /// itself, so replacing it is always safe.
    pub async fn start_sensor_poll_timer(&self, tid: Tid) {
        if !self.state.termini.read().await.contains_key(&tid) {
            trace!("Poll timer request for unknown TID {}, ignoring", tid);
            return;
        }

        let mut timers = self.state.timers.lock().await;
        if let Some(old) = timers.remove(&tid) {
            old.abort();
        }

        let state = Arc::clone(&self.state);
        let interval = self.state.poll_interval;
        timers.insert(
            tid,
            tokio::spawn(async move {
                let mut ticker = time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately; the first poll cycle
                // belongs one interval after arming
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    PollState::start_polling(&state, tid).await;
                }
            }),
        );
        debug!("Armed sensor poll timer for TID {} ({:?})", tid, interval);
    }

    /// Ensure exactly one poll task is in flight for `tid`. A no-op while a
    /// previous task is still running or when the TID is not registered.
    pub async fn start_polling(&self, tid: Tid) {
        PollState::start_polling(&self.state, tid).await;
    }

    /// Stop the polling activity for a terminus. The timer is torn down so no
    /// new cycle starts; an in-flight task is left to finish its current
    /// exchange. Its handle stays registered so a restart while it runs
    /// cannot put a second task beside it.
    pub async fn stop_polling(&self, tid: Tid) {
        if let Some(timer) = self.state.timers.lock().await.remove(&tid) {
            timer.abort();
            debug!("Stopped sensor poll timer for TID {}", tid);
        }
    }

    /// Mark every sensor of a terminus numerically invalid. The catalog and
    /// the round-robin cursor are untouched so polling resumes cleanly once
    /// availability returns.
    pub async fn disable_terminus_sensors(&self, tid: Tid) {
        let terminus = match self.state.termini.read().await.get(&tid) {
            Some(t) => Arc::clone(t),
            None => return,
        };
        for sensor in &terminus.sensors {
            sensor.mark_invalid().await;
        }
        debug!(
            "Marked {} sensors invalid for TID {}",
            terminus.sensors.len(),
            tid
        );
    }

    pub async fn update_available_state(&self, tid: Tid, state: bool) {
        self.state.available.write().await.insert(tid, state);
    }

    /// Absent entries read as unavailable; an unknown TID never polls.
    pub async fn get_available_state(&self, tid: Tid) -> bool {
        self.state.get_available_state(tid).await
    }

    pub async fn last_poll_outcome(&self, tid: Tid) -> Option<CompletionCode> {
        self.state.last_outcome.read().await.get(&tid).copied()
    }

    /// Clear every side-table entry for a TID. Called as part of the single
    /// aggregate terminus-removal step; partial removal would leave dangling
    /// timers or task handles behind.
    pub async fn remove_terminus(&self, tid: Tid) {
        if let Some(timer) = self.state.timers.lock().await.remove(&tid) {
            timer.abort();
        }
        self.state.poll_tasks.lock().await.remove(&tid);
        self.state.available.write().await.remove(&tid);
        self.state.cursors.lock().await.remove(&tid);
        self.state.last_outcome.write().await.remove(&tid);
    }

    #[cfg(test)]
    pub(crate) async fn do_sensor_polling(&self, tid: Tid) -> CompletionCode {
        self.state.do_sensor_polling(tid).await
    }

    #[cfg(test)]
    pub(crate) async fn wait_poll_idle(&self, tid: Tid) {
        let handle = self.state.poll_tasks.lock().await.remove(&tid);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn has_side_table_entries(&self, tid: Tid) -> bool {
        self.state.timers.lock().await.contains_key(&tid)
            || self.state.poll_tasks.lock().await.contains_key(&tid)
            || self.state.available.read().await.contains_key(&tid)
            || self.state.cursors.lock().await.contains_key(&tid)
            || self.state.last_outcome.read().await.contains_key(&tid)
    }
}

impl PollState {
    async fn start_polling(state: &Arc<Self>, tid: Tid) {
        if !state.termini.read().await.contains_key(&tid) {
            return;
        }

        let mut tasks = state.poll_tasks.lock().await;
        if let Some(handle) = tasks.get(&tid) {
            if !handle.is_finished() {
                trace!("Poll task for TID {} still in flight, skipping", tid);
                return;
            }
        }

        let state = Arc::clone(state);
        tasks.insert(
            tid,
            tokio::spawn(async move {
                let code = state.do_sensor_polling(tid).await;
                // Removal may land while the cycle is suspended on the
                // channel; a removed TID must not regain a side-table entry
                if state.termini.read().await.contains_key(&tid) {
                    state.last_outcome.write().await.insert(tid, code);
                }
            }),
        );
    }

    /// One polling cycle: availability check, then up to `poll_batch` sensor
    /// reads starting at the round-robin cursor.
    async fn do_sensor_polling(&self, tid: Tid) -> CompletionCode {
        if !self.get_available_state(tid).await {
            trace!("TID {} unavailable, skipping poll cycle", tid);
            return CompletionCode::ErrorNotReady;
        }

        // Lookups after this point must fail safely: the terminus can be
        // removed while this task is suspended on the command channel.
        let terminus = match self.termini.read().await.get(&tid) {
            Some(t) => Arc::clone(t),
            None => return CompletionCode::ErrorNotReady,
        };
        if terminus.sensors.is_empty() {
            return CompletionCode::Success;
        }

        for _ in 0..self.poll_batch {
            if !self.get_available_state(tid).await {
                return CompletionCode::ErrorNotReady;
            }

            let index = {
                let cursors = self.cursors.lock().await;
                cursors.get(&tid).copied().unwrap_or(0) % terminus.sensors.len()
            };
            let sensor = Arc::clone(&terminus.sensors[index]);

            let code = self.get_sensor_reading(tid, &sensor).await;
            if !code.is_success() {
                trace!(
                    "Sensor {} read on TID {} failed with {:?}",
                    sensor.sensor_id,
                    tid,
                    code
                );
            }

            if !self.termini.read().await.contains_key(&tid) {
                // Removed while the read was suspended; the cursor table for
                // this TID is already gone and must stay gone
                return CompletionCode::ErrorNotReady;
            }

            // Advance past the sensor regardless of outcome; a failed read is
            // retried when the cursor comes around again, not synchronously.
            self.cursors
                .lock()
                .await
                .insert(tid, (index + 1) % terminus.sensors.len());
        }

        CompletionCode::Success
    }

    /// Issue the getSensorReading exchange for one sensor and apply the result.
    async fn get_sensor_reading(&self, tid: Tid, sensor: &Arc<NumericSensor>) -> CompletionCode {
        match self.channel.read_sensor(tid, sensor.sensor_id).await {
            Ok(value) => {
                sensor.update_reading(value).await;
                trace!(
                    "TID {} sensor {} = {} {}",
                    tid,
                    sensor.sensor_id,
                    value,
                    sensor.unit
                );
                CompletionCode::Success
            }
            Err(err) => {
                // Keep the previous reading; the next cycle tries again
                warn!("TID {} sensor {} read failed: {}", tid, sensor.sensor_id, err);
                err.completion_code()
            }
        }
    }

    async fn get_available_state(&self, tid: Tid) -> bool {
        *self.available.read().await.get(&tid).unwrap_or(&false)
    }
}
