// src/engine/service.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::model::{Catalog, DispatcherSettings};
use crate::dag::{Readiness, TrackAssignments};
use crate::engine::core::DispatchCore;
use crate::engine::runtime::Dispatcher;
use crate::engine::{CompletionEvent, DispatcherStatus, ExecutionRecord, TaskName};
use crate::errors::Result;
use crate::exec::Actuator;
use crate::types::{ModeVariant, Track};

const EVENT_CAPACITY: usize = 64;

/// Handle to one dispatcher instance.
///
/// Cheap to clone; every clone shares the same state, lock and actuator.
/// All methods are safe to call while the worker is running. None of them
/// hold the lock across an await.
#[derive(Clone)]
pub struct DispatchService {
    inner: Arc<Inner>,
}

struct Inner {
    core: Mutex<DispatchCore>,
    /// Wakes the worker early when something it may be waiting on changed.
    wake: Notify,
    actuator: Arc<dyn Actuator>,
    events: broadcast::Sender<CompletionEvent>,
}

impl DispatchService {
    pub fn new(catalog: &Catalog, actuator: Arc<dyn Actuator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(DispatchCore::new(catalog)),
                wake: Notify::new(),
                actuator,
                events,
            }),
        }
    }

    /// Spawn the worker loop on the current Tokio runtime.
    pub fn spawn_worker(&self) -> JoinHandle<Result<()>> {
        let dispatcher = Dispatcher::new(self.clone());
        tokio::spawn(dispatcher.run())
    }

    /// Receive a [`CompletionEvent`] for every successful completion.
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.inner.events.subscribe()
    }

    pub fn enqueue(&self, program: &str) -> Result<()> {
        self.with_core(|core| core.enqueue(program))?;
        self.wake();
        Ok(())
    }

    pub fn set_assignments(&self, assignments: TrackAssignments) -> Result<()> {
        self.with_core(|core| core.set_assignments(assignments))
    }

    /// Mark a human-track task as finished. May unblock the worker.
    pub fn complete_human_task(&self, name: &str) -> Option<CompletionEvent> {
        let event = self.with_core(|core| core.complete_human_task(name));
        match &event {
            Some(ev) => {
                self.publish(ev.clone());
                self.wake();
            }
            None => info!(task = name, "human task already finished; nothing to do"),
        }
        event
    }

    pub fn dependency_status(&self, track: Track) -> Readiness {
        self.with_core(|core| core.dependency_status(track))
    }

    /// Prerequisites of the task heading `track`, finished or not.
    pub fn dependency_requirement(&self, track: Track) -> Vec<TaskName> {
        self.with_core(|core| core.ledger().requirement(track).to_vec())
    }

    pub fn status(&self) -> DispatcherStatus {
        self.with_core(|core| core.status(Instant::now()))
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.with_core(|core| core.history().to_vec())
    }

    pub fn finished_tasks(&self) -> Vec<TaskName> {
        self.with_core(|core| core.ledger().finished().to_vec())
    }

    pub fn start_processing(&self) {
        self.with_core(|core| core.start_processing());
        self.wake();
    }

    /// Stop picking up new work. An in-flight task is kept; its monitoring
    /// is suspended until [`DispatchService::resume_processing`].
    pub fn pause_processing(&self) {
        self.with_core(|core| core.pause_processing());
        self.wake();
    }

    pub fn resume_processing(&self) {
        self.with_core(|core| core.resume_processing());
        self.wake();
    }

    pub fn set_mode(&self, mode: ModeVariant) {
        self.with_core(|core| core.set_mode(mode));
    }

    pub fn reload_catalog(&self, catalog: &Catalog) {
        self.with_core(|core| core.reload(catalog));
        self.wake();
    }

    /// Return everything to the initial state.
    ///
    /// Safe at any time: if a task is in flight the worker drops it at its
    /// next step and the actuator is force-stopped here.
    pub async fn reset(&self) {
        let was_in_flight = self.with_core(|core| core.reset(Instant::now()));
        self.wake();

        if was_in_flight {
            info!("reset interrupted an in-flight task; stopping actuator");
            if let Err(err) = self.inner.actuator.force_stop().await {
                warn!(error = %err, "failed to stop actuator during reset");
            }
        }
    }

    /// Ask the worker loop to exit at its next iteration.
    pub fn shutdown(&self) {
        self.with_core(|core| core.request_shutdown());
        self.wake();
    }

    pub fn is_shutdown(&self) -> bool {
        self.with_core(|core| core.is_shutdown())
    }

    pub fn settings(&self) -> DispatcherSettings {
        self.with_core(|core| core.settings().clone())
    }

    pub(crate) fn actuator(&self) -> Arc<dyn Actuator> {
        Arc::clone(&self.inner.actuator)
    }

    pub(crate) fn publish(&self, event: CompletionEvent) {
        info!(
            track = %event.track,
            task_id = %event.task_id,
            task = %event.name,
            timestamp_ms = event.timestamp_ms,
            "task completed"
        );
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Run `f` under the dispatcher lock.
    pub(crate) fn with_core<R>(&self, f: impl FnOnce(&mut DispatchCore) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Sleep for `dur`, returning early if someone calls [`Self::wake`].
    pub(crate) async fn wait(&self, dur: Duration) {
        tokio::select! {
            _ = self.inner.wake.notified() => {}
            _ = tokio::time::sleep(dur) => {}
        }
    }

    fn wake(&self) {
        self.inner.wake.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, DispatchCore> {
        // A panic while holding the lock leaves the core in a consistent
        // state between method calls, so keep going.
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
