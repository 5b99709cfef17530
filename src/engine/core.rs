// src/engine/core.rs

//! Synchronous dispatcher state.
//!
//! `DispatchCore` owns the dependency ledger, the assignment tracker, the
//! automated queue and the in-flight task. It performs no IO and never
//! awaits; the service wraps it in a single mutex and the worker calls into
//! it between actuator calls.
//!
//! Every in-flight operation carries the `epoch` it was dequeued in. A reset
//! bumps the epoch, so calls made on behalf of a task that was reset away
//! are ignored (they return `None` / `false`).

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::model::{Catalog, DispatcherSettings};
use crate::dag::{AssignmentTracker, DependencyLedger, ProgramIndex, Readiness, TrackAssignments};
use crate::engine::queue::{AutomatedQueue, QueuedTask, RetryDecision};
use crate::engine::{
    CompletionEvent, DispatchPhase, DispatcherStatus, ExecutionRecord, ProgramId, TaskName,
    now_ms,
};
use crate::errors::{DuodagError, Result};
use crate::types::{ModeVariant, Track};

/// A task the worker has dequeued and is driving through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub epoch: u64,
    pub queued: QueuedTask,
    pub name: TaskName,
    /// Estimated duration plus the safety buffer.
    pub max_wait: Duration,
}

impl InFlight {
    pub fn program(&self) -> &str {
        &self.queued.program
    }
}

#[derive(Debug)]
struct CurrentTask {
    program: ProgramId,
    name: TaskName,
    deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct DispatchCore {
    settings: DispatcherSettings,
    ledger: DependencyLedger,
    assignments: AssignmentTracker,
    queue: AutomatedQueue,
    programs: ProgramIndex,
    phase: DispatchPhase,
    current: Option<CurrentTask>,
    started: bool,
    mode: ModeVariant,
    message: String,
    history: Vec<ExecutionRecord>,
    last_activity: Instant,
    epoch: u64,
    all_completed: bool,
    shutdown: bool,
}

impl DispatchCore {
    pub fn new(catalog: &Catalog) -> Self {
        let mut ledger = DependencyLedger::default();
        ledger.load(catalog.dependency_definitions());

        Self {
            settings: catalog.dispatcher.clone(),
            ledger,
            assignments: AssignmentTracker::new(catalog.human_only_tasks()),
            queue: AutomatedQueue::new(catalog.dispatcher.max_retries),
            programs: catalog.program_index(),
            phase: DispatchPhase::Idle,
            current: None,
            started: false,
            mode: ModeVariant::default(),
            message: idle_message(),
            history: Vec::new(),
            last_activity: Instant::now(),
            epoch: 0,
            all_completed: false,
            shutdown: false,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &DependencyLedger {
        &self.ledger
    }

    pub fn assignments(&self) -> &AssignmentTracker {
        &self.assignments
    }

    pub fn history(&self) -> &[ExecutionRecord] {
        &self.history
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    pub fn mode(&self) -> ModeVariant {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Swap in a new dependency map and program index. Finished tasks,
    /// queue and assignments are untouched.
    pub fn reload(&mut self, catalog: &Catalog) {
        self.ledger.load(catalog.dependency_definitions());
        self.assignments.set_human_only(catalog.human_only_tasks());
        self.programs = catalog.program_index();
        self.refresh_requirement(Track::Human);
        self.refresh_requirement(Track::Automated);
        info!(
            tasks = catalog.task.len(),
            programs = self.programs.len(),
            "catalog reloaded"
        );
    }

    // ---------------------------------------------------------------------
    // External API
    // ---------------------------------------------------------------------

    /// Queue `program` for the actuator. Programs of human-only tasks are
    /// refused.
    pub fn enqueue(&mut self, program: &str) -> Result<()> {
        let program = program.trim();
        if let Some(name) = self.programs.human_only_task(program) {
            let msg = format!("task '{name}' ({program}) is restricted to the human track");
            warn!(program, task = %name, "refusing to queue human-only task");
            self.message = msg.clone();
            return Err(DuodagError::AssignmentError(msg));
        }

        self.queue.enqueue(program);
        self.all_completed = false;
        info!(
            program,
            task = %self.programs.name_for(program),
            depth = self.queue.len(),
            "automated task queued"
        );
        Ok(())
    }

    pub fn set_assignments(&mut self, assignments: TrackAssignments) -> Result<()> {
        self.assignments.set_assignments(assignments)?;
        self.refresh_requirement(Track::Human);
        self.refresh_requirement(Track::Automated);
        Ok(())
    }

    /// Record that the human operator finished `name`.
    ///
    /// Returns `None` if the task was already finished. A stale entry at the
    /// head of the human assignments is still cleared in that case.
    pub fn complete_human_task(&mut self, name: &str) -> Option<CompletionEvent> {
        let name = name.trim();
        let newly_finished = self.ledger.mark_finished(name);

        if self.assignments.track_of(name) == Some(Track::Human) {
            self.assignments.remove_completed(Track::Human, name);
            self.refresh_requirement(Track::Human);
        }
        if !newly_finished {
            return None;
        }

        Some(CompletionEvent {
            track: Track::Human,
            task_id: name.to_string(),
            name: name.to_string(),
            timestamp_ms: now_ms(),
        })
    }

    /// Readiness of the task currently heading `track`.
    pub fn dependency_status(&self, track: Track) -> Readiness {
        match self.assignments.current_task(track) {
            Some(task) => self.ledger.readiness(track, task),
            None => Readiness::no_task(),
        }
    }

    pub fn start_processing(&mut self) {
        self.started = true;
        self.message = "processing started; checking dependencies".to_string();
        info!("automated processing started");
    }

    pub fn pause_processing(&mut self) {
        self.started = false;
        info!("automated processing paused");
    }

    pub fn resume_processing(&mut self) {
        self.started = true;
        info!("automated processing resumed");
    }

    pub fn set_mode(&mut self, mode: ModeVariant) {
        self.mode = mode;
        info!(%mode, "mode variant set");
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown = true;
    }

    /// Clear everything except the dependency map and program index.
    ///
    /// Returns `true` if a task was in flight; the caller must then stop the
    /// actuator, since the worker will drop the task without touching it.
    pub fn reset(&mut self, now: Instant) -> bool {
        let was_in_flight = self.current.take().is_some();

        self.epoch += 1;
        self.queue.clear();
        self.history.clear();
        self.ledger.reset();
        self.assignments.reset();
        self.phase = DispatchPhase::Idle;
        self.started = false;
        self.mode = ModeVariant::default();
        self.message = idle_message();
        self.all_completed = false;
        self.last_activity = now;

        info!(epoch = self.epoch, was_in_flight, "dispatcher reset");
        was_in_flight
    }

    pub fn status(&self, now: Instant) -> DispatcherStatus {
        let remaining_wait_ms = self
            .current
            .as_ref()
            .and_then(|c| c.deadline)
            .map(|d| d.saturating_duration_since(now).as_millis() as u64);

        DispatcherStatus {
            state: self.phase,
            current_program: self.current.as_ref().map(|c| c.program.clone()),
            current_task: self.current.as_ref().map(|c| c.name.clone()),
            queue_depth: self.queue.len(),
            queue: self.queue.snapshot(),
            executed_count: self.history.len(),
            abandoned: self.queue.abandoned().to_vec(),
            paused: !self.started,
            mode: self.mode,
            message: self.message.clone(),
            all_completed: self.all_completed,
            remaining_wait_ms,
        }
    }

    // ---------------------------------------------------------------------
    // Worker API
    // ---------------------------------------------------------------------

    /// Dequeue the next program if processing is started and nothing is in
    /// flight. Moves the dispatcher into `DEP_WAIT`.
    pub fn begin_next(&mut self, now: Instant) -> Option<InFlight> {
        if self.shutdown || !self.started || self.current.is_some() {
            return None;
        }

        let queued = loop {
            let queued = self.queue.pop_next()?;
            // Catalog reloads can turn an already queued program human-only.
            match self.programs.human_only_task(&queued.program) {
                Some(name) => {
                    warn!(program = %queued.program, task = %name, "dropping human-only task from queue");
                    self.message =
                        format!("task '{name}' is restricted to the human track; abandoned");
                    self.queue.abandon(queued.program);
                }
                None => break queued,
            }
        };
        let name = self.programs.name_for(&queued.program);
        let max_wait = self
            .settings
            .max_wait_for(self.programs.duration_for(&queued.program));

        self.current = Some(CurrentTask {
            program: queued.program.clone(),
            name: name.clone(),
            deadline: None,
        });
        self.phase = DispatchPhase::DepWait;
        self.last_activity = now;

        info!(
            program = %queued.program,
            task = %name,
            failures = queued.failures,
            max_wait_secs = max_wait.as_secs(),
            remaining = self.queue.len(),
            "dequeued automated task"
        );

        Some(InFlight {
            epoch: self.epoch,
            queued,
            name,
            max_wait,
        })
    }

    /// Whether `task` is still the task this dispatcher is working on.
    pub fn is_current(&self, task: &InFlight) -> bool {
        task.epoch == self.epoch && self.current.is_some()
    }

    /// Check the in-flight task's prerequisites and surface the result in
    /// the status message.
    pub fn check_dependencies(&mut self, task: &InFlight, now: Instant) -> Option<Readiness> {
        if !self.is_current(task) {
            return None;
        }

        let readiness = self.ledger.readiness(Track::Automated, &task.name);
        self.message = if readiness.allowed {
            String::new()
        } else {
            readiness.message.clone()
        };
        self.last_activity = now;
        Some(readiness)
    }

    pub fn enter_phase(&mut self, task: &InFlight, phase: DispatchPhase, now: Instant) -> bool {
        if !self.is_current(task) {
            return false;
        }

        if self.phase != phase {
            debug!(program = %task.program(), from = ?self.phase, to = ?phase, "phase transition");
        }
        self.phase = phase;
        self.last_activity = now;

        match phase {
            DispatchPhase::Executing | DispatchPhase::Monitoring => {
                self.message = format!("executing: {}", task.name)
            }
            DispatchPhase::Paused => self.message = format!("paused: {}", task.name),
            DispatchPhase::Idle | DispatchPhase::DepWait => {}
        }
        true
    }

    pub fn set_deadline(&mut self, task: &InFlight, deadline: Instant) -> bool {
        if !self.is_current(task) {
            return false;
        }
        if let Some(current) = self.current.as_mut() {
            current.deadline = Some(deadline);
        }
        true
    }

    /// Record activity for the stuck watchdog.
    pub fn touch(&mut self, task: &InFlight, now: Instant) -> bool {
        if !self.is_current(task) {
            return false;
        }
        self.last_activity = now;
        true
    }

    /// Instant at which the stuck watchdog fires if nothing happens first.
    pub fn stuck_deadline(&self) -> Instant {
        self.last_activity + self.settings.stuck_timeout()
    }

    /// Success: the human-readable name enters the finished set and leaves
    /// the automated assignments; the run is recorded in the history.
    pub fn finish_success(&mut self, task: &InFlight) -> Option<CompletionEvent> {
        if !self.is_current(task) {
            return None;
        }

        let timestamp_ms = now_ms();
        self.ledger.mark_finished(&task.name);
        if self.assignments.track_of(&task.name) == Some(Track::Automated) {
            self.assignments.remove_completed(Track::Automated, &task.name);
        }
        self.refresh_requirement(Track::Automated);

        self.history.push(ExecutionRecord {
            program: task.queued.program.clone(),
            name: task.name.clone(),
            timestamp_ms,
        });

        self.message = format!("completed: {}", task.name);
        self.clear_current();

        if self.queue.is_empty() {
            self.all_completed = true;
            self.message = "all automated tasks completed".to_string();
            info!(executed = self.history.len(), "automated queue drained");
        }

        Some(CompletionEvent {
            track: Track::Automated,
            task_id: task.queued.program.clone(),
            name: task.name.clone(),
            timestamp_ms,
        })
    }

    /// Failed start: re-queue at the tail or abandon once out of retries.
    pub fn finish_failure(&mut self, task: &InFlight, reason: &str) -> Option<RetryDecision> {
        if !self.is_current(task) {
            return None;
        }

        let decision = self.queue.requeue_failed(task.queued.clone());
        self.message = match decision {
            RetryDecision::Requeued { failures } => {
                format!("failed: {} ({reason}); retry {failures} queued", task.name)
            }
            RetryDecision::Abandoned { failures } => {
                format!("failed: {} ({reason}); abandoned after {failures} attempts", task.name)
            }
        };
        warn!(
            program = %task.program(),
            task = %task.name,
            reason,
            ?decision,
            "automated task failed"
        );
        self.clear_current();
        Some(decision)
    }

    /// Stuck watchdog fired: drop the task without finishing or retrying it.
    pub fn abandon_stuck(&mut self, task: &InFlight) -> bool {
        if !self.is_current(task) {
            return false;
        }

        self.queue.abandon(task.queued.program.clone());
        self.message = format!("stuck on {}; task abandoned", task.name);
        self.clear_current();
        true
    }

    fn clear_current(&mut self) {
        self.current = None;
        self.phase = DispatchPhase::Idle;
        self.last_activity = Instant::now();
    }

    fn refresh_requirement(&mut self, track: Track) {
        let head = self.assignments.current_task(track).map(str::to_string);
        self.ledger.set_requirement(track, head.as_deref());
    }
}

fn idle_message() -> String {
    "idle".to_string()
}
