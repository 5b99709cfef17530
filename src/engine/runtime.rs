// src/engine/runtime.rs

use std::fmt;
use std::future::Future;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::engine::core::InFlight;
use crate::engine::{DispatchPhase, DispatchService};
use crate::errors::Result;
use crate::types::RunState;

/// How a single in-flight task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    /// Terminal run-state seen, or max wait exceeded (fail-open).
    Finished,
    /// Start failed; goes through the retry policy.
    Failed(String),
    /// The stuck watchdog fired.
    Stuck,
    /// Reset away while in flight, or the worker is shutting down.
    Cancelled,
    /// Reset away after the actuator accepted the start. The reset's own
    /// stop may have landed before the program began playing.
    Orphaned,
}

/// The automated-track worker.
///
/// This is the async IO shell around `DispatchCore`: every state change is a
/// short locked call into the core, every actuator call happens with the
/// lock released. Runs until [`DispatchService::shutdown`].
pub struct Dispatcher {
    service: DispatchService,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(service: DispatchService) -> Self {
        Self { service }
    }

    /// Main worker loop.
    ///
    /// - Dequeues the next program once processing is started.
    /// - Drives it through `DEP_WAIT -> EXECUTING -> MONITORING`.
    /// - Sleeps for the idle interval (or until woken) when there is nothing
    ///   to do.
    pub async fn run(self) -> Result<()> {
        info!("dispatcher worker started");
        let idle = self.service.settings().idle_interval();

        loop {
            if self.service.is_shutdown() {
                break;
            }

            match self.service.with_core(|core| core.begin_next(Instant::now())) {
                Some(task) => self.drive(task).await,
                None => self.service.wait(idle).await,
            }
        }

        info!("dispatcher worker exiting");
        Ok(())
    }

    async fn drive(&self, task: InFlight) {
        if !self.wait_for_dependencies(&task).await {
            debug!(program = %task.program(), "task dropped while waiting on dependencies");
            return;
        }

        let outcome = match self.execute(&task).await {
            Ok(()) => self.monitor(&task).await,
            Err(outcome) => outcome,
        };
        self.settle(&task, outcome).await;
    }

    /// `DEP_WAIT`: poll the ledger until the task is unblocked. No timeout.
    ///
    /// Returns `false` if the task was reset away meanwhile.
    async fn wait_for_dependencies(&self, task: &InFlight) -> bool {
        let poll = self.service.settings().dependency_poll();
        let mut announced = false;

        loop {
            let readiness = match self
                .service
                .with_core(|core| core.check_dependencies(task, Instant::now()))
            {
                Some(r) => r,
                None => return false,
            };

            if readiness.allowed {
                return true;
            }
            if self.service.is_shutdown() {
                return false;
            }

            if !announced {
                info!(
                    program = %task.program(),
                    task = %task.name,
                    blocking = ?readiness.blocking,
                    "waiting on prerequisites"
                );
                announced = true;
            }

            self.service.wait(poll).await;
        }
    }

    /// `EXECUTING`: ask the actuator to start and confirm it took.
    async fn execute(&self, task: &InFlight) -> std::result::Result<(), Outcome> {
        let now = Instant::now();
        if !self
            .service
            .with_core(|core| core.enter_phase(task, DispatchPhase::Executing, now))
        {
            return Err(Outcome::Cancelled);
        }

        let mode = self.service.with_core(|core| core.mode());
        let actuator = self.service.actuator();
        info!(program = %task.program(), task = %task.name, %mode, "starting automated task");

        match self.guarded(actuator.start(task.program(), mode)).await {
            None => return Err(Outcome::Stuck),
            Some(Err(err)) => return Err(Outcome::Failed(format!("start failed: {err}"))),
            Some(Ok(())) => {}
        }
        if !self.touch(task) {
            return Err(Outcome::Orphaned);
        }

        match self.guarded(actuator.poll_run_state()).await {
            None => Err(Outcome::Stuck),
            Some(Err(err)) => Err(Outcome::Failed(format!(
                "run state unreadable after start: {err}"
            ))),
            Some(Ok(state)) => {
                if state != RunState::Running {
                    warn!(program = %task.program(), ?state, "actuator not running right after start");
                }
                if self.touch(task) {
                    Ok(())
                } else {
                    Err(Outcome::Orphaned)
                }
            }
        }
    }

    /// `MONITORING`: poll the run-state until terminal, the deadline passes,
    /// or the watchdog fires.
    async fn monitor(&self, task: &InFlight) -> Outcome {
        let interval = self.service.settings().monitor_interval();
        let actuator = self.service.actuator();
        let mut deadline = Instant::now() + task.max_wait;

        let entered = self.service.with_core(|core| {
            core.enter_phase(task, DispatchPhase::Monitoring, Instant::now())
                && core.set_deadline(task, deadline)
        });
        if !entered {
            return Outcome::Cancelled;
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                info!(
                    program = %task.program(),
                    max_wait_secs = task.max_wait.as_secs(),
                    "max wait exceeded; assuming completion"
                );
                return Outcome::Finished;
            }

            let (current, started) = self
                .service
                .with_core(|core| (core.is_current(task), core.is_started()));
            if !current || self.service.is_shutdown() {
                return Outcome::Cancelled;
            }
            if !started {
                match self.hold(task, deadline).await {
                    Some(extended) => {
                        deadline = extended;
                        continue;
                    }
                    None => return Outcome::Cancelled,
                }
            }

            match self.guarded(actuator.poll_run_state()).await {
                None => return Outcome::Stuck,
                Some(Ok(RunState::Running)) => {
                    if !self.touch(task) {
                        return Outcome::Cancelled;
                    }
                }
                Some(Ok(state)) => {
                    debug!(program = %task.program(), ?state, "terminal run state");
                    return Outcome::Finished;
                }
                Some(Err(err)) => {
                    // Not activity: repeated failures end in the watchdog.
                    warn!(program = %task.program(), error = %err, "run state poll failed");
                }
            }

            let next = (Instant::now() + interval).min(deadline);
            tokio::time::sleep_until(next).await;
        }
    }

    /// `PAUSED`: suspend monitoring until processing is resumed.
    ///
    /// Returns the deadline extended by the paused time plus the grace
    /// period, or `None` if the task was reset away.
    async fn hold(&self, task: &InFlight, deadline: Instant) -> Option<Instant> {
        let settings = self.service.settings();
        let actuator = self.service.actuator();
        let paused_at = Instant::now();

        if !self
            .service
            .with_core(|core| core.enter_phase(task, DispatchPhase::Paused, paused_at))
        {
            return None;
        }
        info!(program = %task.program(), "monitoring suspended");
        if let Err(err) = actuator.pause().await {
            warn!(program = %task.program(), error = %err, "actuator pause failed");
        }

        loop {
            let (current, started) = self.service.with_core(|core| {
                (core.touch(task, Instant::now()), core.is_started())
            });
            if !current || self.service.is_shutdown() {
                return None;
            }
            if started {
                break;
            }
            self.service.wait(settings.pause_poll()).await;
        }

        let paused_for = paused_at.elapsed();
        let extended = deadline + paused_for + settings.pause_grace();
        info!(
            program = %task.program(),
            paused_ms = paused_for.as_millis() as u64,
            "monitoring resumed; deadline extended"
        );

        if let Err(err) = actuator.resume().await {
            warn!(program = %task.program(), error = %err, "actuator resume failed");
        }

        let resumed = self.service.with_core(|core| {
            core.enter_phase(task, DispatchPhase::Monitoring, Instant::now())
                && core.set_deadline(task, extended)
        });
        if !resumed {
            return None;
        }

        sleep(settings.settle_delay()).await;
        self.touch(task).then_some(extended)
    }

    async fn settle(&self, task: &InFlight, outcome: Outcome) {
        match outcome {
            Outcome::Finished => {
                if let Some(event) = self.service.with_core(|core| core.finish_success(task)) {
                    self.service.publish(event);
                }
            }
            Outcome::Failed(reason) => {
                self.service
                    .with_core(|core| core.finish_failure(task, &reason));
            }
            Outcome::Stuck => {
                warn!(
                    program = %task.program(),
                    task = %task.name,
                    "no progress within stuck timeout; force-stopping actuator"
                );
                if let Err(err) = self.service.actuator().force_stop().await {
                    warn!(program = %task.program(), error = %err, "force stop failed");
                }
                self.service.with_core(|core| core.abandon_stuck(task));
            }
            Outcome::Cancelled => {
                debug!(program = %task.program(), "in-flight task cancelled");
            }
            Outcome::Orphaned => {
                info!(
                    program = %task.program(),
                    "start completed after reset; stopping actuator"
                );
                if let Err(err) = self.service.actuator().force_stop().await {
                    warn!(program = %task.program(), error = %err, "force stop failed");
                }
            }
        }
    }

    /// Run one actuator call, raced against the stuck watchdog.
    ///
    /// `None` means the watchdog deadline passed before (or while) the call
    /// completed.
    async fn guarded<T>(&self, call: impl Future<Output = Result<T>>) -> Option<Result<T>> {
        let deadline = self.service.with_core(|core| core.stuck_deadline());
        if Instant::now() >= deadline {
            return None;
        }
        timeout_at(deadline, call).await.ok()
    }

    fn touch(&self, task: &InFlight) -> bool {
        self.service
            .with_core(|core| core.touch(task, Instant::now()))
    }
}
