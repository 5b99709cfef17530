// src/exec/simulated.rs

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::errors::Result;
use crate::exec::backend::{Actuator, ActuatorFuture};
use crate::types::{ModeVariant, RunState};

#[derive(Debug, Clone)]
struct Run {
    program: String,
    /// Run time still owed when paused, measured from `resumed_at` otherwise.
    remaining: Duration,
    resumed_at: Option<Instant>,
}

impl Run {
    fn is_done(&self, now: Instant) -> bool {
        match self.resumed_at {
            Some(at) => now.saturating_duration_since(at) >= self.remaining,
            None => false,
        }
    }
}

/// In-process actuator for running without hardware.
///
/// Each program "runs" for a fixed time. Pausing freezes the remaining time.
#[derive(Debug)]
pub struct SimulatedActuator {
    run_time: Duration,
    run: Mutex<Option<Run>>,
}

impl SimulatedActuator {
    pub fn new(run_time: Duration) -> Self {
        Self {
            run_time,
            run: Mutex::new(None),
        }
    }

    fn with_run<R>(&self, f: impl FnOnce(&mut Option<Run>) -> R) -> R {
        let mut guard = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Actuator for SimulatedActuator {
    fn start<'a>(&'a self, program: &'a str, mode: ModeVariant) -> ActuatorFuture<'a, ()> {
        Box::pin(async move {
            info!(program, %mode, run_ms = self.run_time.as_millis() as u64, "simulated run started");
            self.with_run(|run| {
                *run = Some(Run {
                    program: program.to_string(),
                    remaining: self.run_time,
                    resumed_at: Some(Instant::now()),
                })
            });
            Ok(())
        })
    }

    fn poll_run_state(&self) -> ActuatorFuture<'_, RunState> {
        Box::pin(async move {
            let now = Instant::now();
            let state = self.with_run(|run| {
                match run.as_ref() {
                    Some(r) if !r.is_done(now) => return RunState::Running,
                    Some(r) => info!(program = %r.program, "simulated run finished"),
                    None => {}
                }
                *run = None;
                RunState::Stopped
            });
            Ok(state)
        })
    }

    fn force_stop(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.with_run(|run| *run = None);
            Ok(())
        })
    }

    fn pause(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            let now = Instant::now();
            self.with_run(|run| {
                if let Some(r) = run.as_mut() {
                    if let Some(at) = r.resumed_at.take() {
                        r.remaining = r.remaining.saturating_sub(now.saturating_duration_since(at));
                    }
                }
            });
            Ok(())
        })
    }

    fn resume(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.with_run(|run| {
                if let Some(r) = run.as_mut().filter(|r| r.resumed_at.is_none()) {
                    r.resumed_at = Some(Instant::now());
                }
            });
            Ok(())
        })
    }
}
