use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::time::Instant;
use duodag::errors::Result;
use duodag::exec::{Actuator, ActuatorFuture};
use duodag::types::{ModeVariant, RunState};

/// What a scripted poll does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    State(RunState),
    Error,
    /// Never return.
    Hang,
}

/// One recorded actuator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start { program: String, mode: ModeVariant },
    Poll,
    ForceStop,
    Pause,
    Resume,
}

#[derive(Debug, Default)]
struct Script {
    /// Remaining start failures per program.
    start_failures: HashMap<String, u32>,
    hang_on_start: bool,
    /// Time a start takes before the program is actually playing.
    start_delay: Option<Duration>,
    /// Polls (after each start) answered with `Running` before `Stopped`.
    /// `None` keeps the run going forever.
    polls_per_run: Option<usize>,
    /// Consumed before the run simulation.
    poll_override: VecDeque<PollStep>,
    running: bool,
    polls_this_run: usize,
    calls: Vec<(Instant, Call)>,
}

/// A scripted fake actuator that:
/// - records every call with its (Tokio) timestamp,
/// - fails or hangs starts on request,
/// - answers polls from a script, then from a simple run simulation.
#[derive(Clone, Default)]
pub struct FakeActuator {
    script: Arc<Mutex<Script>>,
}

impl FakeActuator {
    /// Every run reports `Running` for `polls` polls, then `Stopped`.
    pub fn finishing_after(polls: usize) -> Self {
        let fake = Self::default();
        fake.script.lock().unwrap().polls_per_run = Some(polls);
        fake
    }

    /// Every run keeps reporting `Running`.
    pub fn never_finishing() -> Self {
        Self::default()
    }

    pub fn fail_starts(&self, program: &str, times: u32) -> &Self {
        self.script
            .lock()
            .unwrap()
            .start_failures
            .insert(program.to_string(), times);
        self
    }

    pub fn hang_on_start(&self) -> &Self {
        self.script.lock().unwrap().hang_on_start = true;
        self
    }

    /// Starts take `delay` to return; the program plays only once they do.
    pub fn slow_start(&self, delay: Duration) -> &Self {
        self.script.lock().unwrap().start_delay = Some(delay);
        self
    }

    pub fn script_polls(&self, steps: impl IntoIterator<Item = PollStep>) -> &Self {
        self.script.lock().unwrap().poll_override.extend(steps);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn started_programs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start { program, .. } => Some(program),
                _ => None,
            })
            .collect()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.timed_calls()
            .into_iter()
            .filter(|(_, c)| *c == Call::Poll)
            .map(|(at, _)| at)
            .collect()
    }

    /// Whether a started program is still playing on the fake controller.
    pub fn is_running(&self) -> bool {
        self.script.lock().unwrap().running
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.script
            .lock()
            .unwrap()
            .calls
            .push((Instant::now(), call));
    }
}

impl Actuator for FakeActuator {
    fn start<'a>(&'a self, program: &'a str, mode: ModeVariant) -> ActuatorFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Start {
                program: program.to_string(),
                mode,
            });

            let (hang, fail, delay) = {
                let mut s = self.script.lock().unwrap();
                let fail = match s.start_failures.get_mut(program) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                };
                (s.hang_on_start, fail, s.start_delay)
            };

            if hang {
                std::future::pending::<()>().await;
            }
            if fail {
                return Err(anyhow!("scripted start failure for {program}").into());
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut s = self.script.lock().unwrap();
            s.running = true;
            s.polls_this_run = 0;
            Ok(())
        })
    }

    fn poll_run_state(&self) -> ActuatorFuture<'_, RunState> {
        Box::pin(async move {
            self.record(Call::Poll);

            let step = {
                let mut s = self.script.lock().unwrap();
                match s.poll_override.pop_front() {
                    Some(step) => step,
                    None if !s.running => PollStep::State(RunState::Stopped),
                    None => match s.polls_per_run {
                        Some(limit) if s.polls_this_run >= limit => {
                            s.running = false;
                            PollStep::State(RunState::Stopped)
                        }
                        _ => {
                            s.polls_this_run += 1;
                            PollStep::State(RunState::Running)
                        }
                    },
                }
            };

            match step {
                PollStep::State(state) => Ok(state),
                PollStep::Error => Err(anyhow!("scripted poll failure").into()),
                PollStep::Hang => std::future::pending::<Result<RunState>>().await,
            }
        })
    }

    fn force_stop(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.record(Call::ForceStop);
            self.script.lock().unwrap().running = false;
            Ok(())
        })
    }

    fn pause(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.record(Call::Pause);
            Ok(())
        })
    }

    fn resume(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.record(Call::Resume);
            Ok(())
        })
    }
}
