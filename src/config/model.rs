// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level task catalog as read from a TOML file.
///
/// ```toml
/// [dispatcher]
/// stuck_timeout_secs = 60
///
/// [actuator]
/// host = "192.168.1.15"
///
/// [task.A]
/// program = "pick_a"
/// duration_secs = 20
///
/// [task.B]
/// after = ["A"]
/// ```
///
/// All sections are optional and have reasonable defaults. This is the raw,
/// unvalidated form; see [`Catalog`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCatalog {
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    #[serde(default)]
    pub actuator: ActuatorSettings,

    /// All tasks from `[task.<name>]`, keyed by human-readable task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated catalog. Only constructed through `TryFrom<RawCatalog>` or
/// [`Catalog::empty`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub dispatcher: DispatcherSettings,
    pub actuator: ActuatorSettings,
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[dispatcher]` section: timing and retry knobs for the worker loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Sleep between worker iterations while idle.
    pub idle_interval_ms: u64,
    /// Sleep between actuator run-state polls while monitoring.
    pub monitor_interval_ms: u64,
    /// Sleep between dependency checks while waiting on prerequisites.
    pub dependency_poll_ms: u64,
    /// Sleep between started-flag checks while monitoring is paused.
    pub pause_poll_ms: u64,
    /// Inactivity threshold after which an in-flight task is abandoned.
    pub stuck_timeout_secs: u64,
    /// Added to a task's estimated duration to get its max wait.
    pub wait_buffer_secs: u64,
    /// Estimated duration for programs without a catalog entry.
    pub default_duration_secs: u64,
    /// Extra time granted on top of the pause length when resuming.
    pub pause_grace_secs: u64,
    /// Delay after resume before polling the actuator again.
    pub settle_delay_ms: u64,
    /// How many times a failed start is re-queued before the task is
    /// moved to the abandoned list.
    pub max_retries: u32,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            idle_interval_ms: 100,
            monitor_interval_ms: 500,
            dependency_poll_ms: 2000,
            pause_poll_ms: 500,
            stuck_timeout_secs: 60,
            wait_buffer_secs: 10,
            default_duration_secs: 30,
            pause_grace_secs: 5,
            settle_delay_ms: 1000,
            max_retries: 3,
        }
    }
}

impl DispatcherSettings {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn dependency_poll(&self) -> Duration {
        Duration::from_millis(self.dependency_poll_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn stuck_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_timeout_secs)
    }

    pub fn pause_grace(&self) -> Duration {
        Duration::from_secs(self.pause_grace_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Max monitoring wait for a task with the given estimated duration.
    pub fn max_wait_for(&self, estimated: Duration) -> Duration {
        estimated + Duration::from_secs(self.wait_buffer_secs)
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_duration_secs)
    }
}

/// `[actuator]` section, used by the dashboard and simulated actuators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActuatorSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single connect/write/read exchange.
    pub io_timeout_ms: u64,
    pub program_dir: String,
    pub alternate_program_dir: String,
    /// Prepended to the program id when running the alternate variant.
    pub alternate_prefix: String,
    pub program_extension: String,
    /// How long the simulated actuator pretends a program runs.
    pub simulated_run_ms: u64,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 29999,
            io_timeout_ms: 3000,
            program_dir: "programs".to_string(),
            alternate_program_dir: "programs/alternate".to_string(),
            alternate_prefix: "alt_".to_string(),
            program_extension: "urp".to_string(),
            simulated_run_ms: 3000,
        }
    }
}

impl ActuatorSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn simulated_run(&self) -> Duration {
        Duration::from_millis(self.simulated_run_ms)
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Machine-readable program id run by the automated executor.
    ///
    /// Tasks without a program can only be done by the human operator.
    #[serde(default)]
    pub program: Option<String>,

    /// Prerequisites: this task waits for all tasks listed here, whichever
    /// track performs them.
    #[serde(default)]
    pub after: Vec<String>,

    /// Estimated automated execution time in seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,

    /// Permanently restrict this task to the human track.
    #[serde(default)]
    pub human_only: bool,

    /// Display group (e.g. an assembly stage).
    #[serde(default)]
    pub group: Option<String>,
}

impl TaskConfig {
    /// A task is restricted to the human track if flagged so or if it has
    /// no program to run.
    pub fn effective_human_only(&self) -> bool {
        self.human_only || self.program.is_none()
    }
}

impl Catalog {
    /// Construct without validation. Callers must have validated `task`.
    pub(crate) fn new_unchecked(
        dispatcher: DispatcherSettings,
        actuator: ActuatorSettings,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            dispatcher,
            actuator,
            task,
        }
    }

    /// Catalog with default settings and no tasks ("no constraints").
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_empty()
    }
}
