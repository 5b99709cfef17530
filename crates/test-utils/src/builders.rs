#![allow(dead_code)]

use std::collections::BTreeMap;

use duodag::config::{ActuatorSettings, Catalog, DispatcherSettings, RawCatalog, TaskConfig};

/// Builder for `Catalog` to simplify test setup.
///
/// Dispatcher timings default to the production defaults; tests usually
/// override only the knob they exercise.
pub struct CatalogBuilder {
    catalog: RawCatalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            catalog: RawCatalog {
                dispatcher: DispatcherSettings::default(),
                actuator: ActuatorSettings::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.catalog.task.insert(name.to_string(), task);
        self
    }

    /// Edit `[dispatcher]` in place.
    pub fn dispatcher(mut self, f: impl FnOnce(&mut DispatcherSettings)) -> Self {
        f(&mut self.catalog.dispatcher);
        self
    }

    pub fn stuck_timeout_secs(self, secs: u64) -> Self {
        self.dispatcher(|d| d.stuck_timeout_secs = secs)
    }

    pub fn max_retries(self, retries: u32) -> Self {
        self.dispatcher(|d| d.max_retries = retries)
    }

    pub fn wait_buffer_secs(self, secs: u64) -> Self {
        self.dispatcher(|d| d.wait_buffer_secs = secs)
    }

    pub fn build(self) -> Catalog {
        Catalog::try_from(self.catalog).expect("Failed to build valid catalog from builder")
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A human-only task (no program).
    pub fn human() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    /// A task the robot can run as `program`.
    pub fn program(program: &str) -> Self {
        Self {
            task: TaskConfig {
                program: Some(program.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.task.duration_secs = Some(secs);
        self
    }

    pub fn human_only(mut self, val: bool) -> Self {
        self.task.human_only = val;
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.task.group = Some(group.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
