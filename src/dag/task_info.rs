// src/dag/task_info.rs

//! Catalog task records and the program-id to task-name mapping.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use crate::config::model::{Catalog, DispatcherSettings, TaskConfig};
use crate::engine::{ProgramId, TaskName};

/// One catalog entry as seen by the rest of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: TaskName,
    pub prerequisites: Vec<TaskName>,
    pub program: Option<ProgramId>,
    pub estimated_duration: Duration,
    pub human_only: bool,
    pub group: Option<String>,
}

impl TaskRecord {
    pub fn from_config(name: TaskName, cfg: &TaskConfig, settings: &DispatcherSettings) -> Self {
        Self {
            name,
            prerequisites: cfg.after.clone(),
            program: cfg.program.as_ref().map(|p| p.trim().to_string()),
            estimated_duration: cfg
                .duration_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| settings.default_duration()),
            human_only: cfg.effective_human_only(),
            group: cfg.group.clone(),
        }
    }
}

/// What the dispatcher knows about a program id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub name: TaskName,
    pub estimated_duration: Duration,
    /// Restricted to the human track; never dispatched to the actuator.
    pub human_only: bool,
}

/// Case-insensitive program id -> task mapping, built once per catalog.
#[derive(Debug, Clone, Default)]
pub struct ProgramIndex {
    by_program: HashMap<String, ProgramInfo>,
    default_duration: Duration,
}

impl ProgramIndex {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a TaskRecord>,
        default_duration: Duration,
    ) -> Self {
        let by_program = records
            .into_iter()
            .filter_map(|r| {
                r.program.as_ref().map(|p| {
                    (
                        p.to_lowercase(),
                        ProgramInfo {
                            name: r.name.clone(),
                            estimated_duration: r.estimated_duration,
                            human_only: r.human_only,
                        },
                    )
                })
            })
            .collect();

        Self {
            by_program,
            default_duration,
        }
    }

    pub fn get(&self, program: &str) -> Option<&ProgramInfo> {
        self.by_program.get(&program.trim().to_lowercase())
    }

    /// Human-readable name for `program`; unmapped ids stand for themselves.
    pub fn name_for(&self, program: &str) -> TaskName {
        self.get(program)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| program.trim().to_string())
    }

    pub fn duration_for(&self, program: &str) -> Duration {
        self.get(program)
            .map(|info| info.estimated_duration)
            .unwrap_or(self.default_duration)
    }

    /// Human-only task behind `program`, if it maps to one.
    pub fn human_only_task(&self, program: &str) -> Option<&TaskName> {
        self.get(program)
            .filter(|info| info.human_only)
            .map(|info| &info.name)
    }

    pub fn len(&self) -> usize {
        self.by_program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_program.is_empty()
    }
}

impl Catalog {
    /// Every task as a [`TaskRecord`], in name order.
    pub fn records(&self) -> Vec<TaskRecord> {
        self.task
            .iter()
            .map(|(name, cfg)| TaskRecord::from_config(name.clone(), cfg, &self.dispatcher))
            .collect()
    }

    /// `(task, prerequisites)` pairs for the dependency ledger.
    pub fn dependency_definitions(&self) -> Vec<(TaskName, Vec<TaskName>)> {
        self.task
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.after.clone()))
            .collect()
    }

    /// Names of tasks restricted to the human track.
    pub fn human_only_tasks(&self) -> HashSet<TaskName> {
        self.task
            .iter()
            .filter(|(_, cfg)| cfg.effective_human_only())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn program_index(&self) -> ProgramIndex {
        ProgramIndex::from_records(&self.records(), self.dispatcher.default_duration())
    }

    /// Task names per display group. Ungrouped tasks are left out.
    pub fn groups(&self) -> BTreeMap<String, Vec<TaskName>> {
        let mut groups: BTreeMap<String, Vec<TaskName>> = BTreeMap::new();
        for (name, cfg) in self.task.iter() {
            if let Some(group) = cfg.group.as_ref().filter(|g| !g.trim().is_empty()) {
                groups.entry(group.clone()).or_default().push(name.clone());
            }
        }
        groups
    }
}
