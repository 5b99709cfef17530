// src/dag/ledger.rs

//! Dependency ledger: the dependency map plus the append-only finished set.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::dag::DagGraph;
use crate::engine::TaskName;
use crate::types::Track;

/// Answer to "may this task start now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    /// Task that was checked, if any.
    pub task: Option<TaskName>,
    pub allowed: bool,
    /// Prerequisites not yet finished, in declaration order.
    pub blocking: Vec<TaskName>,
    /// Operator-facing explanation; empty when allowed.
    pub message: String,
}

impl Readiness {
    fn for_task(track: Track, task: &str, blocking: Vec<TaskName>) -> Self {
        let message = if blocking.is_empty() {
            String::new()
        } else {
            blocking_message(track, &blocking)
        };

        Self {
            task: Some(task.to_string()),
            allowed: blocking.is_empty(),
            blocking,
            message,
        }
    }

    /// Nothing assigned to the track; nothing to wait for.
    pub fn no_task() -> Self {
        Self {
            task: None,
            allowed: true,
            blocking: Vec::new(),
            message: String::new(),
        }
    }
}

fn blocking_message(track: Track, blocking: &[TaskName]) -> String {
    match track {
        Track::Automated => format!("waiting for: {}", blocking.join(", ")),
        Track::Human => format!(
            "please wait until these tasks are finished: {}",
            blocking.join(", ")
        ),
    }
}

/// Holds the (read-only) dependency map and the monotone finished set.
///
/// The finished set is shared by both tracks: a prerequisite is satisfied no
/// matter who performed it.
#[derive(Debug, Default)]
pub struct DependencyLedger {
    graph: DagGraph,
    /// Finished task names in completion order.
    finished: Vec<TaskName>,
    finished_lookup: HashSet<TaskName>,
    /// Prerequisites of the task currently heading each track's assignments.
    human_requirement: Vec<TaskName>,
    automated_requirement: Vec<TaskName>,
}

impl DependencyLedger {
    pub fn new(graph: DagGraph) -> Self {
        Self {
            graph,
            ..Self::default()
        }
    }

    /// Replace the dependency map. Finished tasks are kept.
    pub fn load<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = (TaskName, Vec<TaskName>)>,
    {
        self.graph = DagGraph::from_definitions(definitions);
        info!(
            tasks = self.graph.tasks().count(),
            "dependency map loaded"
        );
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Prerequisites of `task` that are not finished yet.
    pub fn missing_for(&self, task: &str) -> Vec<TaskName> {
        self.graph
            .dependencies_of(task)
            .iter()
            .filter(|dep| !self.finished_lookup.contains(dep.as_str()))
            .cloned()
            .collect()
    }

    /// `(unblocked, missing prerequisites)` for `task`.
    pub fn is_unblocked(&self, task: &str) -> (bool, Vec<TaskName>) {
        let missing = self.missing_for(task);
        (missing.is_empty(), missing)
    }

    /// Full readiness answer for `task` on `track`.
    pub fn readiness(&self, track: Track, task: &str) -> Readiness {
        let missing = self.missing_for(task);
        if !missing.is_empty() {
            debug!(task, %track, ?missing, "prerequisites not finished");
        }
        Readiness::for_task(track, task, missing)
    }

    /// Insert into the finished set. Returns `false` if it was already there.
    pub fn mark_finished(&mut self, task: &str) -> bool {
        let task = task.trim();
        if !self.finished_lookup.insert(task.to_string()) {
            debug!(task, "task already finished; ignoring");
            return false;
        }

        self.finished.push(task.to_string());
        info!(
            task,
            unblocks = ?self.graph.dependents_of(task),
            finished = self.finished.len(),
            "task marked finished"
        );
        true
    }

    pub fn is_finished(&self, task: &str) -> bool {
        self.finished_lookup.contains(task)
    }

    pub fn finished(&self) -> &[TaskName] {
        &self.finished
    }

    /// Cache the prerequisites of the task now heading `track`.
    pub fn set_requirement(&mut self, track: Track, head: Option<&str>) {
        let deps = head
            .map(|t| self.graph.dependencies_of(t).to_vec())
            .unwrap_or_default();
        debug!(%track, task = ?head, ?deps, "current dependency requirement updated");
        match track {
            Track::Human => self.human_requirement = deps,
            Track::Automated => self.automated_requirement = deps,
        }
    }

    pub fn requirement(&self, track: Track) -> &[TaskName] {
        match track {
            Track::Human => &self.human_requirement,
            Track::Automated => &self.automated_requirement,
        }
    }

    /// Clear finished tasks and cached requirements. The dependency map stays.
    pub fn reset(&mut self) {
        self.finished.clear();
        self.finished_lookup.clear();
        self.human_requirement.clear();
        self.automated_requirement.clear();
        info!("dependency ledger reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> DependencyLedger {
        let mut ledger = DependencyLedger::default();
        ledger.load(vec![
            ("A".to_string(), vec![]),
            ("B".to_string(), vec!["A".to_string()]),
            ("C".to_string(), vec!["A".to_string(), "B".to_string()]),
        ]);
        ledger
    }

    #[test]
    fn unblocks_exactly_when_last_prerequisite_finishes() {
        let mut ledger = ledger();

        assert_eq!(ledger.is_unblocked("C"), (false, vec!["A".into(), "B".into()]));
        ledger.mark_finished("A");
        assert_eq!(ledger.is_unblocked("C"), (false, vec!["B".into()]));
        ledger.mark_finished("B");
        assert_eq!(ledger.is_unblocked("C"), (true, vec![]));
    }

    #[test]
    fn mark_finished_is_idempotent() {
        let mut ledger = ledger();

        assert!(ledger.mark_finished("A"));
        assert!(!ledger.mark_finished("A"));
        assert_eq!(ledger.finished(), ["A".to_string()]);
    }

    #[test]
    fn unknown_tasks_are_unconstrained() {
        let ledger = DependencyLedger::default();
        let r = ledger.readiness(Track::Automated, "anything");
        assert!(r.allowed);
        assert!(r.message.is_empty());
    }

    #[test]
    fn automated_message_lists_blockers() {
        let ledger = ledger();
        let r = ledger.readiness(Track::Automated, "B");
        assert!(!r.allowed);
        assert_eq!(r.message, "waiting for: A");
    }

    #[test]
    fn reset_keeps_dependency_map() {
        let mut ledger = ledger();
        ledger.mark_finished("A");
        ledger.set_requirement(Track::Human, Some("C"));

        ledger.reset();

        assert!(ledger.finished().is_empty());
        assert!(ledger.requirement(Track::Human).is_empty());
        assert_eq!(ledger.missing_for("B"), vec!["A".to_string()]);
    }
}
