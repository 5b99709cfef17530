// src/dag/assignments.rs

//! Ordered per-track task assignments.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::errors::{DuodagError, Result};
use crate::types::Track;

/// An external allocation decision: which tasks each track performs, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAssignments {
    #[serde(default)]
    pub human: Vec<TaskName>,
    #[serde(default)]
    pub automated: Vec<TaskName>,
}

/// Holds the ordered assignment list of each track.
///
/// Invariant: a task name appears in at most one of the two lists, and
/// human-only tasks never appear in the automated list.
#[derive(Debug, Default)]
pub struct AssignmentTracker {
    human: Vec<TaskName>,
    automated: Vec<TaskName>,
    human_only: HashSet<TaskName>,
}

impl AssignmentTracker {
    pub fn new(human_only: HashSet<TaskName>) -> Self {
        Self {
            human_only,
            ..Self::default()
        }
    }

    /// Replace the set of tasks restricted to the human track. Current
    /// assignments are kept as they are.
    pub fn set_human_only(&mut self, human_only: HashSet<TaskName>) {
        self.human_only = human_only;
    }

    /// Replace both lists. Rejects allocations that put a task on both
    /// tracks, twice on one track, or a human-only task on the automated
    /// track; on error nothing changes.
    pub fn set_assignments(&mut self, assignments: TrackAssignments) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for name in assignments.human.iter().chain(assignments.automated.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(DuodagError::AssignmentError(format!(
                    "task '{}' is assigned more than once",
                    name
                )));
            }
        }
        if let Some(name) = assignments
            .automated
            .iter()
            .find(|name| self.human_only.contains(name.as_str()))
        {
            return Err(DuodagError::AssignmentError(format!(
                "task '{name}' is restricted to the human track"
            )));
        }

        self.human = assignments.human;
        self.automated = assignments.automated;
        info!(
            human = ?self.human,
            automated = ?self.automated,
            "track assignments updated"
        );
        Ok(())
    }

    /// Head of the track's list.
    pub fn current_task(&self, track: Track) -> Option<&str> {
        self.list(track).first().map(|s| s.as_str())
    }

    pub fn assigned(&self, track: Track) -> &[TaskName] {
        self.list(track)
    }

    /// Which track a task is assigned to, if any.
    pub fn track_of(&self, name: &str) -> Option<Track> {
        if self.human.iter().any(|t| t == name) {
            Some(Track::Human)
        } else if self.automated.iter().any(|t| t == name) {
            Some(Track::Automated)
        } else {
            None
        }
    }

    /// Remove `name` from the track once it is done.
    ///
    /// The expected case is that `name` is the head. A non-head entry is
    /// still removed (completion reports may race reassignment); a missing
    /// entry is only logged. Returns whether something was removed.
    pub fn remove_completed(&mut self, track: Track, name: &str) -> bool {
        let list = self.list_mut(track);
        match list.iter().position(|t| t == name) {
            Some(0) => {
                list.remove(0);
                debug!(%track, task = name, "removed completed task from head of assignments");
                true
            }
            Some(idx) => {
                list.remove(idx);
                warn!(
                    %track,
                    task = name,
                    position = idx,
                    "completed task was not the current task; removed anyway"
                );
                true
            }
            None => {
                warn!(%track, task = name, "completed task not found in assignments");
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.human.clear();
        self.automated.clear();
    }

    fn list(&self, track: Track) -> &Vec<TaskName> {
        match track {
            Track::Human => &self.human,
            Track::Automated => &self.automated,
        }
    }

    fn list_mut(&mut self, track: Track) -> &mut Vec<TaskName> {
        match track {
            Track::Human => &mut self.human,
            Track::Automated => &mut self.automated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<TaskName> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn current_task_is_head_and_advances_on_removal() {
        let mut tracker = AssignmentTracker::default();
        tracker
            .set_assignments(TrackAssignments {
                human: names(&["A", "B"]),
                automated: names(&["C"]),
            })
            .unwrap();

        assert_eq!(tracker.current_task(Track::Human), Some("A"));
        assert!(tracker.remove_completed(Track::Human, "A"));
        assert_eq!(tracker.current_task(Track::Human), Some("B"));
        assert_eq!(tracker.current_task(Track::Automated), Some("C"));
    }

    #[test]
    fn task_on_both_tracks_is_rejected() {
        let mut tracker = AssignmentTracker::default();
        let err = tracker
            .set_assignments(TrackAssignments {
                human: names(&["A"]),
                automated: names(&["A"]),
            })
            .unwrap_err();

        assert!(matches!(err, DuodagError::AssignmentError(_)));
        assert_eq!(tracker.current_task(Track::Human), None);
    }

    #[test]
    fn human_only_task_on_automated_track_is_rejected() {
        let mut tracker = AssignmentTracker::new(names(&["Inspect"]).into_iter().collect());
        let err = tracker
            .set_assignments(TrackAssignments {
                human: names(&["A"]),
                automated: names(&["B", "Inspect"]),
            })
            .unwrap_err();

        assert!(matches!(err, DuodagError::AssignmentError(ref msg) if msg.contains("Inspect")));
        assert_eq!(tracker.current_task(Track::Human), None);
        assert_eq!(tracker.current_task(Track::Automated), None);

        tracker
            .set_assignments(TrackAssignments {
                human: names(&["Inspect"]),
                automated: names(&["B"]),
            })
            .unwrap();
        assert_eq!(tracker.current_task(Track::Human), Some("Inspect"));
    }

    #[test]
    fn removing_unknown_task_is_not_fatal() {
        let mut tracker = AssignmentTracker::default();
        assert!(!tracker.remove_completed(Track::Automated, "ghost"));
    }
}
