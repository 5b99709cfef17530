// src/dag/mod.rs

//! Dependency bookkeeping shared by both tracks.
//!
//! - [`graph`] holds the read-only dependency map.
//! - [`ledger`] owns the finished set and answers "is X unblocked?".
//! - [`assignments`] tracks which tasks each track is working through.
//! - [`task_info`] turns catalog entries into records and a program index.

pub mod assignments;
pub mod graph;
pub mod ledger;
pub mod task_info;

pub use assignments::{AssignmentTracker, TrackAssignments};
pub use graph::DagGraph;
pub use ledger::{DependencyLedger, Readiness};
pub use task_info::{ProgramIndex, ProgramInfo, TaskRecord};
