// src/engine/mod.rs

//! Automated-track dispatch engine.
//!
//! - [`queue`] is the FIFO of pending programs with bounded retries.
//! - [`core`] is the synchronous dispatcher state: ledger, assignments,
//!   queue, current task, history. Every read-modify-write happens there,
//!   under one lock, and never across an await.
//! - [`service`] is the cloneable handle that the console and the worker
//!   share; it owns the lock, the wake-up signal and the actuator.
//! - [`runtime`] is the async worker loop driving the state machine
//!   `IDLE -> DEP_WAIT -> EXECUTING -> MONITORING (<-> PAUSED) -> IDLE`.

use serde::Serialize;

use crate::types::{ModeVariant, Track};

/// Human-readable task name, used by the ledger and assignments.
pub type TaskName = String;

/// Machine-readable program identifier, used by the automated queue.
pub type ProgramId = String;

/// Dispatcher state as reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchPhase {
    Idle,
    DepWait,
    Executing,
    Monitoring,
    /// Monitoring suspended by `pause_processing`; the task is still in flight.
    Paused,
}

/// Snapshot returned by `get-dispatcher-status`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatus {
    pub state: DispatchPhase,
    pub current_program: Option<ProgramId>,
    pub current_task: Option<TaskName>,
    pub queue_depth: usize,
    pub queue: Vec<ProgramId>,
    pub executed_count: usize,
    pub abandoned: Vec<ProgramId>,
    /// True when the started flag is cleared.
    pub paused: bool,
    pub mode: ModeVariant,
    pub message: String,
    pub all_completed: bool,
    /// Time left before monitoring gives up and assumes success.
    pub remaining_wait_ms: Option<u64>,
}

/// Emitted once per successful completion, on either track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub track: Track,
    /// Program id for automated completions, task name for human ones.
    pub task_id: String,
    pub name: TaskName,
    pub timestamp_ms: i64,
}

/// One successful automated execution, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub program: ProgramId,
    pub name: TaskName,
    pub timestamp_ms: i64,
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub mod core;
pub mod queue;
pub mod runtime;
pub mod service;

pub use self::core::{DispatchCore, InFlight};
pub use queue::{AutomatedQueue, QueuedTask, RetryDecision};
pub use runtime::Dispatcher;
pub use service::DispatchService;
