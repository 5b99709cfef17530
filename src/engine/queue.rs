// src/engine/queue.rs

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use super::ProgramId;

/// A pending automated-track program plus how often it already failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedTask {
    pub program: ProgramId,
    /// Number of failed start attempts so far.
    pub failures: u32,
}

/// What happened to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-appended to the tail; `failures` is the new count.
    Requeued { failures: u32 },
    /// Retry budget exhausted; moved to the abandoned list.
    Abandoned { failures: u32 },
}

/// FIFO queue of automated-track programs.
///
/// Semantics:
/// - `enqueue` appends to the tail; `pop_next` removes from the head.
/// - A failed task goes back to the tail, so it runs after everything that
///   was queued before the failure and before anything queued after it.
/// - After `max_retries` re-queues the task is abandoned instead, which
///   keeps a permanently failing program from cycling forever.
#[derive(Debug)]
pub struct AutomatedQueue {
    max_retries: u32,
    pending: VecDeque<QueuedTask>,
    abandoned: Vec<ProgramId>,
}

impl AutomatedQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            pending: VecDeque::new(),
            abandoned: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn enqueue(&mut self, program: impl Into<ProgramId>) {
        let program = program.into();
        debug!(program = %program, depth = self.pending.len() + 1, "enqueued automated task");
        self.pending.push_back(QueuedTask {
            program,
            failures: 0,
        });
    }

    pub fn pop_next(&mut self) -> Option<QueuedTask> {
        self.pending.pop_front()
    }

    /// Record a failed attempt of `task` and decide whether it runs again.
    pub fn requeue_failed(&mut self, task: QueuedTask) -> RetryDecision {
        let failures = task.failures + 1;

        if failures > self.max_retries {
            warn!(
                program = %task.program,
                failures,
                max_retries = self.max_retries,
                "retry budget exhausted; abandoning task"
            );
            self.abandoned.push(task.program);
            return RetryDecision::Abandoned { failures };
        }

        debug!(program = %task.program, failures, "re-queued failed task at tail");
        self.pending.push_back(QueuedTask {
            program: task.program,
            failures,
        });
        RetryDecision::Requeued { failures }
    }

    /// Pending program ids, head first.
    pub fn snapshot(&self) -> Vec<ProgramId> {
        self.pending.iter().map(|t| t.program.clone()).collect()
    }

    pub fn abandoned(&self) -> &[ProgramId] {
        &self.abandoned
    }

    /// Record a task dropped for a reason other than retries (e.g. stuck).
    pub fn abandon(&mut self, program: ProgramId) {
        self.abandoned.push(program);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.abandoned.clear();
    }
}
