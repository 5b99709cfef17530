// src/exec/backend.rs

//! Pluggable actuator abstraction.
//!
//! The dispatcher talks to an `Actuator` instead of a concrete robot client,
//! so a scripted fake can stand in during tests.
//!
//! Contract: no call may block indefinitely. Implementations bound their own
//! IO; the dispatcher additionally races every call against its stuck
//! watchdog.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{ModeVariant, RunState};

/// Boxed future returned by [`Actuator`] methods.
pub type ActuatorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait abstracting the physical (automated) executor.
pub trait Actuator: Send + Sync {
    /// Load and start `program` in the given variant. `Err` means the run
    /// did not start.
    fn start<'a>(&'a self, program: &'a str, mode: ModeVariant) -> ActuatorFuture<'a, ()>;

    /// Coarse run-state. `Err` means the state could not be read at all.
    fn poll_run_state(&self) -> ActuatorFuture<'_, RunState>;

    /// Stop whatever is running.
    fn force_stop(&self) -> ActuatorFuture<'_, ()>;

    /// Hold the current run while monitoring is suspended.
    fn pause(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Continue a run held by [`Actuator::pause`].
    fn resume(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
