// src/exec/mod.rs

//! Actuation layer.
//!
//! - [`backend`] defines the [`Actuator`] trait the dispatcher drives.
//! - [`dashboard`] talks to a robot dashboard server over TCP.
//! - [`simulated`] stands in for the robot when no hardware is attached.
//!
//! Tests replace all of these with a scripted fake.

pub mod backend;
pub mod dashboard;
pub mod simulated;

pub use backend::{Actuator, ActuatorFuture};
pub use dashboard::DashboardActuator;
pub use simulated::SimulatedActuator;
