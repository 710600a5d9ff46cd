// src/exec/mod.rs

//! Execution layer.
//!
//! The scheduler decides where and when tasks run; this module runs them and
//! reports back to the runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `SimulatedExecutor` used by the binary. Tests swap in a fake.
//! - [`executor_loop`] owns the background loop tracking active tasks.
//! - [`task_runner`] plays out a single task.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, SimulatedExecutor};
pub use executor_loop::{spawn_executor, ExecutorCommand};
