//! Publish side: runs a job and records its progress for monitors.
//!
//! - `walker`: hands out tasks one at a time, writing statuses as it goes
//! - `runner`: the [`TaskRunner`] seam and its shell command implementation
//! - `driver`: publish phase, then finalize phase, with failure attribution

pub mod driver;
pub mod runner;
pub mod walker;

pub use driver::PublishDriver;
pub use runner::{CommandRunner, TaskRunner};
pub use walker::PhaseWalker;
