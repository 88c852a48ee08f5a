//! Task statuses and the two-phase state machine they move through.
//!
//! Every task walks the same chain twice, once per [`Phase`]:
//!
//! ```text
//! Publish:  WaitingToStart -> PublishRunning  -> PublishDone  | PublishFailed
//! Finalize: PublishDone    -> FinalizeRunning -> FinalizeDone | FinalizeFailed
//! ```
//!
//! The wire encoding is the declaration order (`0..=7`) and must never change:
//! it is the contract between the publishing process and every monitor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a publish task. Items and sessions only derive a status from their tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Status {
    #[default]
    WaitingToStart = 0,
    PublishRunning = 1,
    PublishDone = 2,
    PublishFailed = 3,
    FinalizeRunning = 4,
    FinalizeDone = 5,
    FinalizeFailed = 6,
    /// Display-only annotation. Never reached through the phase chain.
    Warning = 7,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::WaitingToStart,
        Status::PublishRunning,
        Status::PublishDone,
        Status::PublishFailed,
        Status::FinalizeRunning,
        Status::FinalizeDone,
        Status::FinalizeFailed,
        Status::Warning,
    ];

    /// Check if this status ends the task with an error.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Status::PublishFailed | Status::FinalizeFailed)
    }

    /// Check if a task in this status is currently executing a phase.
    pub fn is_running(self) -> bool {
        matches!(self, Status::PublishRunning | Status::FinalizeRunning)
    }

    /// Units of completed work out of the two a task can earn.
    ///
    /// Failed tasks earn nothing so a session with a failure never reports 100%.
    pub fn progress_units(self) -> u32 {
        match self {
            Status::PublishDone | Status::FinalizeRunning => 1,
            Status::FinalizeDone => 2,
            _ => 0,
        }
    }

    /// Whether moving from `self` to `next` follows the phase chain.
    pub fn can_advance_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (WaitingToStart, PublishRunning)
                | (PublishRunning, PublishDone)
                | (PublishRunning, PublishFailed)
                | (PublishDone, FinalizeRunning)
                | (FinalizeRunning, FinalizeDone)
                | (FinalizeRunning, FinalizeFailed)
        )
    }

    /// Human-readable explanation of the status.
    pub fn description(self) -> &'static str {
        match self {
            Status::WaitingToStart => "The publish job is waiting to start",
            Status::PublishRunning => "The publish step is in progress",
            Status::PublishDone => {
                "The publish step is finished and the finalize step is waiting to start"
            }
            Status::PublishFailed => "The publish step has failed",
            Status::FinalizeRunning => "The finalize step is in progress",
            Status::FinalizeDone => "The finalize step is finished",
            Status::FinalizeFailed => "The finalize step has failed",
            Status::Warning => "Something unexpected happened",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::WaitingToStart => "waiting",
            Status::PublishRunning => "publishing",
            Status::PublishDone => "published",
            Status::PublishFailed => "publish failed",
            Status::FinalizeRunning => "finalizing",
            Status::FinalizeDone => "finalized",
            Status::FinalizeFailed => "finalize failed",
            Status::Warning => "warning",
        };
        f.write_str(label)
    }
}

/// Error returned when decoding a status integer outside `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid status value {0}, expected 0..=7")]
pub struct InvalidStatus(pub u8);

impl TryFrom<u8> for Status {
    type Error = InvalidStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Status::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidStatus(value))
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

/// One of the two sequential stages every task goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Publish,
    Finalize,
}

impl Phase {
    pub fn running(self) -> Status {
        match self {
            Phase::Publish => Status::PublishRunning,
            Phase::Finalize => Status::FinalizeRunning,
        }
    }

    pub fn done(self) -> Status {
        match self {
            Phase::Publish => Status::PublishDone,
            Phase::Finalize => Status::FinalizeDone,
        }
    }

    pub fn failed(self) -> Status {
        match self {
            Phase::Publish => Status::PublishFailed,
            Phase::Finalize => Status::FinalizeFailed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Publish => write!(f, "publish"),
            Phase::Finalize => write!(f, "finalize"),
        }
    }
}
