//! Monitor side: follows publish jobs through their monitor documents.
//!
//! | Module      | Responsibility                                              |
//! |-------------|-------------------------------------------------------------|
//! | `tree`      | Sessions, items and tasks in memory; progress aggregation   |
//! | `reconcile` | Diff the job folders on disk against the tree and apply it  |
//! | `poller`    | Self re-arming loop running one reconciliation at a time    |

pub mod poller;
pub mod reconcile;
pub mod tree;

pub use poller::Poller;
pub use reconcile::{CycleReport, Reconciler};
pub use tree::{Item, ProgressTree, Session, SessionId, Task, progress_of};
