//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                          |
//! |----------|-------------------------------------------|
//! | `jobs`   | `Submit`, `Run`, `Prune`, `OpenLog`       |
//! | `watch`  | `Watch`, `Status`                         |
//! | `config` | `Config`                                  |

pub mod config;
pub mod jobs;
pub mod watch;

pub use config::cmd_config;
pub use jobs::{cmd_open_log, cmd_prune, cmd_run, cmd_submit, job_log_path};
pub use watch::{cmd_status, cmd_watch};
