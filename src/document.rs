//! The monitor document: the YAML file a publishing process and its monitors share.
//!
//! The publishing process is the only writer. Every change is a full rewrite of the
//! file through a sibling temporary file that is renamed over the original, so a
//! monitor reading concurrently sees the old or the new content. On filesystems
//! without atomic rename a monitor may still see a torn file; it reports a
//! [`DocumentError`] and tries again on the next poll.
//!
//! ```yaml
//! session_name: shot_010_lighting.ma
//! items:
//! - uuid: 5c0e...
//!   is_parent_root: false
//!   name: Maya Session
//!   status: 1
//!   tasks:
//!   - uuid: 8d1f...
//!     name: Publish to ShotGrid
//!     status: 1
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::DocumentError;
use crate::status::Status;

/// File name of the monitor document inside a job folder.
pub const MONITOR_FILE: &str = "monitor.yml";

/// Full content of a monitor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDocument {
    pub session_name: String,
    pub items: Vec<ItemEntry>,
}

/// A publish item and its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    /// Absent for the implicit root grouping.
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub is_parent_root: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Status,
    pub tasks: Vec<TaskEntry>,
}

impl ItemEntry {
    /// Identifier of the item, `None` for the root grouping.
    pub fn id(&self) -> Option<&str> {
        if self.is_parent_root {
            None
        } else {
            self.uuid.as_deref()
        }
    }
}

/// A single task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub uuid: String,
    pub name: String,
    pub status: Status,
}

impl JobDocument {
    /// Load a monitor document from disk.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                DocumentError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                DocumentError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, DocumentError> {
        serde_yaml::from_str(content).map_err(|source| DocumentError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rewrite the whole document at `path`.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let content = serde_yaml::to_string(self).map_err(|source| DocumentError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp = temp_path(path);
        let write_err = |source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        };

        fs::write(&tmp, content).map_err(write_err)?;
        if let Err(source) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(source));
        }
        Ok(())
    }

    /// Read the document, apply `f`, and write it back.
    ///
    /// Nothing is cached between calls so every change is visible to monitors as soon
    /// as it returns.
    pub fn update<T>(
        path: &Path,
        f: impl FnOnce(&mut JobDocument) -> T,
    ) -> Result<T, DocumentError> {
        let mut document = Self::load(path)?;
        let result = f(&mut document);
        document.save(path)?;
        Ok(result)
    }

    /// All tasks in document order, with the item owning them.
    pub fn tasks(&self) -> impl Iterator<Item = (&ItemEntry, &TaskEntry)> {
        self.items
            .iter()
            .flat_map(|item| item.tasks.iter().map(move |task| (item, task)))
    }

    pub fn task_count(&self) -> usize {
        self.items.iter().map(|item| item.tasks.len()).sum()
    }

    pub fn task_status(&self, task_id: &str) -> Option<Status> {
        self.tasks()
            .find(|(_, task)| task.uuid == task_id)
            .map(|(_, task)| task.status)
    }

    pub fn item_status(&self, item_id: &str) -> Option<Status> {
        self.items
            .iter()
            .find(|item| item.id() == Some(item_id))
            .map(|item| item.status)
    }

    /// Set the status of a task. Returns `false` if no task has this id.
    pub fn set_task_status(&mut self, task_id: &str, status: Status) -> bool {
        for task in self.items.iter_mut().flat_map(|item| item.tasks.iter_mut()) {
            if task.uuid == task_id {
                log_transition("task", task_id, task.status, status);
                task.status = status;
                return true;
            }
        }
        false
    }

    /// Set the status of an identified item. Returns `false` if no item has this id.
    pub fn set_item_status(&mut self, item_id: &str, status: Status) -> bool {
        match self.items.iter_mut().find(|item| item.id() == Some(item_id)) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }

    /// First task, in document order, whose status is `status`.
    pub fn first_task_with_status(&self, status: Status) -> Option<(&ItemEntry, &TaskEntry)> {
        self.tasks().find(|(_, task)| task.status == status)
    }

    /// Mark the first task found in `running` and its item as `failed`.
    ///
    /// First match wins: tasks run one at a time, so at most one should be running.
    /// Returns the id of the task that took the blame.
    pub fn attribute_failure(&mut self, running: Status, failed: Status) -> Option<String> {
        for item in &mut self.items {
            if let Some(task) = item.tasks.iter_mut().find(|t| t.status == running) {
                task.status = failed;
                item.status = failed;
                return Some(task.uuid.clone());
            }
        }
        None
    }
}

fn log_transition(kind: &str, id: &str, from: Status, to: Status) {
    if from != to && !from.can_advance_to(to) {
        tracing::debug!(kind, id, %from, %to, "status change outside the phase chain");
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MONITOR_FILE.to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
