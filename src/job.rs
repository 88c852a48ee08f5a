//! Job descriptions and job folders.
//!
//! A job folder lives directly under the jobs root and holds everything one publish
//! needs:
//!
//! ```text
//! <jobs_root>/<uuid>/
//! ├── job.yml          # What to run: items, tasks and their per-phase commands
//! ├── monitor.yml      # Live status, rewritten by the publishing process
//! └── bg_publish.log   # Log of the publishing process
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::document::{ItemEntry, JobDocument, MONITOR_FILE, TaskEntry};
use crate::errors::JobError;
use crate::status::{Phase, Status};

/// File name of the job description inside a job folder.
pub const JOB_FILE: &str = "job.yml";

/// Description of a publish job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Name shown for the session in monitors (usually the work file name)
    pub session_name: String,
    pub items: Vec<JobItem>,
}

/// A publishable unit and the tasks that publish it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    #[serde(default)]
    pub uuid: Option<String>,
    /// Tasks of the root grouping hang directly off the session
    #[serde(default)]
    pub is_parent_root: bool,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<JobTask>,
}

impl JobItem {
    pub fn id(&self) -> Option<&str> {
        if self.is_parent_root {
            None
        } else {
            self.uuid.as_deref()
        }
    }
}

/// A single task with the command to run in each phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTask {
    #[serde(default = "new_id")]
    pub uuid: String,
    pub name: String,
    /// Inactive tasks are neither run nor monitored
    #[serde(default = "default_active")]
    pub active: bool,
    /// Shell command for the publish phase; no command means nothing to do
    #[serde(default)]
    pub publish: Option<String>,
    /// Shell command for the finalize phase
    #[serde(default)]
    pub finalize: Option<String>,
    /// Working directory for the commands, relative to the job folder
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl JobTask {
    /// The command to run for `phase`, if any.
    pub fn command(&self, phase: Phase) -> Option<&str> {
        match phase {
            Phase::Publish => self.publish.as_deref(),
            Phase::Finalize => self.finalize.as_deref(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_active() -> bool {
    true
}

impl JobSpec {
    /// Load a job description from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse job YAML: {}", path.display()))
    }

    /// Save the job description to a YAML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize job to YAML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write job file: {}", path.display()))?;
        Ok(())
    }

    /// Give every non-root item without a uuid a fresh one.
    pub fn assign_missing_ids(&mut self) {
        for item in &mut self.items {
            if !item.is_parent_root && item.uuid.is_none() {
                item.uuid = Some(new_id());
            }
        }
    }

    /// Check the invariants monitors rely on.
    pub fn validate(&self) -> Result<(), JobError> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !item.is_parent_root && item.uuid.is_none() {
                return Err(JobError::MissingItemId {
                    name: item.name.clone(),
                });
            }
            for task in item.tasks.iter().filter(|t| t.active) {
                if !seen.insert(task.uuid.as_str()) {
                    return Err(JobError::DuplicateTaskId {
                        id: task.uuid.clone(),
                    });
                }
            }
        }
        if seen.is_empty() {
            return Err(JobError::NoActiveTasks {
                name: self.session_name.clone(),
            });
        }
        Ok(())
    }

    /// Active tasks in execution order, with their items.
    pub fn active_tasks(&self) -> impl Iterator<Item = (&JobItem, &JobTask)> {
        self.items
            .iter()
            .flat_map(|item| item.tasks.iter().filter(|t| t.active).map(move |t| (item, t)))
    }

    /// The initial monitor document: every active task waiting to start.
    pub fn monitor_document(&self) -> JobDocument {
        JobDocument {
            session_name: self.session_name.clone(),
            items: self
                .items
                .iter()
                .map(|item| ItemEntry {
                    uuid: item.uuid.clone(),
                    is_parent_root: item.is_parent_root,
                    name: item.name.clone(),
                    status: Status::WaitingToStart,
                    tasks: item
                        .tasks
                        .iter()
                        .filter(|t| t.active)
                        .map(|t| TaskEntry {
                            uuid: t.uuid.clone(),
                            name: t.name.clone(),
                            status: Status::WaitingToStart,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Create a new job folder under `jobs_root` for `spec`.
///
/// The monitor document is written last: monitors only pick the job up once both
/// files exist.
pub fn create_job_folder(jobs_root: &Path, spec: &JobSpec) -> Result<PathBuf> {
    let mut spec = spec.clone();
    spec.assign_missing_ids();
    spec.validate()?;

    let job_dir = jobs_root.join(Uuid::new_v4().simple().to_string());
    std::fs::create_dir_all(&job_dir)
        .with_context(|| format!("Failed to create job folder: {}", job_dir.display()))?;

    spec.save(&job_dir.join(JOB_FILE))?;
    spec.monitor_document()
        .save(&job_dir.join(MONITOR_FILE))
        .context("Failed to write initial monitor document")?;

    tracing::info!(job = %job_dir.display(), session = %spec.session_name, "created job folder");
    Ok(job_dir)
}

/// Resolve a job given either a path or a folder name under `jobs_root`.
pub fn resolve_job_dir(jobs_root: &Path, job: &str) -> Result<PathBuf> {
    let as_path = PathBuf::from(job);
    let candidate = if as_path.is_absolute() || as_path.exists() {
        as_path
    } else {
        jobs_root.join(job)
    };

    if !candidate.join(MONITOR_FILE).exists() && !candidate.join(JOB_FILE).exists() {
        anyhow::bail!("No job found at {}", candidate.display());
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SPEC: &str = r#"
session_name: scene_v003.ma
items:
  - is_parent_root: true
    name: Session
    tasks:
      - uuid: t-session
        name: Save session
        publish: "true"
  - uuid: item-geo
    name: geometry.abc
    tasks:
      - uuid: t-geo
        name: Publish geometry
        publish: "echo publish"
        finalize: "echo finalize"
      - uuid: t-skip
        name: Disabled
        active: false
"#;

    #[test]
    fn test_parse_spec_defaults() {
        let spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        assert_eq!(spec.items.len(), 2);
        let geo = &spec.items[1].tasks[0];
        assert!(geo.active);
        assert_eq!(geo.command(Phase::Publish), Some("echo publish"));
        assert_eq!(geo.command(Phase::Finalize), Some("echo finalize"));
        assert_eq!(spec.items[0].tasks[0].command(Phase::Finalize), None);
        assert!(!spec.items[1].tasks[1].active);
    }

    #[test]
    fn test_missing_task_uuid_is_generated() {
        let spec: JobSpec = serde_yaml::from_str(
            "session_name: s\nitems:\n  - name: i\n    is_parent_root: true\n    tasks:\n      - name: a\n      - name: b\n",
        )
        .unwrap();
        let ids: Vec<_> = spec.active_tasks().map(|(_, t)| t.uuid.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_monitor_document_skips_inactive_tasks() {
        let spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        let doc = spec.monitor_document();
        assert_eq!(doc.session_name, "scene_v003.ma");
        assert_eq!(doc.task_count(), 2);
        assert!(doc.tasks().all(|(_, t)| t.status == Status::WaitingToStart));
        assert_eq!(doc.task_status("t-skip"), None);
    }

    #[test]
    fn test_validate_rejects_duplicate_task_ids() {
        let mut spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        spec.items[1].tasks[0].uuid = "t-session".to_string();
        assert!(matches!(
            spec.validate(),
            Err(JobError::DuplicateTaskId { id }) if id == "t-session"
        ));
    }

    #[test]
    fn test_validate_rejects_job_without_active_tasks() {
        let spec = JobSpec {
            session_name: "empty".to_string(),
            items: vec![],
        };
        assert!(matches!(spec.validate(), Err(JobError::NoActiveTasks { .. })));
    }

    #[test]
    fn test_assign_missing_ids_leaves_root_alone() {
        let mut spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        spec.items[1].uuid = None;
        assert!(matches!(spec.validate(), Err(JobError::MissingItemId { .. })));
        spec.assign_missing_ids();
        assert!(spec.items[0].uuid.is_none());
        assert!(spec.items[1].uuid.is_some());
        spec.validate().unwrap();
    }

    #[test]
    fn test_create_job_folder_writes_both_files() {
        let root = tempdir().unwrap();
        let spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        let job_dir = create_job_folder(root.path(), &spec).unwrap();

        assert_eq!(job_dir.parent().unwrap(), root.path());
        let saved = JobSpec::load(&job_dir.join(JOB_FILE)).unwrap();
        assert_eq!(saved, spec);
        let doc = JobDocument::load(&job_dir.join(MONITOR_FILE)).unwrap();
        assert_eq!(doc.task_count(), 2);
    }

    #[test]
    fn test_resolve_job_dir_by_name() {
        let root = tempdir().unwrap();
        let spec: JobSpec = serde_yaml::from_str(SPEC).unwrap();
        let job_dir = create_job_folder(root.path(), &spec).unwrap();
        let name = job_dir.file_name().unwrap().to_str().unwrap();

        assert_eq!(resolve_job_dir(root.path(), name).unwrap(), job_dir);
        assert!(resolve_job_dir(root.path(), "does-not-exist").is_err());
    }
}
