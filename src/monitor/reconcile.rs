//! Reconciliation of the progress tree with the job folders on disk.
//!
//! One cycle:
//! 1. list the job folders under the jobs root
//! 2. load documents of new folders and add them (unreadable ones are retried next cycle)
//! 3. load documents of known folders and copy their task statuses (unreadable ones keep their state)
//! 4. drop sessions whose document disappeared
//!
//! Removals only look at sessions known before the cycle started, so a job is
//! never added and removed in the same cycle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::document::{JobDocument, MONITOR_FILE};
use crate::monitor::tree::ProgressTree;

/// What a reconciliation cycle changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub added: Vec<PathBuf>,
    /// Known sessions whose document was read (whether or not a status changed)
    pub updated: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Documents that could not be loaded this cycle
    pub skipped: Vec<PathBuf>,
    /// Number of task statuses that changed
    pub changed_tasks: usize,
}

impl CycleReport {
    /// Whether the cycle changed anything in the tree.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || self.changed_tasks > 0
    }
}

/// Keeps a [`ProgressTree`] in line with the job folders under one root.
#[derive(Debug, Clone)]
pub struct Reconciler {
    jobs_root: PathBuf,
    known: BTreeSet<PathBuf>,
}

impl Reconciler {
    pub fn new(jobs_root: impl Into<PathBuf>) -> Self {
        Self {
            jobs_root: jobs_root.into(),
            known: BTreeSet::new(),
        }
    }

    pub fn jobs_root(&self) -> &Path {
        &self.jobs_root
    }

    /// Job folders currently represented in the tree.
    pub fn known(&self) -> &BTreeSet<PathBuf> {
        &self.known
    }

    /// Run one reconciliation cycle.
    ///
    /// Errors only for failures of the jobs root itself; a bad job folder never
    /// aborts the cycle.
    pub fn reconcile(&mut self, tree: &mut ProgressTree) -> Result<CycleReport> {
        let previously_known = self.known.clone();
        let present = self.job_folders()?;
        let mut report = CycleReport::default();

        self.apply_present(tree, &present, &previously_known, &mut report);
        self.remove_missing(tree, &previously_known, &mut report);

        if report.has_changes() {
            tracing::debug!(
                added = report.added.len(),
                removed = report.removed.len(),
                changed_tasks = report.changed_tasks,
                skipped = report.skipped.len(),
                "reconciliation cycle"
            );
        }
        Ok(report)
    }

    /// Add new folders and copy task statuses of folders in `previous`.
    fn apply_present(
        &mut self,
        tree: &mut ProgressTree,
        present: &[PathBuf],
        previous: &BTreeSet<PathBuf>,
        report: &mut CycleReport,
    ) {
        for folder in present {
            let monitor_path = folder.join(MONITOR_FILE);
            let document = match JobDocument::load(&monitor_path) {
                Ok(document) => document,
                Err(e) => {
                    tracing::debug!(path = %e.path().display(), error = %e, "skipping unreadable monitor document");
                    report.skipped.push(folder.clone());
                    continue;
                }
            };
            let modified = modified_at(&monitor_path);

            if previous.contains(folder) && tree.contains(folder) {
                report.changed_tasks += tree.apply_task_statuses(folder, &document).unwrap_or(0);
                report.updated.push(folder.clone());
            } else {
                tree.add_session(folder, &document);
                self.known.insert(folder.clone());
                report.added.push(folder.clone());
            }
            tree.set_last_modified(folder, modified);
        }
    }

    /// Drop sessions from `previous` whose document is gone.
    ///
    /// Sessions added during the current cycle are not in `previous` and
    /// always survive until the next one.
    fn remove_missing(
        &mut self,
        tree: &mut ProgressTree,
        previous: &BTreeSet<PathBuf>,
        report: &mut CycleReport,
    ) {
        for folder in previous {
            if !folder.join(MONITOR_FILE).exists() {
                tree.remove_session(folder);
                self.known.remove(folder);
                report.removed.push(folder.clone());
            }
        }
    }

    /// Forget a job explicitly, e.g. after its folder was deleted by the user.
    pub fn discard(&mut self, tree: &mut ProgressTree, job_folder: &Path) -> bool {
        let known = self.known.remove(job_folder);
        tree.remove_session(job_folder).is_some() || known
    }

    /// Immediate subdirectories of the jobs root that hold a monitor document.
    fn job_folders(&self) -> Result<Vec<PathBuf>> {
        if !self.jobs_root.exists() {
            return Ok(Vec::new());
        }

        let mut folders = Vec::new();
        for entry in WalkDir::new(&self.jobs_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                // A folder deleted while listing is a job going away, not a failure.
                Err(e) if e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::NotFound) => {
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to list jobs root: {}", self.jobs_root.display())
                    });
                }
            };
            if entry.file_type().is_dir() && entry.path().join(MONITOR_FILE).exists() {
                folders.push(entry.into_path());
            }
        }
        Ok(folders)
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}
