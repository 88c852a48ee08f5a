//! In-memory progress model: sessions, their items and tasks.
//!
//! Sessions are keyed by their job folder, the only identity that survives a
//! monitor restart. The [`SessionId`] handed out on discovery is a handle for the
//! lifetime of this tree only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::document::JobDocument;
use crate::status::Status;

/// Local handle of a session, regenerated every time a job is first discovered.
pub type SessionId = Uuid;

/// Leaf unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub item_id: Option<String>,
    pub session_id: SessionId,
}

/// A grouping of tasks. The root grouping has no id and its tasks belong to the
/// session directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: Option<String>,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Item {
    pub fn is_root(&self) -> bool {
        self.id.is_none()
    }

    /// Status of the first failed task, if any.
    pub fn failure(&self) -> Option<Status> {
        self.tasks
            .iter()
            .map(|t| t.status)
            .find(|s| s.is_terminal_failure())
    }
}

/// One publish job as seen by a monitor.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub job_folder: PathBuf,
    pub items: Vec<Item>,
    /// Modification time of the monitor document when it was last read
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip)]
    index: HashMap<String, (usize, usize)>,
}

impl Session {
    fn from_document(job_folder: &Path, document: &JobDocument) -> Self {
        let id = Uuid::new_v4();
        let mut index = HashMap::new();
        let items = document
            .items
            .iter()
            .enumerate()
            .map(|(item_idx, entry)| {
                let item_id = entry.id().map(str::to_string);
                let tasks = entry
                    .tasks
                    .iter()
                    .enumerate()
                    .map(|(task_idx, task)| {
                        index
                            .entry(task.uuid.clone())
                            .or_insert((item_idx, task_idx));
                        Task {
                            id: task.uuid.clone(),
                            name: task.name.clone(),
                            status: task.status,
                            item_id: item_id.clone(),
                            session_id: id,
                        }
                    })
                    .collect();
                Item {
                    id: item_id,
                    name: entry.name.clone(),
                    tasks,
                }
            })
            .collect();

        Self {
            id,
            name: document.session_name.clone(),
            job_folder: job_folder.to_path_buf(),
            items,
            last_modified: None,
            index,
        }
    }

    /// All tasks in document order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.items.iter().flat_map(|item| item.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.tasks().count()
    }

    /// Constant-time lookup of a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        let (item_idx, task_idx) = *self.index.get(task_id)?;
        self.items.get(item_idx)?.tasks.get(task_idx)
    }

    fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        let (item_idx, task_idx) = *self.index.get(task_id)?;
        self.items.get_mut(item_idx)?.tasks.get_mut(task_idx)
    }

    /// Overall progress in percent, see [`progress_of`].
    pub fn progress(&self) -> u8 {
        progress_of(self)
    }

    /// Status of the first failed task, if any.
    pub fn failure(&self) -> Option<Status> {
        self.items.iter().find_map(Item::failure)
    }

    pub fn is_complete(&self) -> bool {
        self.progress() == 100
    }

    /// Nothing left to happen: either complete or stopped by a failure.
    pub fn is_finished(&self) -> bool {
        self.is_complete() || self.failure().is_some()
    }

    /// An unfinished session whose document has not changed for `after`.
    pub fn is_stale(&self, now: DateTime<Utc>, after: chrono::Duration) -> bool {
        match self.last_modified {
            Some(modified) => !self.is_finished() && now - modified > after,
            None => false,
        }
    }

    /// Where the publishing process of this session writes its log.
    pub fn log_file(&self, file_name: &str) -> PathBuf {
        self.job_folder.join(file_name)
    }
}

/// Progress of a session in percent.
///
/// Each task is worth two units: one for finishing publish, one for finishing
/// finalize. Failed tasks are worth nothing. The result is rounded down and a
/// session without tasks is at 0.
pub fn progress_of(session: &Session) -> u8 {
    let mut completed: u64 = 0;
    let mut count: u64 = 0;
    for task in session.tasks() {
        count += 1;
        completed += u64::from(task.status.progress_units());
    }
    if count == 0 {
        return 0;
    }
    // completed <= 2 * count, so the quotient is at most 100
    (100 * completed / (2 * count)) as u8
}

/// All sessions a monitor currently knows about.
#[derive(Debug, Clone, Default)]
pub struct ProgressTree {
    sessions: HashMap<PathBuf, Session>,
    order: Vec<PathBuf>,
}

impl ProgressTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full subtree of a freshly discovered job.
    ///
    /// A session already registered for `job_folder` is replaced.
    pub fn add_session(&mut self, job_folder: &Path, document: &JobDocument) -> SessionId {
        let session = Session::from_document(job_folder, document);
        let id = session.id;
        if self.sessions.insert(job_folder.to_path_buf(), session).is_none() {
            self.order.push(job_folder.to_path_buf());
        }
        tracing::debug!(job = %job_folder.display(), session = %id, "session added");
        id
    }

    /// Copy task statuses from `document` into a known session.
    ///
    /// The structure of a job never changes after creation, so tasks missing from
    /// the session are ignored. Returns the number of tasks whose status changed,
    /// or `None` for an unknown session.
    pub fn apply_task_statuses(&mut self, job_folder: &Path, document: &JobDocument) -> Option<usize> {
        let session = self.sessions.get_mut(job_folder)?;
        let mut changed = 0;
        for (_, entry) in document.tasks() {
            if let Some(task) = session.task_mut(&entry.uuid)
                && task.status != entry.status
            {
                if !task.status.can_advance_to(entry.status) {
                    tracing::debug!(task = %task.id, from = %task.status, to = %entry.status, "unexpected status change");
                }
                task.status = entry.status;
                changed += 1;
            }
        }
        Some(changed)
    }

    /// Detach a session and all of its tasks.
    pub fn remove_session(&mut self, job_folder: &Path) -> Option<Session> {
        let removed = self.sessions.remove(job_folder)?;
        self.order.retain(|p| p != job_folder);
        tracing::debug!(job = %job_folder.display(), session = %removed.id, "session removed");
        Some(removed)
    }

    pub fn set_last_modified(&mut self, job_folder: &Path, modified: Option<DateTime<Utc>>) {
        if let Some(session) = self.sessions.get_mut(job_folder) {
            session.last_modified = modified;
        }
    }

    pub fn contains(&self, job_folder: &Path) -> bool {
        self.sessions.contains_key(job_folder)
    }

    pub fn session(&self, job_folder: &Path) -> Option<&Session> {
        self.sessions.get(job_folder)
    }

    pub fn session_by_id(&self, id: SessionId) -> Option<&Session> {
        self.sessions.values().find(|s| s.id == id)
    }

    /// Look up a task of a session by id.
    pub fn task(&self, job_folder: &Path, task_id: &str) -> Option<&Task> {
        self.session(job_folder)?.task(task_id)
    }

    /// Sessions in discovery order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|p| self.sessions.get(p))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
