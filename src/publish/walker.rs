//! Single-pass task walker that records progress as it goes.
//!
//! Yielding a task marks it running and, in the same rewrite, marks the task
//! yielded before it as done. The walker cannot know when the last task
//! finishes, so [`PhaseWalker::finish`] has to be called once the phase body
//! completed without error.

use std::path::Path;

use crate::document::JobDocument;
use crate::errors::DocumentError;
use crate::job::{JobItem, JobSpec, JobTask};
use crate::status::Phase;

/// A task handed out by the walker, with the item it belongs to.
pub type TaskRef<'a> = (&'a JobItem, &'a JobTask);

/// Walks the active tasks of a job for one phase.
pub struct PhaseWalker<'a> {
    job: &'a JobSpec,
    monitor_path: &'a Path,
    phase: Phase,
    item_idx: usize,
    task_idx: usize,
    previous: Option<TaskRef<'a>>,
    failed: bool,
}

impl<'a> PhaseWalker<'a> {
    pub fn new(job: &'a JobSpec, monitor_path: &'a Path, phase: Phase) -> Self {
        Self {
            job,
            monitor_path,
            phase,
            item_idx: 0,
            task_idx: 0,
            previous: None,
            failed: false,
        }
    }

    /// Mark the last yielded task, and its item, as done.
    pub fn finish(&self) -> Result<(), DocumentError> {
        let Some((item, task)) = self.previous else {
            return Ok(());
        };
        let done = self.phase.done();
        JobDocument::update(self.monitor_path, |doc| {
            doc.set_task_status(&task.uuid, done);
            if let Some(item_id) = item.id() {
                doc.set_item_status(item_id, done);
            }
        })
    }

    fn start_task(&self, item: &JobItem, task: &JobTask) -> Result<(), DocumentError> {
        let running = self.phase.running();
        let done = self.phase.done();
        let previous = self.previous.map(|(_, t)| t.uuid.as_str());
        JobDocument::update(self.monitor_path, |doc| {
            if let Some(item_id) = item.id() {
                doc.set_item_status(item_id, running);
            }
            doc.set_task_status(&task.uuid, running);
            if let Some(previous) = previous {
                doc.set_task_status(previous, done);
            }
        })
    }

    fn finish_item(&self, item: &JobItem) -> Result<(), DocumentError> {
        let Some(item_id) = item.id() else {
            return Ok(());
        };
        let done = self.phase.done();
        JobDocument::update(self.monitor_path, |doc| {
            doc.set_item_status(item_id, done);
        })
    }

    fn advance(&mut self) -> Result<Option<TaskRef<'a>>, DocumentError> {
        let job = self.job;
        let items = &job.items;
        while let Some(item) = items.get(self.item_idx) {
            let next = item
                .tasks
                .iter()
                .enumerate()
                .skip(self.task_idx)
                .find(|(_, t)| t.active);

            match next {
                Some((idx, task)) => {
                    self.start_task(item, task)?;
                    self.task_idx = idx + 1;
                    self.previous = Some((item, task));
                    return Ok(Some((item, task)));
                }
                None => {
                    self.finish_item(item)?;
                    self.item_idx += 1;
                    self.task_idx = 0;
                }
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for PhaseWalker<'a> {
    type Item = Result<TaskRef<'a>, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(step) => step.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
