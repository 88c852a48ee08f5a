//! Two-phase publish driver.
//!
//! Runs every active task through the publish phase, then, only if all of them
//! succeeded, through the finalize phase. Progress is recorded in the monitor
//! document by a [`PhaseWalker`]; on the first failure the running task and its
//! item are marked failed and the job stops.

use std::path::{Path, PathBuf};

use crate::document::JobDocument;
use crate::errors::{DriverError, PhaseFailure};
use crate::job::JobSpec;
use crate::publish::runner::TaskRunner;
use crate::publish::walker::PhaseWalker;
use crate::status::Phase;

pub struct PublishDriver<R> {
    monitor_path: PathBuf,
    runner: R,
}

impl<R: TaskRunner> PublishDriver<R> {
    pub fn new(monitor_path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            monitor_path: monitor_path.into(),
            runner,
        }
    }

    pub fn monitor_path(&self) -> &Path {
        &self.monitor_path
    }

    /// Publish then finalize `job`.
    ///
    /// Writes the initial monitor document first if the job folder has none yet.
    pub async fn run(&self, job: &JobSpec) -> Result<(), DriverError> {
        if !self.monitor_path.exists() {
            tracing::info!(path = %self.monitor_path.display(), "writing initial monitor document");
            job.monitor_document().save(&self.monitor_path)?;
        }

        tracing::info!(session = %job.session_name, tasks = job.active_tasks().count(), "starting publish");
        self.run_phase(job, Phase::Publish).await?;
        self.run_phase(job, Phase::Finalize).await?;
        tracing::info!(session = %job.session_name, "publish complete");
        Ok(())
    }

    async fn run_phase(&self, job: &JobSpec, phase: Phase) -> Result<(), DriverError> {
        tracing::info!(%phase, "phase started");
        match self.walk(job, phase).await {
            Ok(()) => {
                tracing::info!(%phase, "phase finished");
                Ok(())
            }
            Err(source) => Err(self.fail(phase, source).into()),
        }
    }

    async fn walk(&self, job: &JobSpec, phase: Phase) -> anyhow::Result<()> {
        let mut walker = PhaseWalker::new(job, &self.monitor_path, phase);
        for step in walker.by_ref() {
            let (item, task) = step?;
            tracing::info!(%phase, item = %item.name, task = %task.name, "task started");
            self.runner.run(phase, item, task).await?;
        }
        walker.finish()?;
        Ok(())
    }

    /// Blame the running task for `source` and build the failure to report.
    fn fail(&self, phase: Phase, source: anyhow::Error) -> PhaseFailure {
        let task = match JobDocument::update(&self.monitor_path, |doc| {
            doc.attribute_failure(phase.running(), phase.failed())
        }) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(error = %e, "could not record failure in monitor document");
                None
            }
        };

        if task.is_none() {
            tracing::warn!(%phase, "no running task found to mark as failed");
        }
        tracing::error!(%phase, task = task.as_deref().unwrap_or("-"), error = %source, "phase failed");
        PhaseFailure { phase, task, source }
    }
}
