//! Execution of individual tasks.
//!
//! [`TaskRunner`] is the seam to whatever actually publishes: the driver only
//! knows that a task either succeeded or failed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::job::{JobItem, JobTask};
use crate::status::Phase;

/// Runs one task for one phase.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, phase: Phase, item: &JobItem, task: &JobTask) -> Result<()>;
}

/// Runs the shell command a task declares for each phase.
///
/// The command sees the job folder as working directory (or the task's own
/// `working_dir`, resolved against it) and gets the task metadata in
/// `BGPUBLISH_*` environment variables. Output is forwarded to the log.
pub struct CommandRunner {
    job_dir: PathBuf,
    shell: String,
}

impl CommandRunner {
    pub fn new(job_dir: impl AsRef<Path>, shell: impl Into<String>) -> Self {
        Self {
            job_dir: job_dir.as_ref().to_path_buf(),
            shell: shell.into(),
        }
    }

    fn working_dir(&self, task: &JobTask) -> PathBuf {
        match &task.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.job_dir.join(dir),
            None => self.job_dir.clone(),
        }
    }
}

#[async_trait]
impl TaskRunner for CommandRunner {
    async fn run(&self, phase: Phase, item: &JobItem, task: &JobTask) -> Result<()> {
        let Some(command) = task.command(phase) else {
            tracing::debug!(task = %task.name, %phase, "no command for phase");
            return Ok(());
        };

        tracing::info!(task = %task.name, %phase, command, "running task command");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(self.working_dir(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("BGPUBLISH_PHASE", phase.to_string())
            .env("BGPUBLISH_JOB_DIR", &self.job_dir)
            .env("BGPUBLISH_ITEM_ID", item.id().unwrap_or(""))
            .env("BGPUBLISH_ITEM_NAME", &item.name)
            .env("BGPUBLISH_TASK_ID", &task.uuid)
            .env("BGPUBLISH_TASK_NAME", &task.name)
            .output()
            .await
            .with_context(|| format!("Failed to spawn command for task '{}': {}", task.name, command))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::info!(task = %task.name, "{}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            tracing::warn!(task = %task.name, "{}", line);
        }

        if !output.status.success() {
            anyhow::bail!(
                "Command for task '{}' exited with code {}",
                task.name,
                output.status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}
