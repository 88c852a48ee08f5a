//! Job commands: submit, run, prune and open-log.

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use bgpublish::config::BgPublishConfig;
use bgpublish::document::{JobDocument, MONITOR_FILE};
use bgpublish::errors::DriverError;
use bgpublish::job::{JOB_FILE, JobSpec, create_job_folder, resolve_job_dir};
use bgpublish::monitor::{ProgressTree, Reconciler, Session};
use bgpublish::publish::{CommandRunner, PublishDriver};
use bgpublish::ui::icons::{CHECK, CROSS, FOLDER, TRASH};

/// Where `run` writes its log for `job`.
pub fn job_log_path(config: &BgPublishConfig, job: &str) -> Result<PathBuf> {
    let job_dir = resolve_job_dir(&config.jobs_root(), job)?;
    Ok(job_dir.join(config.log_file()))
}

pub fn cmd_submit(config: &BgPublishConfig, job_file: &Path, start: bool) -> Result<()> {
    let spec = JobSpec::load(job_file)?;
    let jobs_root = config.jobs_root();
    let job_dir = create_job_folder(&jobs_root, &spec)?;

    println!(
        "{}Submitted '{}' as {}",
        CHECK,
        spec.session_name,
        style(job_dir.display()).bold()
    );

    if start {
        let pid = spawn_runner(config, &job_dir)?;
        println!("Publishing in the background (pid {})", pid);
        println!("Follow it with `bgpublish watch`.");
    } else {
        println!("Start it with `bgpublish run {}`.", job_dir.display());
    }
    Ok(())
}

/// Start `bgpublish run <job_dir>` as a detached process.
fn spawn_runner(config: &BgPublishConfig, job_dir: &Path) -> Result<u32> {
    let exe = std::env::current_exe().context("Failed to locate the bgpublish executable")?;
    let child = std::process::Command::new(exe)
        .arg("--config")
        .arg(&config.config_path)
        .arg("--jobs-root")
        .arg(config.jobs_root())
        .arg("run")
        .arg(job_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to start background publish process")?;

    tracing::info!(pid = child.id(), job = %job_dir.display(), "spawned background publish");
    Ok(child.id())
}

pub async fn cmd_run(config: &BgPublishConfig, job: &str) -> Result<()> {
    let job_dir = resolve_job_dir(&config.jobs_root(), job)?;
    let spec = JobSpec::load(&job_dir.join(JOB_FILE))?;

    let monitor_path = job_dir.join(MONITOR_FILE);
    let runner = CommandRunner::new(&job_dir, config.shell());
    let driver = PublishDriver::new(&monitor_path, runner);

    match driver.run(&spec).await {
        Ok(()) => {
            println!("{}Published '{}'", CHECK, spec.session_name);
            Ok(())
        }
        Err(e) => {
            println!("{}Publishing '{}' failed", CROSS, spec.session_name);
            if let DriverError::Phase(failure) = &e
                && let Ok(doc) = JobDocument::load(&monitor_path)
                && let Some((item, task)) = doc.first_task_with_status(failure.phase.failed())
            {
                println!("  {} phase stopped at '{}' ({})", failure.phase, task.name, item.name);
            }
            println!(
                "See {} for details.",
                job_dir.join(config.log_file()).display()
            );
            Err(e).context(format!("Job {} failed", job_dir.display()))
        }
    }
}

/// Sessions `prune` would delete: complete ones, plus failed ones with `all`.
fn prunable(sessions: &[Session], all: bool) -> Vec<&Session> {
    sessions
        .iter()
        .filter(|s| s.is_complete() || (all && s.is_finished()))
        .collect()
}

pub fn cmd_prune(config: &BgPublishConfig, all: bool, yes: bool) -> Result<()> {
    use dialoguer::Confirm;

    let mut tree = ProgressTree::new();
    Reconciler::new(config.jobs_root()).reconcile(&mut tree)?;
    let sessions: Vec<Session> = tree.sessions().cloned().collect();
    let targets = prunable(&sessions, all);

    if targets.is_empty() {
        println!("No completed jobs to prune.");
        return Ok(());
    }

    println!("Jobs to delete:");
    for session in &targets {
        println!(
            "  {}{} {}",
            TRASH,
            session.name,
            style(session.job_folder.display()).dim()
        );
    }

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!("Delete {} job folder(s)?", targets.len()))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Prune cancelled");
            return Ok(());
        }
    }

    let mut deleted = 0;
    for session in targets {
        match std::fs::remove_dir_all(&session.job_folder) {
            Ok(()) => deleted += 1,
            Err(e) => eprintln!(
                "{}Failed to delete {}: {}",
                CROSS,
                session.job_folder.display(),
                e
            ),
        }
    }

    println!("Deleted {} job(s)", deleted);
    Ok(())
}

pub fn cmd_open_log(config: &BgPublishConfig, job: &str) -> Result<()> {
    let job_dir = resolve_job_dir(&config.jobs_root(), job)?;
    let log_file = job_dir.join(config.log_file());
    if !log_file.exists() {
        println!("No log written yet at {}", log_file.display());
    }

    println!("{}{}", FOLDER, job_dir.display());
    open::that(&job_dir).with_context(|| format!("Failed to open {}", job_dir.display()))?;
    Ok(())
}
