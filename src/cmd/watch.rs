//! Monitoring commands: the live `watch` view and one-shot `status`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

use bgpublish::config::BgPublishConfig;
use bgpublish::monitor::{Poller, ProgressTree, Reconciler, Session};
use bgpublish::ui::{MonitorUI, SessionState};

pub async fn cmd_watch(config: &BgPublishConfig) -> Result<()> {
    let poller = Poller::start(config.jobs_root(), config.poll_interval());
    let mut ui = MonitorUI::new(config.stale_after());
    let mut updates = poller.updates();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                ui.render(&poller.current_sessions(), Utc::now());
            }
            _ = &mut ctrl_c => break,
        }
    }

    ui.finish();
    poller.stop().await;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SessionView {
    id: String,
    name: String,
    job_folder: PathBuf,
    progress: u8,
    state: String,
    last_modified: Option<DateTime<Utc>>,
    log_file: PathBuf,
    tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
struct TaskView {
    id: String,
    name: String,
    item: Option<String>,
    status: String,
    code: u8,
    description: &'static str,
}

impl SessionView {
    fn new(session: &Session, state: SessionState, log_file: &str) -> Self {
        Self {
            id: session.id.to_string(),
            name: session.name.clone(),
            job_folder: session.job_folder.clone(),
            progress: session.progress(),
            state: state.label(),
            last_modified: session.last_modified,
            log_file: session.log_file(log_file),
            tasks: session
                .items
                .iter()
                .flat_map(|item| {
                    item.tasks.iter().map(move |task| TaskView {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        item: (!item.is_root()).then(|| item.name.clone()),
                        status: task.status.to_string(),
                        code: task.status.into(),
                        description: task.status.description(),
                    })
                })
                .collect(),
        }
    }
}

pub fn cmd_status(config: &BgPublishConfig, json: bool, show_tasks: bool) -> Result<()> {
    let jobs_root = config.jobs_root();
    let mut tree = ProgressTree::new();
    let report = Reconciler::new(&jobs_root).reconcile(&mut tree)?;
    let now = Utc::now();
    let stale_after = config.stale_after();

    if json {
        let views: Vec<SessionView> = tree
            .sessions()
            .map(|s| SessionView::new(s, SessionState::of(s, now, stale_after), config.log_file()))
            .collect();
        let out = serde_json::to_string_pretty(&views).context("Failed to serialize status")?;
        println!("{}", out);
        return Ok(());
    }

    if tree.is_empty() {
        println!("No publish jobs in {}", jobs_root.display());
    }

    for session in tree.sessions() {
        let state = SessionState::of(session, now, stale_after);
        let folder = session
            .job_folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        println!(
            "{}{:<32} {:>3}%  {:<16} {}",
            state.icon(),
            session.name,
            session.progress(),
            state.label(),
            style(folder).dim()
        );
        if matches!(state, SessionState::Failed(_)) {
            println!(
                "      see {}",
                style(session.log_file(config.log_file()).display()).dim()
            );
        }

        if show_tasks {
            for task in session.tasks() {
                println!(
                    "      {:<16} {}  {}",
                    task.status.to_string(),
                    task.name,
                    style(task.status.description()).dim()
                );
            }
        }
    }

    for skipped in &report.skipped {
        eprintln!(
            "{} could not read {}",
            style("warning:").yellow(),
            skipped.display()
        );
    }
    Ok(())
}
