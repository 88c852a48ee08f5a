//! Live terminal view of the monitored sessions.

use crate::monitor::Session;
use crate::status::Status;
use crate::ui::icons::{CHECK, CROSS, RUNNING, STALE, WAITING, WARNING};
use chrono::{DateTime, Utc};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Coarse state of a session, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Waiting,
    Running,
    /// A task reported a warning
    Warning,
    /// Unfinished and the document has not changed for a while
    Stale,
    Failed(Status),
    Complete,
}

impl SessionState {
    pub fn of(session: &Session, now: DateTime<Utc>, stale_after: chrono::Duration) -> Self {
        if let Some(failure) = session.failure() {
            return SessionState::Failed(failure);
        }
        if session.is_complete() {
            return SessionState::Complete;
        }
        if session.tasks().any(|t| t.status == Status::Warning) {
            return SessionState::Warning;
        }
        if session.is_stale(now, stale_after) {
            return SessionState::Stale;
        }
        if session.tasks().all(|t| t.status == Status::WaitingToStart) {
            SessionState::Waiting
        } else {
            SessionState::Running
        }
    }

    pub fn label(self) -> String {
        match self {
            SessionState::Waiting => "waiting".to_string(),
            SessionState::Running => "running".to_string(),
            SessionState::Warning => "warning".to_string(),
            SessionState::Stale => "stale".to_string(),
            SessionState::Failed(status) => status.to_string(),
            SessionState::Complete => "complete".to_string(),
        }
    }

    pub fn icon(self) -> &'static Emoji<'static, 'static> {
        match self {
            SessionState::Waiting => &WAITING,
            SessionState::Running => &RUNNING,
            SessionState::Warning => &WARNING,
            SessionState::Stale => &STALE,
            SessionState::Failed(_) => &CROSS,
            SessionState::Complete => &CHECK,
        }
    }
}

/// One-line summary of what a session is doing.
pub fn session_message(session: &Session, state: SessionState) -> String {
    let done = session
        .tasks()
        .filter(|t| t.status == Status::FinalizeDone)
        .count();
    let counts = format!("{}/{} tasks", done, session.task_count());

    let detail = match state {
        SessionState::Failed(status) => session
            .tasks()
            .find(|t| t.status == status)
            .map(|t| format!("{} on '{}'", style(status).red(), t.name)),
        SessionState::Running => session
            .tasks()
            .find(|t| t.status.is_running())
            .map(|t| format!("{} '{}'", style(t.status).cyan(), t.name)),
        SessionState::Stale => Some(style("no update for a while").yellow().to_string()),
        SessionState::Warning => Some(style(state.label()).yellow().to_string()),
        SessionState::Complete => Some(style(state.label()).green().to_string()),
        SessionState::Waiting => Some(style(state.label()).dim().to_string()),
    };

    match detail {
        Some(detail) => format!("{}{} {}", state.icon(), detail, style(counts).dim()),
        None => format!("{}{} {}", state.icon(), state.label(), style(counts).dim()),
    }
}

/// Live terminal view of every session under a jobs root.
///
/// A summary line on top, then one bar per session keyed by job folder. Bars
/// are added when a session appears and removed when its folder is deleted.
pub struct MonitorUI {
    multi: MultiProgress,
    summary: ProgressBar,
    bars: HashMap<PathBuf, ProgressBar>,
    stale_after: chrono::Duration,
}

impl MonitorUI {
    pub fn new(stale_after: chrono::Duration) -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr(), stale_after)
    }

    pub fn with_draw_target(target: ProgressDrawTarget, stale_after: chrono::Duration) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let summary_style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("progress bar template is a valid static string");
        let summary = multi.add(ProgressBar::new_spinner());
        summary.set_style(summary_style);
        summary.set_message("Looking for publish jobs...");

        Self {
            multi,
            summary,
            bars: HashMap::new(),
            stale_after,
        }
    }

    fn session_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:32.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓░")
    }

    /// Bring the view in line with `sessions`.
    pub fn render(&mut self, sessions: &[Session], now: DateTime<Utc>) {
        self.bars.retain(|folder, bar| {
            let keep = sessions.iter().any(|s| &s.job_folder == folder);
            if !keep {
                bar.finish_and_clear();
                self.multi.remove(bar);
            }
            keep
        });

        let mut running = 0;
        let mut failed = 0;
        for session in sessions {
            let bar = self
                .bars
                .entry(session.job_folder.clone())
                .or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(100));
                    bar.set_style(Self::session_style());
                    bar
                });

            let state = SessionState::of(session, now, self.stale_after);
            match state {
                SessionState::Running => running += 1,
                SessionState::Failed(_) => failed += 1,
                _ => {}
            }

            bar.set_prefix(session.name.clone());
            bar.set_position(u64::from(session.progress()));
            bar.set_message(session_message(session, state));
        }

        self.summary.set_message(format!(
            "{} job(s), {} running, {} failed {}",
            style(sessions.len()).bold(),
            style(running).cyan(),
            if failed > 0 {
                style(failed).red()
            } else {
                style(failed).dim()
            },
            style("(Ctrl-C to quit)").dim()
        ));
        self.summary.tick();
    }

    pub fn bar(&self, job_folder: &Path) -> Option<&ProgressBar> {
        self.bars.get(job_folder)
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Leave the last rendered state on screen.
    pub fn finish(self) {
        for bar in self.bars.values() {
            bar.abandon();
        }
        self.summary.finish();
    }
}
