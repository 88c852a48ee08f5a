//! Self re-arming poll loop driving reconciliation.
//!
//! The loop is not a fixed-rate timer: it runs one cycle, waits for the delay,
//! then runs the next. Only one cycle is ever in flight, so neither the
//! [`Reconciler`] nor the [`ProgressTree`] needs finer-grained locking. Cycles
//! work on a copy of the tree on the blocking pool and swap it in when done, so
//! readers never wait on document I/O.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::errors::SchedulerFailure;
use crate::monitor::reconcile::{CycleReport, Reconciler};
use crate::monitor::tree::{ProgressTree, Session};

/// Handle to a running poll loop.
pub struct Poller {
    reconciler: Arc<Mutex<Reconciler>>,
    tree: Arc<RwLock<ProgressTree>>,
    refresh: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    cycles: watch::Receiver<u64>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `jobs_root`, waiting `interval` between cycles.
    ///
    /// The first cycle starts immediately. Must be called from within a Tokio runtime.
    pub fn start(jobs_root: impl Into<PathBuf>, interval: Duration) -> Self {
        let jobs_root = jobs_root.into();
        let tree = Arc::new(RwLock::new(ProgressTree::new()));
        let reconciler = Arc::new(Mutex::new(Reconciler::new(jobs_root.clone())));
        let refresh = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (cycles_tx, cycles_rx) = watch::channel(0u64);

        tracing::info!(jobs_root = %jobs_root.display(), ?interval, "starting poll loop");

        let handle = tokio::spawn(poll_loop(
            reconciler.clone(),
            tree.clone(),
            interval,
            refresh.clone(),
            shutdown_rx,
            cycles_tx,
        ));

        Self {
            reconciler,
            tree,
            refresh,
            shutdown: shutdown_tx,
            cycles: cycles_rx,
            handle: Some(handle),
        }
    }

    /// Owned snapshot of every session, in discovery order.
    pub fn current_sessions(&self) -> Vec<Session> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions()
            .cloned()
            .collect()
    }

    /// Forget the session of `job_folder` right away, without waiting for a cycle.
    ///
    /// Waits for a cycle in flight to swap its tree in first. Returns whether
    /// the job was known.
    pub fn discard(&self, job_folder: &Path) -> bool {
        let mut reconciler = self.reconciler.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let discarded = reconciler.discard(&mut tree, job_folder);
        if discarded {
            tracing::info!(job = %job_folder.display(), "session discarded");
        }
        discarded
    }

    /// Cut the current delay short and run the next cycle now.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Receiver that changes after every completed cycle, with the cycle count.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.cycles.clone()
    }

    /// Stop the loop and wait for the cycle in flight, if any, to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "poll loop ended abnormally");
        }
        tracing::info!("poll loop stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn poll_loop(
    reconciler: Arc<Mutex<Reconciler>>,
    tree: Arc<RwLock<ProgressTree>>,
    interval: Duration,
    refresh: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    cycles: watch::Sender<u64>,
) {
    let mut count: u64 = 0;
    loop {
        match run_cycle(reconciler.clone(), tree.clone()).await {
            Ok(report) => {
                tracing::debug!(?report, "cycle complete");
                if report.has_changes() {
                    tracing::info!(
                        added = report.added.len(),
                        removed = report.removed.len(),
                        changed_tasks = report.changed_tasks,
                        "sessions updated"
                    );
                }
            }
            Err(failure) => tracing::error!(error = %failure, "reconciliation cycle failed, retrying after delay"),
        }
        count += 1;
        cycles.send_replace(count);

        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = refresh.notified() => {
                tracing::debug!("refresh requested");
            }
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

/// Run one reconciliation cycle on the blocking pool.
async fn run_cycle(
    reconciler: Arc<Mutex<Reconciler>>,
    tree: Arc<RwLock<ProgressTree>>,
) -> Result<CycleReport, SchedulerFailure> {
    let joined = tokio::task::spawn_blocking(move || {
        // Held until the swap so a discard cannot land in between.
        let mut reconciler = reconciler.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = tree.read().unwrap_or_else(PoisonError::into_inner).clone();
        let report = reconciler.reconcile(&mut working)?;
        *tree.write().unwrap_or_else(PoisonError::into_inner) = working;
        Ok::<_, anyhow::Error>(report)
    })
    .await;

    match joined {
        Ok(result) => result.map_err(SchedulerFailure::CycleFailed),
        Err(e) => Err(SchedulerFailure::WorkerPanicked(e.to_string())),
    }
}
