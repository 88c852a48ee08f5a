//! Integration tests for bgpublish
//!
//! These drive the binary end to end: submitting jobs, publishing them and
//! reading their progress back through the monitor commands.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a bgpublish Command isolated inside `dir`
fn bgpublish(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("bgpublish");
    cmd.env_remove("BGPUBLISH_JOBS_ROOT")
        .env_remove("BGPUBLISH_POLL_INTERVAL")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.path().join("bgpublish.toml"))
        .arg("--jobs-root")
        .arg(jobs_root(dir));
    cmd
}

fn jobs_root(dir: &TempDir) -> PathBuf {
    dir.path().join("jobs")
}

/// Write a two-task job description whose geometry task runs `geo_publish`
fn write_job(dir: &TempDir, geo_publish: &str) -> PathBuf {
    let content = format!(
        r#"
session_name: shot_010_lighting.ma
items:
  - is_parent_root: true
    name: Session
    tasks:
      - uuid: t-save
        name: Save session
        publish: "touch saved.txt"
        finalize: "true"
  - uuid: item-geo
    name: geometry.abc
    tasks:
      - uuid: t-geo
        name: Publish geometry
        publish: "{geo_publish}"
        finalize: "echo finalized"
"#
    );
    let path = dir.path().join("job.yml");
    fs::write(&path, content).unwrap();
    path
}

fn job_folders(dir: &TempDir) -> Vec<PathBuf> {
    match fs::read_dir(jobs_root(dir)) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Submit a job and return its folder
fn submit(dir: &TempDir, geo_publish: &str) -> PathBuf {
    let before = job_folders(dir);
    let job_file = write_job(dir, geo_publish);
    bgpublish(dir)
        .arg("submit")
        .arg(&job_file)
        .assert()
        .success();

    job_folders(dir)
        .into_iter()
        .find(|f| !before.contains(f))
        .unwrap()
}

fn status_json(dir: &TempDir) -> serde_json::Value {
    let output = bgpublish(dir).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn job_status<'a>(status: &'a serde_json::Value, folder: &Path) -> &'a serde_json::Value {
    status
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["job_folder"].as_str() == folder.to_str())
        .unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_bgpublish_help() {
        cargo_bin_cmd!("bgpublish")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("submit"))
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("prune"));
    }

    #[test]
    fn test_bgpublish_version() {
        cargo_bin_cmd!("bgpublish").arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        cargo_bin_cmd!("bgpublish").arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Submitting jobs
// =============================================================================

mod submit {
    use super::*;

    #[test]
    fn test_submit_creates_job_folder() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "true");

        assert!(folder.join("job.yml").exists());
        assert!(folder.join("monitor.yml").exists());

        let monitor = fs::read_to_string(folder.join("monitor.yml")).unwrap();
        assert!(monitor.contains("session_name: shot_010_lighting.ma"));
        assert!(monitor.contains("status: 0"));
    }

    #[test]
    fn test_submitted_job_is_waiting() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "true");

        let status = status_json(&dir);
        let job = job_status(&status, &folder);
        assert_eq!(job["progress"], 0);
        assert_eq!(job["state"], "waiting");
        assert_eq!(job["tasks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_submit_rejects_job_without_active_tasks() {
        let dir = TempDir::new().unwrap();
        let job_file = dir.path().join("empty.yml");
        fs::write(&job_file, "session_name: empty.ma\nitems: []\n").unwrap();

        bgpublish(&dir)
            .arg("submit")
            .arg(&job_file)
            .assert()
            .failure()
            .stderr(predicate::str::contains("has no active tasks"));
    }

    #[test]
    fn test_submit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        bgpublish(&dir)
            .args(["submit", "does-not-exist.yml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read job file"));
    }
}

// =============================================================================
// Running jobs
// =============================================================================

mod run {
    use super::*;

    #[test]
    fn test_run_completes_job() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "touch geometry.abc");

        bgpublish(&dir)
            .arg("run")
            .arg(&folder)
            .assert()
            .success()
            .stdout(predicate::str::contains("Published 'shot_010_lighting.ma'"));

        // Commands run inside the job folder
        assert!(folder.join("saved.txt").exists());
        assert!(folder.join("geometry.abc").exists());

        let status = status_json(&dir);
        let job = job_status(&status, &folder);
        assert_eq!(job["progress"], 100);
        assert_eq!(job["state"], "complete");
        assert!(
            job["tasks"]
                .as_array()
                .unwrap()
                .iter()
                .all(|t| t["code"] == 5)
        );
    }

    #[test]
    fn test_run_by_folder_name() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "true");
        let name = folder.file_name().unwrap().to_str().unwrap();

        bgpublish(&dir).args(["run", name]).assert().success();
    }

    #[test]
    fn test_run_writes_log_file() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "echo geometry-written");

        bgpublish(&dir).arg("run").arg(&folder).assert().success();

        let log = fs::read_to_string(folder.join("bg_publish.log")).unwrap();
        assert!(log.contains("geometry-written"));
        assert!(log.contains("publish complete"));
    }

    #[test]
    fn test_failed_publish_stops_job() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "exit 4");

        bgpublish(&dir)
            .arg("run")
            .arg(&folder)
            .assert()
            .failure()
            .stdout(predicate::str::contains("failed"))
            .stderr(predicate::str::contains("publish phase failed on task t-geo"));

        let status = status_json(&dir);
        let job = job_status(&status, &folder);
        // Save session published (1 of 4 units), geometry failed
        assert_eq!(job["progress"], 25);
        assert_eq!(job["state"], "publish failed");

        let tasks = job["tasks"].as_array().unwrap();
        let geo = tasks.iter().find(|t| t["id"] == "t-geo").unwrap();
        assert_eq!(geo["code"], 3);
        assert_eq!(geo["description"], "The publish step has failed");

        let save = tasks.iter().find(|t| t["id"] == "t-save").unwrap();
        assert_eq!(save["code"], 2);
    }

    #[test]
    fn test_run_unknown_job_fails() {
        let dir = TempDir::new().unwrap();
        bgpublish(&dir)
            .args(["run", "no-such-job"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No job found"));
    }
}

// =============================================================================
// Status
// =============================================================================

mod status {
    use super::*;

    #[test]
    fn test_status_empty_jobs_root() {
        let dir = TempDir::new().unwrap();
        bgpublish(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No publish jobs in"));
    }

    #[test]
    fn test_status_json_empty_is_array() {
        let dir = TempDir::new().unwrap();
        let status = status_json(&dir);
        assert_eq!(status, serde_json::json!([]));
    }

    #[test]
    fn test_status_lists_tasks() {
        let dir = TempDir::new().unwrap();
        submit(&dir, "true");

        bgpublish(&dir)
            .args(["status", "--tasks"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shot_010_lighting.ma"))
            .stdout(predicate::str::contains("Publish geometry"))
            .stdout(predicate::str::contains("The publish job is waiting to start"));
    }

    #[test]
    fn test_status_points_failed_jobs_at_their_log() {
        let dir = TempDir::new().unwrap();
        let folder = submit(&dir, "exit 2");
        bgpublish(&dir).arg("run").arg(&folder).assert().failure();

        let log_file = folder.join("bg_publish.log");
        bgpublish(&dir)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("see {}", log_file.display())));

        let status = status_json(&dir);
        let job = job_status(&status, &folder);
        assert_eq!(job["log_file"], log_file.to_string_lossy().as_ref());
    }

    #[test]
    fn test_status_skips_unreadable_documents() {
        let dir = TempDir::new().unwrap();
        submit(&dir, "true");
        let broken = jobs_root(&dir).join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("monitor.yml"), "items: [[[").unwrap();

        let status = status_json(&dir);
        assert_eq!(status.as_array().unwrap().len(), 1);
    }
}

// =============================================================================
// Pruning
// =============================================================================

mod prune {
    use super::*;

    #[test]
    fn test_prune_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        submit(&dir, "true");

        bgpublish(&dir)
            .args(["prune", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No completed jobs to prune."));
    }

    #[test]
    fn test_prune_removes_completed_jobs_only() {
        let dir = TempDir::new().unwrap();
        let done = submit(&dir, "true");
        bgpublish(&dir).arg("run").arg(&done).assert().success();
        let failed = submit(&dir, "false");
        bgpublish(&dir).arg("run").arg(&failed).assert().failure();
        let waiting = submit(&dir, "true");

        bgpublish(&dir)
            .args(["prune", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted 1 job(s)"));

        assert!(!done.exists());
        assert!(failed.exists());
        assert!(waiting.exists());

        bgpublish(&dir)
            .args(["prune", "--all", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted 1 job(s)"));

        assert!(!failed.exists());
        assert!(waiting.exists());
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        bgpublish(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration."))
            .stdout(predicate::str::contains("poll_interval_secs = 3"))
            .stdout(predicate::str::contains("shell = \"sh\""));
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();

        bgpublish(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created bgpublish.toml"));
        assert!(dir.path().join("bgpublish.toml").exists());

        bgpublish(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));

        bgpublish(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bgpublish.toml"),
            "[monitor]\npoll_interval_secs = 0\n",
        )
        .unwrap();

        bgpublish(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings:"))
            .stdout(predicate::str::contains("poll_interval_secs is 0"));
    }

    #[test]
    fn test_invalid_config_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bgpublish.toml"), "[monitor\n").unwrap();

        bgpublish(&dir)
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse bgpublish.toml"));
    }

    #[test]
    fn test_jobs_root_from_environment() {
        let dir = TempDir::new().unwrap();
        let env_root = dir.path().join("env-jobs");

        cargo_bin_cmd!("bgpublish")
            .env("BGPUBLISH_JOBS_ROOT", &env_root)
            .arg("--config")
            .arg(dir.path().join("bgpublish.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(env_root.to_str().unwrap()));
    }

    #[test]
    fn test_shell_from_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bgpublish.toml"),
            "[publish]\nshell = \"/bin/sh\"\nlog_file = \"publish.log\"\n",
        )
        .unwrap();
        let folder = submit(&dir, "true");

        bgpublish(&dir).arg("run").arg(&folder).assert().success();
        assert!(folder.join("publish.log").exists());
        assert!(!folder.join("bg_publish.log").exists());
    }
}
