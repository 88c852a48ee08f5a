//! Configuration for bgpublish.
//!
//! Settings are layered: `bgpublish.toml` → environment → CLI flags, later
//! layers winning. Every key is optional; a missing file means defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [monitor]
//! jobs_root = "/mnt/cache/bgpublish/jobs"
//! poll_interval_secs = 3
//! stale_after_secs = 600
//!
//! [publish]
//! shell = "sh"
//! log_file = "bg_publish.log"
//! ```
//!
//! | Environment variable       | Overrides                     |
//! |----------------------------|-------------------------------|
//! | `BGPUBLISH_JOBS_ROOT`      | `monitor.jobs_root`           |
//! | `BGPUBLISH_POLL_INTERVAL`  | `monitor.poll_interval_secs`  |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration file.
pub const CONFIG_FILE: &str = "bgpublish.toml";

pub const ENV_JOBS_ROOT: &str = "BGPUBLISH_JOBS_ROOT";
pub const ENV_POLL_INTERVAL: &str = "BGPUBLISH_POLL_INTERVAL";

/// Settings for monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Directory holding one folder per job (default: user cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_root: Option<PathBuf>,
    /// Delay between two reconciliation cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Sessions whose document has not changed for this long are shown as stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_stale_after_secs() -> u64 {
    600
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            jobs_root: None,
            poll_interval_secs: default_poll_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

/// Settings for the publishing process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSection {
    /// Shell used to run task commands (invoked as `<shell> -c <command>`)
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Log file written inside each job folder
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_log_file() -> String {
    "bg_publish.log".to_string()
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            log_file: default_log_file(),
        }
    }
}

/// The complete bgpublish.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BgPublishToml {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub publish: PublishSection,
}

impl BgPublishToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse bgpublish.toml")
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize bgpublish.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Jobs root (env → file → default).
    pub fn jobs_root(&self) -> PathBuf {
        std::env::var_os(ENV_JOBS_ROOT)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.monitor.jobs_root.clone())
            .unwrap_or_else(default_jobs_root)
    }

    /// Poll interval in seconds (env → file).
    ///
    /// An unparsable environment value is ignored.
    pub fn poll_interval_secs(&self) -> u64 {
        std::env::var(ENV_POLL_INTERVAL)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.monitor.poll_interval_secs)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.monitor.poll_interval_secs == 0 {
            warnings.push("poll_interval_secs is 0: monitors will poll continuously".to_string());
        }
        if self.monitor.stale_after_secs <= self.monitor.poll_interval_secs {
            warnings.push(format!(
                "stale_after_secs ({}) should be larger than poll_interval_secs ({})",
                self.monitor.stale_after_secs, self.monitor.poll_interval_secs
            ));
        }
        if let Some(root) = &self.monitor.jobs_root
            && root.is_relative()
        {
            warnings.push(format!(
                "jobs_root '{}' is relative and depends on the working directory",
                root.display()
            ));
        }
        if self.publish.shell.trim().is_empty() {
            warnings.push("publish.shell is empty".to_string());
        }
        if self.publish.log_file.trim().is_empty()
            || Path::new(&self.publish.log_file).components().count() != 1
        {
            warnings.push(format!(
                "publish.log_file '{}' should be a plain file name",
                self.publish.log_file
            ));
        }

        warnings
    }
}

/// Default jobs root: `<user cache dir>/bgpublish/jobs`.
pub fn default_jobs_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("bgpublish")
        .join("jobs")
}

/// Default configuration file: `<user config dir>/bgpublish/bgpublish.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("bgpublish")
        .join(CONFIG_FILE)
}

/// Resolved configuration: the file plus environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct BgPublishConfig {
    /// Where the file was (or would be) loaded from
    pub config_path: PathBuf,
    pub toml: BgPublishToml,
    pub verbose: bool,
    pub cli_jobs_root: Option<PathBuf>,
    pub cli_poll_interval_secs: Option<u64>,
}

impl BgPublishConfig {
    /// Load the configuration at `config_path`, falling back to defaults.
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let toml = BgPublishToml::load_or_default(&config_path)?;
        Ok(Self {
            config_path,
            toml,
            verbose: false,
            cli_jobs_root: None,
            cli_poll_interval_secs: None,
        })
    }

    /// Load the configuration and apply CLI overrides.
    pub fn with_cli_args(
        config_path: Option<PathBuf>,
        verbose: bool,
        jobs_root: Option<PathBuf>,
        poll_interval_secs: Option<u64>,
    ) -> Result<Self> {
        let mut config = Self::new(config_path.unwrap_or_else(default_config_path))?;
        config.verbose = verbose;
        config.cli_jobs_root = jobs_root;
        config.cli_poll_interval_secs = poll_interval_secs;
        Ok(config)
    }

    /// Jobs root (CLI → env → file → default).
    pub fn jobs_root(&self) -> PathBuf {
        self.cli_jobs_root
            .clone()
            .unwrap_or_else(|| self.toml.jobs_root())
    }

    /// Delay between reconciliation cycles (CLI → env → file).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.cli_poll_interval_secs
                .unwrap_or_else(|| self.toml.poll_interval_secs()),
        )
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.toml.monitor.stale_after_secs.min(i64::MAX as u64) as i64)
    }

    pub fn shell(&self) -> &str {
        &self.toml.publish.shell
    }

    pub fn log_file(&self) -> &str {
        &self.toml.publish.log_file
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
