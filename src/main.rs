use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

use bgpublish::config::BgPublishConfig;
use bgpublish::logging;

mod cmd;

#[derive(Parser)]
#[command(name = "bgpublish")]
#[command(version, about = "Run publish jobs in the background and monitor their progress")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to bgpublish.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding one folder per job. Overrides the config file and BGPUBLISH_JOBS_ROOT.
    #[arg(long, global = true)]
    pub jobs_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a job folder from a job description
    Submit {
        /// Path to the job description (YAML)
        job_file: PathBuf,

        /// Start publishing in a detached background process
        #[arg(long)]
        start: bool,
    },
    /// Publish then finalize a job, recording progress in its monitor document
    Run {
        /// Job folder path or name under the jobs root
        job: String,
    },
    /// Follow every job under the jobs root until Ctrl-C
    Watch {
        /// Seconds between two polls
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show the current state of every job
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// List tasks under each job
        #[arg(long)]
        tasks: bool,
    },
    /// Delete completed job folders
    Prune {
        /// Also delete failed jobs
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Open the folder holding a job's log
    OpenLog {
        /// Job folder path or name under the jobs root
        job: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default bgpublish.toml file
    Init,
}

impl Commands {
    /// Console log level when neither `--verbose` nor `RUST_LOG` says otherwise.
    fn default_log_level(&self) -> LevelFilter {
        match self {
            Commands::Run { .. } | Commands::Submit { .. } => LevelFilter::INFO,
            _ => LevelFilter::WARN,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let interval = match &cli.command {
        Commands::Watch { interval } => *interval,
        _ => None,
    };
    let config =
        BgPublishConfig::with_cli_args(cli.config.clone(), cli.verbose, cli.jobs_root.clone(), interval)?;

    let job_log = match &cli.command {
        Commands::Run { job } => Some(cmd::job_log_path(&config, job)?),
        _ => None,
    };
    let level = logging::console_level(cli.verbose, cli.command.default_log_level());
    let _log_guard = logging::init(level, job_log.as_deref())?;

    match &cli.command {
        Commands::Submit { job_file, start } => cmd::cmd_submit(&config, job_file, *start)?,
        Commands::Run { job } => cmd::cmd_run(&config, job).await?,
        Commands::Watch { .. } => cmd::cmd_watch(&config).await?,
        Commands::Status { json, tasks } => cmd::cmd_status(&config, *json, *tasks)?,
        Commands::Prune { all, yes } => cmd::cmd_prune(&config, *all, *yes)?,
        Commands::OpenLog { job } => cmd::cmd_open_log(&config, job)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
