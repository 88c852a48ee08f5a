//! Configuration view and validation commands: `bgpublish config`.

use anyhow::Result;

use bgpublish::config::{BgPublishConfig, BgPublishToml, ENV_JOBS_ROOT, ENV_POLL_INTERVAL};

use super::super::ConfigCommands;

pub fn cmd_config(config: &BgPublishConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("bgpublish Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No bgpublish.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let toml = &config.toml;
            println!("[monitor]");
            match &toml.monitor.jobs_root {
                Some(root) => println!("  jobs_root = \"{}\"", root.display()),
                None => println!("  jobs_root = (default)"),
            }
            println!("  poll_interval_secs = {}", toml.monitor.poll_interval_secs);
            println!("  stale_after_secs = {}", toml.monitor.stale_after_secs);
            println!();
            println!("[publish]");
            println!("  shell = \"{}\"", toml.publish.shell);
            println!("  log_file = \"{}\"", toml.publish.log_file);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  jobs_root = \"{}\"", config.jobs_root().display());
            println!("  poll_interval = {}s", config.poll_interval().as_secs());
            println!();
            println!("Environment overrides: {}, {}", ENV_JOBS_ROOT, ENV_POLL_INTERVAL);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No bgpublish.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("bgpublish.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            BgPublishToml::default().save(config_path)?;

            println!("Created bgpublish.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [monitor] jobs_root, poll_interval_secs, stale_after_secs");
            println!("  - [publish] shell, log_file");
            println!();
        }
    }

    Ok(())
}
