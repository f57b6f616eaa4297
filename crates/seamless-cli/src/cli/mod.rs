//! CLI for the seamless update client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use seamless_core::config;
use seamless_core::service::Service;
use seamless_core::store::SettingKey;

use commands::{
    run_check, run_completions, run_daemon, run_man, run_reboot_completed, run_reboot_required,
    run_reset, run_set, run_status,
};

/// Top-level CLI for the seamless update client.
#[derive(Debug, Parser)]
#[command(name = "seamless")]
#[command(about = "seamless: constraint-driven background update checks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show current constraints, reboot state and pending jobs.
    Status,

    /// Change a user setting and reschedule the periodic check.
    Set {
        /// channel, network_type, battery_not_low, requires_charging or idle_reboot.
        key: SettingKey,
        /// New value. network_type accepts any|unmetered|not-roaming|wifi-only or 1-4.
        value: String,
    },

    /// Clear a stored setting back to its configured default.
    Reset {
        /// Setting to clear.
        key: SettingKey,
    },

    /// Check for updates now.
    Check,

    /// Called by the update engine once an update needs a reboot.
    RebootRequired,

    /// Called at boot after the pending reboot happened.
    RebootCompleted,

    /// Run the daemon: react to setting changes and fire due jobs until Ctrl-C.
    Run,

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Output-only commands need no config or state.
        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let service = Service::open_default(cfg).await?;

        match cli.command {
            CliCommand::Status => run_status(&service).await?,
            CliCommand::Set { key, value } => run_set(&service, key, &value).await?,
            CliCommand::Reset { key } => run_reset(&service, key).await?,
            CliCommand::Check => run_check(&service).await?,
            CliCommand::RebootRequired => run_reboot_required(&service).await?,
            CliCommand::RebootCompleted => run_reboot_completed(&service).await?,
            CliCommand::Run => run_daemon(&service).await?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
