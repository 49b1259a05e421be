// CLI argument parsing and definitions

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use vapp_config::RunOptions;

const MAX_TASK_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Parser)]
#[command(name = "vapp-launch")]
#[command(about = "Provision vApps described in a launch file")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load, render and validate a launch file, then print the plan
    Validate {
        /// Launch file (YAML)
        file: PathBuf,
    },
    /// Launch every vApp in a launch file
    Launch {
        /// Launch file (YAML)
        file: PathBuf,

        /// World description for the simulated control plane
        #[arg(long)]
        world: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Leave VMs powered off after configuration
    #[arg(long)]
    pub dont_power_on: bool,

    /// Keep partially created vApps when a launch fails
    #[arg(long)]
    pub retain_on_failure: bool,

    /// Keep launching the remaining vApps after one fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Seconds to wait for a single control-plane task (at most a week)
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TASK_TIMEOUT_SECS)
    )]
    pub task_timeout: u64,

    /// Milliseconds between task status polls
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub poll_interval: u64,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions::default()
            .with_power_on(!self.dont_power_on)
            .with_retain_on_failure(self.retain_on_failure)
            .with_continue_on_error(self.continue_on_error)
            .with_task_timeout(Duration::from_secs(self.task_timeout))
            .with_poll_interval(Duration::from_millis(self.poll_interval))
    }
}
