// Command handlers

use anyhow::Result;
use tracing::debug;

use crate::cli::{Args, Command};

pub mod launch;
pub mod validate;

/// Main command dispatcher
pub async fn execute_command(args: Args) -> Result<()> {
    match args.command {
        Command::Validate { file } => {
            debug!("Handling validate command");
            validate::handle_validate(&file, args.json)
        }
        Command::Launch { file, world, run } => {
            debug!("Handling launch command");
            launch::handle_launch(&file, &world, run.options(), args.json).await
        }
    }
}
