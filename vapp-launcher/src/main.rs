// External crates
use clap::Parser;
use tracing::debug;

// Internal imports
use vapp_core::launch_error;
use vapp_logging::LogSettings;

// Local modules
mod cli;
mod commands;
mod render;

use cli::Args;
use commands::execute_command;

/// Console logging stays quiet unless asked for; the launch summary is the
/// primary output.
fn log_settings(debug: bool) -> LogSettings {
    let mut settings = LogSettings::from_env();
    if debug {
        settings.level = "debug".to_string();
    } else if std::env::var("LOG_LEVEL").is_err() {
        settings.level = "warn".to_string();
    }
    settings
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let log_guard = vapp_logging::init_with(log_settings(args.debug));
    debug!(command = ?args.command, "Starting vapp-launch");

    let result = execute_command(args).await;
    drop(log_guard);

    if let Err(e) = result {
        launch_error!("{:#}", e);
        std::process::exit(1);
    }
}
