use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vapp_config::{RunOptions, SpecLoader};
use vapp_core::{launch_println, launch_progress, launch_warning};
use vapp_orchestrator::Launcher;
use vapp_provider::simulator::{SimulatedControlPlane, SimulatedWorld};
use vapp_provider::ControlPlane;

use crate::render;

/// Launches every vApp of the file against a simulated control plane seeded
/// from `world`. Ctrl-C cancels the current run, which then cleans up.
pub async fn handle_launch(
    file: &Path,
    world: &Path,
    options: RunOptions,
    json: bool,
) -> Result<()> {
    let launch = SpecLoader::new()
        .load_file(file)
        .with_context(|| format!("Launch file {} is invalid", file.display()))?;
    let world = SimulatedWorld::load(world)
        .with_context(|| format!("World file {} is invalid", world.display()))?;

    let control_plane: Arc<dyn ControlPlane> = Arc::new(SimulatedControlPlane::new(world));
    info!(
        control_plane = control_plane.name(),
        vapps = launch.vapps.len(),
        "Starting launch"
    );
    let launcher = Launcher::new(control_plane, options);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling launch");
            on_interrupt.cancel();
        }
    });

    let spinner = if json {
        ProgressBar::hidden()
    } else {
        launch_progress!("Launching {} vApp(s) from {}", launch.vapps.len(), file.display());
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("waiting on control-plane tasks");
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    };

    let report = launcher.run_all(&launch.vapps, &cancel).await;
    spinner.finish_and_clear();

    if json {
        launch_println!("{}", serde_json::to_string_pretty(&render::report_json(&report))?);
    } else {
        render::print_report(&report);
    }

    if cancel.is_cancelled() {
        launch_warning!("Launch was interrupted");
    }
    if !report.is_success() {
        let failed = report.failures().count();
        bail!("{failed} of {} vApp(s) failed to launch", report.entries.len());
    }
    Ok(())
}
