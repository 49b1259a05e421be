use std::path::Path;

use anyhow::{Context, Result};
use vapp_config::SpecLoader;
use vapp_core::{launch_println, launch_success};

use crate::render;

/// Loads, renders and validates a launch file without touching any
/// control plane.
pub fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let launch = SpecLoader::new()
        .load_file(file)
        .with_context(|| format!("Launch file {} is invalid", file.display()))?;

    if json {
        launch_println!("{}", serde_json::to_string_pretty(&launch)?);
        return Ok(());
    }

    for spec in &launch.vapps {
        for line in render::plan(spec) {
            launch_println!("{}", line);
        }
        launch_println!();
    }
    launch_success!(
        "{} is valid ({} vApp{})",
        file.display(),
        launch.vapps.len(),
        if launch.vapps.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
