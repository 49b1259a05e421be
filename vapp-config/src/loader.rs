// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use serde::{Deserialize, Serialize};
use serde_yaml_ng as serde_yaml;
use tracing::debug;
use vapp_core::error::{LaunchError, Result};

// Internal imports
use crate::bootstrap::render_bootstrap;
use crate::spec::ProvisioningSpec;
use crate::validate::SpecValidator;

/// Everything one launch file asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchFile {
    pub vapps: Vec<ProvisioningSpec>,
}

/// Loads launch files: parse, render bootstrap scripts, validate.
///
/// A file is either a single vApp document or a mapping with a `vapps:`
/// list. Relative bootstrap paths resolve against the file's directory.
#[derive(Default)]
pub struct SpecLoader;

impl SpecLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_file(&self, path: &Path) -> Result<LaunchFile> {
        debug!("Loading launch file from: {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| {
            LaunchError::Config(format!("Cannot read launch file {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.load_str(&contents, &base_dir)
    }

    pub fn load_str(&self, contents: &str, base_dir: &Path) -> Result<LaunchFile> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)?;

        let mut vapps: Vec<ProvisioningSpec> = match document.get("vapps") {
            Some(list) => serde_yaml::from_value(list.clone())?,
            None => vec![serde_yaml::from_value(document)?],
        };

        if vapps.is_empty() {
            return Err(LaunchError::Config(
                "Launch file does not declare any vApps".to_string(),
            ));
        }

        let validator = SpecValidator::new()?;
        for spec in &mut vapps {
            resolve_bootstrap(spec, base_dir)?;
            validator.validate(spec)?;
        }

        Ok(LaunchFile { vapps })
    }
}

/// Replaces each VM's `bootstrap` section with the rendered script body.
fn resolve_bootstrap(spec: &mut ProvisioningSpec, base_dir: &Path) -> Result<()> {
    for index in 0..spec.vms.len() {
        let vm_name = spec.vm_name(index);
        let vapp_name = spec.name.clone();
        let vm = &mut spec.vms[index];

        let Some(bootstrap) = vm.bootstrap.take() else {
            continue;
        };
        if vm.customization_script.is_some() {
            return Err(LaunchError::validation(
                format!("vm:{vapp_name}/{vm_name}"),
                "Set either bootstrap or customization_script, not both",
            ));
        }
        vm.customization_script = Some(render_bootstrap(&bootstrap, base_dir, &vapp_name, &vm_name)?);
    }
    Ok(())
}
