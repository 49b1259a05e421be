//! Rendering of guest-customization (bootstrap) scripts.

use std::fs;
use std::path::Path;

use tera::{Context as TeraContext, Tera};
use tracing::debug;
use vapp_core::error::{LaunchError, Result};

use crate::spec::BootstrapConfig;

/// Reads `config.script_path` (relative paths resolve against `base_dir`) and
/// renders it as a template.
///
/// The template sees `vapp_name`, `vm_name` and the `vars` mapping, e.g.
/// `message: {{ vars.message }}`.
pub fn render_bootstrap(
    config: &BootstrapConfig,
    base_dir: &Path,
    vapp_name: &str,
    vm_name: &str,
) -> Result<String> {
    let path = if config.script_path.is_absolute() {
        config.script_path.clone()
    } else {
        base_dir.join(&config.script_path)
    };
    debug!("Rendering bootstrap script {}", path.display());

    let template = fs::read_to_string(&path).map_err(|e| {
        LaunchError::Config(format!(
            "Cannot read bootstrap script {}: {e}",
            path.display()
        ))
    })?;

    let mut context = TeraContext::new();
    context.insert("vapp_name", vapp_name);
    context.insert("vm_name", vm_name);
    context.insert("vars", &config.vars);

    Tera::one_off(&template, &context, false).map_err(|e| {
        LaunchError::Config(format!(
            "Cannot render bootstrap script {}: {}",
            path.display(),
            render_error_chain(&e)
        ))
    })
}

fn render_error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(path: &str, vars: &[(&str, &str)]) -> BootstrapConfig {
        BootstrapConfig {
            script_path: PathBuf::from(path),
            vars: vars
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
                .collect::<IndexMap<_, _>>(),
        }
    }

    #[test]
    fn renders_vars_and_names() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("preamble.sh"),
            "#!/bin/sh\nmessage: {{ vars.message }}\nhost={{ vm_name }} in {{ vapp_name }}\n",
        )
        .unwrap();

        let body = render_bootstrap(
            &config("preamble.sh", &[("message", "hello world")]),
            dir.path(),
            "web-vapp",
            "web-1",
        )
        .unwrap();

        assert!(body.contains("message: hello world"));
        assert!(body.contains("host=web-1 in web-vapp"));
    }

    #[test]
    fn missing_script_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = render_bootstrap(&config("nope.sh", &[]), dir.path(), "a", "b").unwrap_err();
        assert_eq!(err.kind(), vapp_core::ErrorKind::Config);
    }

    #[test]
    fn undefined_variable_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("s.sh"), "{{ vars.missing }}").unwrap();
        let err = render_bootstrap(&config("s.sh", &[]), dir.path(), "a", "b").unwrap_err();
        assert!(err.to_string().contains("Cannot render bootstrap script"));
    }
}
