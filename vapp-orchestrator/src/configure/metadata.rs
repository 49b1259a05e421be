use tracing::{debug, info, instrument, warn};
use vapp_core::error::{ErrorKind, KeyFailure, LaunchError, Result};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

/// Writes every key as its own entry. A failed key does not stop the others;
/// all failures come back together once every key has been tried.
#[instrument(skip_all, fields(vm = %target.name(), step = "metadata"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let cp = session.control_plane();
    let vm = target.vm;
    let mut applied = Vec::new();
    let mut failures = Vec::new();

    for (key, value) in &target.spec.metadata {
        let resource = format!("{}/{}", vm.name, key);
        let key = key.as_str();
        let result = session
            .execute(OperationType::AddMetadata, &resource, move || {
                cp.add_metadata(vm, key, value)
            })
            .await;
        match result {
            Ok(()) => {
                debug!(key, value_type = value.type_name(), "Metadata written");
                applied.push(key.to_string());
            }
            Err(err) if err.kind() == ErrorKind::Cancelled => return Err(err),
            Err(err) => {
                warn!(key, error = %err, "Metadata key failed");
                failures.push(KeyFailure {
                    key: key.to_string(),
                    error: err,
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(LaunchError::MetadataKeys {
            resource: vm.name.clone(),
            applied,
            failures,
        });
    }
    info!(keys = applied.len(), "Metadata written");
    Ok(())
}
