use tracing::{info, instrument};
use vapp_core::error::{LaunchError, Result};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

#[instrument(skip_all, fields(vm = %target.name(), step = "storage_profile"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let Some(profile) = target.spec.storage_profile.as_deref() else {
        return Ok(());
    };
    if !target.vdc.storage_profiles.iter().any(|p| p == profile) {
        return Err(LaunchError::not_found(
            target.name(),
            format!(
                "storage profile {profile} is not offered by vdc {}",
                target.vdc.name
            ),
        ));
    }

    let cp = session.control_plane();
    let vm = target.vm;
    session
        .execute(OperationType::SetStorageProfile, &vm.name, move || {
            cp.set_storage_profile(vm, profile)
        })
        .await?;
    info!(profile, "Storage profile assigned");
    Ok(())
}
