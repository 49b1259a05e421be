use tracing::{info, instrument};
use vapp_core::error::Result;
use vapp_provider::GuestCustomizationSection;

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

/// Installs the customization script and computer name. The script body is
/// passed through untouched.
#[instrument(skip_all, fields(vm = %target.name(), step = "guest_customization"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let section = GuestCustomizationSection {
        enabled: true,
        computer_name: target
            .spec
            .computer_name
            .clone()
            .unwrap_or_else(|| target.name().to_string()),
        customization_script: target.spec.customization_script.clone(),
    };

    let cp = session.control_plane();
    let vm = target.vm;
    let section = &section;
    session
        .execute(OperationType::SetGuestCustomization, &vm.name, move || {
            cp.set_guest_customization(vm, section)
        })
        .await?;
    info!(
        computer_name = %section.computer_name,
        script = section.customization_script.is_some(),
        "Guest customization set"
    );
    Ok(())
}
