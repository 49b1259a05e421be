use tracing::{info, instrument};
use vapp_core::error::{LaunchError, Result};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

/// Appends the declared disks in order, one hardware update per disk, then
/// reads the section back to confirm every disk landed where expected.
#[instrument(skip_all, fields(vm = %target.name(), step = "disks"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let cp = session.control_plane();
    let vm = target.vm;
    let base_count = session
        .request(&vm.name, move || cp.get_vm(vm))
        .await?
        .hardware
        .disks()
        .len();

    for (position, disk) in target.spec.extra_disks.iter().enumerate() {
        let mut section = session
            .request(&vm.name, move || cp.get_vm(vm))
            .await?
            .hardware;
        let instance_id = section.add_disk(disk.name.as_deref(), disk.size);
        let section = &section;
        let resource = format!("{}/disk{}", vm.name, position + 1);
        session
            .execute(OperationType::AddDisk, &resource, move || {
                cp.update_hardware_section(vm, section)
            })
            .await?;
        info!(instance_id, size_mb = disk.size, "Disk added");
    }

    let disks = session
        .request(&vm.name, move || cp.get_vm(vm))
        .await?
        .hardware
        .disks();
    let added = disks.get(base_count..).unwrap_or_default();
    let matches = added.len() == target.spec.extra_disks.len()
        && added
            .iter()
            .zip(&target.spec.extra_disks)
            .all(|(actual, wanted)| {
                actual.size_mb == wanted.size
                    && wanted.name.as_deref().is_none_or(|name| name == actual.name)
            });
    if !matches {
        return Err(LaunchError::remote(
            &vm.name,
            format!(
                "expected {} added disks, control plane reports {}",
                target.spec.extra_disks.len(),
                added.len()
            ),
        ));
    }
    Ok(())
}
