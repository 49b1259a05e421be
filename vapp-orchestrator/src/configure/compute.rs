use tracing::{info, instrument};
use vapp_core::error::{LaunchError, Result};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

/// Sets CPU count and memory size as two separate hardware updates.
///
/// If memory fails after CPU was applied, the VM's sizing is half-done and
/// the error says so.
#[instrument(skip_all, fields(vm = %target.name(), step = "compute"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let Some(hardware) = target.spec.hardware_config.as_ref() else {
        return Ok(());
    };
    let cp = session.control_plane();
    let vm = target.vm;
    let mut applied: Vec<String> = Vec::new();

    if let Some(cpu) = hardware.cpu {
        let mut section = session.request(&vm.name, move || cp.get_vm(vm)).await?.hardware;
        if !section.set_cpu_count(u64::from(cpu)) {
            return Err(LaunchError::validation(
                &vm.name,
                "virtual hardware section has no CPU item",
            ));
        }
        let section = &section;
        session
            .execute(OperationType::UpdateCompute, &vm.name, move || {
                cp.update_hardware_section(vm, section)
            })
            .await?;
        info!(cpu, "CPU count set");
        applied.push(format!("cpu={cpu}"));
    }

    if let Some(memory) = hardware.memory {
        let result = set_memory(session, target, memory).await;
        if let Err(err) = result {
            if applied.is_empty() {
                return Err(err);
            }
            return Err(LaunchError::PartialConfiguration {
                resource: vm.name.clone(),
                applied,
                source: Box::new(err),
            });
        }
        info!(memory_mb = memory, "Memory size set");
    }

    Ok(())
}

async fn set_memory(session: &Session<'_>, target: &VmTarget<'_>, memory: u64) -> Result<()> {
    let cp = session.control_plane();
    let vm = target.vm;
    let mut section = session.request(&vm.name, move || cp.get_vm(vm)).await?.hardware;
    if !section.set_memory_mb(memory) {
        return Err(LaunchError::validation(
            &vm.name,
            "virtual hardware section has no memory item",
        ));
    }
    let section = &section;
    session
        .execute(OperationType::UpdateCompute, &vm.name, move || {
            cp.update_hardware_section(vm, section)
        })
        .await
}
