use tracing::{info, instrument};
use vapp_core::error::Result;
use vapp_provider::{PowerAction, PowerState, VappRef};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

#[instrument(skip_all, fields(vm = %target.name(), step = "power"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    if !target.power_on {
        return Ok(());
    }
    let cp = session.control_plane();
    let vm = target.vm;
    session
        .execute(OperationType::PowerOn, &vm.name, move || {
            cp.set_power_state(vm, PowerAction::PowerOn)
        })
        .await?;
    info!("Powered on");
    Ok(())
}

/// Powers off every running VM of a vApp. Returns how many were stopped.
pub async fn power_off_running(session: &Session<'_>, vapp: &VappRef) -> Result<usize> {
    let cp = session.control_plane();
    let document = session
        .request(&vapp.name, move || cp.get_vapp(vapp))
        .await?;
    let mut stopped = 0;
    for child in document
        .children
        .iter()
        .filter(|vm| vm.power_state == PowerState::PoweredOn)
    {
        let vm = child.to_ref();
        let vm = &vm;
        session
            .execute(OperationType::PowerOff, &vm.name, move || {
                cp.set_power_state(vm, PowerAction::PowerOff)
            })
            .await?;
        stopped += 1;
    }
    Ok(stopped)
}
