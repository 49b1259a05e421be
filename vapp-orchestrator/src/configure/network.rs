use tracing::{info, instrument};
use vapp_config::IpAllocationMode;
use vapp_core::error::{LaunchError, Result};
use vapp_provider::{NetworkConnection, NetworkConnectionSection};

use super::VmTarget;
use crate::journal::OperationType;
use crate::session::Session;

/// Replaces the VM's network connection section with the declared
/// interfaces. Every network must already be part of the vApp.
#[instrument(skip_all, fields(vm = %target.name(), step = "network"))]
pub(super) async fn configure(session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
    let cp = session.control_plane();
    let vm = target.vm;
    let vapp = target.vapp;

    let document = session
        .request(&vapp.name, move || cp.get_vapp(vapp))
        .await?;
    if let Some(missing) = target
        .spec
        .network_connections
        .iter()
        .find(|nic| !document.has_network(&nic.name))
    {
        return Err(LaunchError::validation(
            &vm.name,
            format!(
                "network {} is not in vApp {}'s network section",
                missing.name, vapp.name
            ),
        ));
    }

    let section = connection_section(target);
    let section = &section;
    session
        .execute(OperationType::UpdateNetwork, &vm.name, move || {
            cp.update_network_section(vm, section)
        })
        .await?;
    info!(
        connections = section.connections.len(),
        primary = ?section.primary_network_connection_index,
        "Network connections set"
    );
    Ok(())
}

fn connection_section(target: &VmTarget<'_>) -> NetworkConnectionSection {
    let connections = target
        .spec
        .interfaces_by_position()
        .into_iter()
        .map(|(index, nic)| {
            let mode = nic.effective_mode();
            NetworkConnection {
                network: nic.name.clone(),
                network_connection_index: index,
                ip_address: match mode {
                    IpAllocationMode::Manual => nic.ip_address.clone(),
                    _ => None,
                },
                is_connected: true,
                ip_address_allocation_mode: mode,
                mac_address: None,
            }
        })
        .collect();

    NetworkConnectionSection {
        primary_network_connection_index: target.spec.primary_index(),
        connections,
    }
}
