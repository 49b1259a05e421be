use std::collections::HashSet;
use std::net::IpAddr;

use regex::Regex;
use vapp_core::error::{LaunchError, Result};

use crate::spec::{IpAllocationMode, ProvisioningSpec, VmSpec};

const MAX_NAME_LEN: usize = 128;

/// Structural checks on a loaded [`ProvisioningSpec`].
///
/// Only what can be decided without the control plane is checked here;
/// whether a network, storage profile or template exists is discovered when
/// the orchestrator talks to the virtual datacenter.
pub struct SpecValidator {
    computer_name: Regex,
}

impl SpecValidator {
    pub fn new() -> Result<Self> {
        let computer_name = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,62}$")
            .map_err(|e| LaunchError::Config(format!("Invalid regex pattern: {e}")))?;
        Ok(Self { computer_name })
    }

    pub fn validate(&self, spec: &ProvisioningSpec) -> Result<()> {
        let resource = format!("vapp:{}", spec.name);

        check_name(&resource, "name", &spec.name)?;
        for (field, value) in [
            ("vdc_name", &spec.vdc_name),
            ("catalog", &spec.catalog),
            ("vapp_template", &spec.vapp_template),
        ] {
            if value.trim().is_empty() {
                return Err(LaunchError::validation(
                    &resource,
                    format!("Missing required field: {field}"),
                ));
            }
        }

        if spec.vms.is_empty() {
            return Err(LaunchError::validation(&resource, "A vApp needs at least one VM"));
        }

        let mut seen = HashSet::new();
        for index in 0..spec.vms.len() {
            let vm_name = spec.vm_name(index);
            if !seen.insert(vm_name.clone()) {
                return Err(LaunchError::validation(
                    &resource,
                    format!("Duplicate VM name '{vm_name}'"),
                ));
            }
            self.validate_vm(spec, index, &vm_name)?;
        }

        Ok(())
    }

    fn validate_vm(&self, spec: &ProvisioningSpec, index: usize, vm_name: &str) -> Result<()> {
        let vm = &spec.vms[index];
        let resource = format!("vm:{}/{}", spec.name, vm_name);

        check_name(&resource, "vm name", vm_name)?;

        if let Some(hw) = &vm.hardware_config {
            if hw.cpu == Some(0) {
                return Err(LaunchError::validation(&resource, "cpu must be at least 1"));
            }
            if hw.memory == Some(0) {
                return Err(LaunchError::validation(&resource, "memory must be at least 1 MB"));
            }
        }

        for (pos, disk) in vm.extra_disks.iter().enumerate() {
            if disk.size == 0 {
                return Err(LaunchError::validation(
                    &resource,
                    format!("extra_disks[{pos}] has size 0"),
                ));
            }
        }

        validate_network_connections(&resource, vm)?;

        for key in vm.metadata.keys() {
            if key.trim().is_empty() {
                return Err(LaunchError::validation(&resource, "Metadata keys must not be empty"));
            }
        }

        if vm
            .storage_profile
            .as_ref()
            .is_some_and(|profile| profile.trim().is_empty())
        {
            return Err(LaunchError::validation(&resource, "storage_profile is empty"));
        }

        if vm.customization_script.is_some() || vm.computer_name.is_some() {
            let computer_name = vm.computer_name.as_deref().unwrap_or(vm_name);
            if !self.computer_name.is_match(computer_name) {
                return Err(LaunchError::validation(
                    &resource,
                    format!(
                        "Invalid computer name '{computer_name}': use letters, digits and dashes, at most 63 characters"
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn check_name(resource: &str, field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LaunchError::validation(resource, format!("Missing required field: {field}")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(LaunchError::validation(
            resource,
            format!("{field} is longer than {MAX_NAME_LEN} characters"),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(LaunchError::validation(
            resource,
            format!("{field} contains control characters"),
        ));
    }
    Ok(())
}

/// Positions must be unique and contiguous from 0, at most one interface may
/// be flagged primary, and the address must agree with the allocation mode.
fn validate_network_connections(resource: &str, vm: &VmSpec) -> Result<()> {
    let nics = vm.interfaces_by_position();

    for (expected, (index, nic)) in nics.iter().enumerate() {
        if *index != expected as u32 {
            return Err(LaunchError::validation(
                resource,
                format!(
                    "Network connection indices must be unique and contiguous from 0; found {index} for '{}' where {expected} was expected",
                    nic.name
                ),
            ));
        }
        if nic.name.trim().is_empty() {
            return Err(LaunchError::validation(
                resource,
                format!("Network connection {index} has no network name"),
            ));
        }

        match (nic.effective_mode(), &nic.ip_address) {
            (IpAllocationMode::Manual, None) => {
                return Err(LaunchError::validation(
                    resource,
                    format!("Network '{}' uses MANUAL allocation but has no ip_address", nic.name),
                ));
            }
            (IpAllocationMode::Manual, Some(ip)) => {
                if ip.parse::<IpAddr>().is_err() {
                    return Err(LaunchError::validation(
                        resource,
                        format!("Network '{}' has an invalid ip_address '{ip}'", nic.name),
                    ));
                }
            }
            (mode, Some(_)) => {
                return Err(LaunchError::validation(
                    resource,
                    format!(
                        "Network '{}' sets ip_address but uses {} allocation",
                        nic.name,
                        mode.as_str()
                    ),
                ));
            }
            (_, None) => {}
        }
    }

    let primaries = vm
        .network_connections
        .iter()
        .filter(|nic| nic.primary == Some(true))
        .count();
    if primaries > 1 {
        return Err(LaunchError::validation(
            resource,
            "At most one network connection can be primary",
        ));
    }

    Ok(())
}
