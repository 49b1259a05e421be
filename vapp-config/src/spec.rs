// Standard library imports
use std::path::PathBuf;

// External crate imports
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// Internal imports
use crate::metadata::MetadataValue;

fn default_true() -> bool {
    true
}

/// Desired state of one vApp and the VMs inside it.
///
/// Deserialized from a launch-file entry. Both the single `vm:` form and the
/// `vms:` list are accepted; after loading, [`ProvisioningSpec::vms`] always
/// holds every declared VM in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawProvisioningSpec")]
pub struct ProvisioningSpec {
    pub name: String,
    pub vdc_name: String,
    pub catalog: String,
    pub vapp_template: String,
    pub power_on: bool,
    pub vms: Vec<VmSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProvisioningSpec {
    #[serde(alias = "vapp_name")]
    name: String,
    vdc_name: String,
    #[serde(alias = "catalog_name")]
    catalog: String,
    #[serde(alias = "catalog_item")]
    vapp_template: String,
    #[serde(default = "default_true")]
    power_on: bool,
    #[serde(default)]
    vm: Option<VmSpec>,
    #[serde(default)]
    vms: Vec<VmSpec>,
}

impl From<RawProvisioningSpec> for ProvisioningSpec {
    fn from(raw: RawProvisioningSpec) -> Self {
        let mut vms = Vec::with_capacity(raw.vms.len() + 1);
        vms.extend(raw.vm);
        vms.extend(raw.vms);
        Self {
            name: raw.name,
            vdc_name: raw.vdc_name,
            catalog: raw.catalog,
            vapp_template: raw.vapp_template,
            power_on: raw.power_on,
            vms,
        }
    }
}

impl ProvisioningSpec {
    /// Name the VM at `index` will be created with.
    ///
    /// An explicit `name` wins. A lone VM takes the vApp's name, otherwise
    /// VMs are numbered `<vapp>-1`, `<vapp>-2`, ...
    pub fn vm_name(&self, index: usize) -> String {
        if let Some(name) = self.vms.get(index).and_then(|vm| vm.name.clone()) {
            return name;
        }
        if self.vms.len() <= 1 {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, index + 1)
        }
    }

    /// Every network referenced by any VM, in first-reference order.
    pub fn network_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for vm in &self.vms {
            for nic in &vm.network_connections {
                if !names.contains(&nic.name) {
                    names.push(nic.name.clone());
                }
            }
        }
        names
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VmSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Catalog item the VM is instantiated from; the vApp template when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_config: Option<HardwareConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_disks: Vec<DiskSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_connections: Vec<NetworkInterfaceSpec>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, MetadataValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapConfig>,

    /// Rendered guest-customization script body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<String>,
}

impl VmSpec {
    /// Interfaces paired with their connection index, sorted by index.
    ///
    /// An interface without an explicit `index` takes its declaration position.
    pub fn interfaces_by_position(&self) -> Vec<(u32, &NetworkInterfaceSpec)> {
        let mut nics: Vec<(u32, &NetworkInterfaceSpec)> = self
            .network_connections
            .iter()
            .enumerate()
            .map(|(pos, nic)| (nic.index.unwrap_or(pos as u32), nic))
            .collect();
        nics.sort_by_key(|(index, _)| *index);
        nics
    }

    /// Connection index of the primary interface: the one flagged `primary`,
    /// otherwise the one at position 0.
    pub fn primary_index(&self) -> Option<u32> {
        let nics = self.interfaces_by_position();
        nics.iter()
            .find(|(_, nic)| nic.primary == Some(true))
            .or_else(|| nics.first())
            .map(|(index, _)| *index)
    }

    pub fn has_hardware_changes(&self) -> bool {
        self.hardware_config
            .as_ref()
            .is_some_and(|hw| hw.cpu.is_some() || hw.memory.is_some())
    }
}

/// Compute sizing. Memory is in MB.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

/// An additional disk beyond the template's base disk. Size is in MB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IpAllocationMode {
    #[serde(rename = "MANUAL", alias = "manual", alias = "fixed")]
    Manual,
    #[serde(rename = "POOL", alias = "pool")]
    Pool,
    #[serde(rename = "DHCP", alias = "dhcp")]
    Dhcp,
    #[serde(rename = "NONE", alias = "none")]
    None,
}

impl IpAllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAllocationMode::Manual => "MANUAL",
            IpAllocationMode::Pool => "POOL",
            IpAllocationMode::Dhcp => "DHCP",
            IpAllocationMode::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NetworkInterfaceSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_mode: Option<IpAllocationMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

impl NetworkInterfaceSpec {
    /// Explicit mode, else MANUAL when an address is given and POOL otherwise.
    pub fn effective_mode(&self) -> IpAllocationMode {
        match (self.allocation_mode, &self.ip_address) {
            (Some(mode), _) => mode,
            (None, Some(_)) => IpAllocationMode::Manual,
            (None, None) => IpAllocationMode::Pool,
        }
    }
}

/// A guest-customization script template on disk plus its variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    pub script_path: PathBuf,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub vars: IndexMap<String, serde_json::Value>,
}
