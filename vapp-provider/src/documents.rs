//! Structured documents exchanged with the control plane.
//!
//! These mirror the sections of a VM the orchestrator reads and writes; the
//! transport encoding (XML, JSON) is the client's business.

use serde::{Deserialize, Serialize};
use vapp_config::IpAllocationMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VappRef {
    pub id: String,
    pub name: String,
    pub vdc_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRef {
    pub id: String,
    pub name: String,
    pub vapp_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdcDocument {
    pub name: String,
    pub networks: Vec<String>,
    pub storage_profiles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VappStatus {
    /// Instantiation accepted but not finished.
    Unresolved,
    Resolved,
    /// Instantiation task failed; only deletion is possible.
    FailedCreation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VappNetwork {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VappDocument {
    pub id: String,
    pub name: String,
    pub vdc_name: String,
    pub status: VappStatus,
    pub networks: Vec<VappNetwork>,
    pub children: Vec<VmDocument>,
}

impl VappDocument {
    pub fn to_ref(&self) -> VappRef {
        VappRef {
            id: self.id.clone(),
            name: self.name.clone(),
            vdc_name: self.vdc_name.clone(),
        }
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.iter().any(|n| n.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    PoweredOff,
    PoweredOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerAction {
    PowerOn,
    PowerOff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmDocument {
    pub id: String,
    pub name: String,
    pub vapp_id: String,
    pub power_state: PowerState,
    pub hardware: VirtualHardwareSection,
    pub network: NetworkConnectionSection,
    pub guest_customization: GuestCustomizationSection,
    pub storage_profile: Option<String>,
}

impl VmDocument {
    pub fn to_ref(&self) -> VmRef {
        VmRef {
            id: self.id.clone(),
            name: self.name.clone(),
            vapp_id: self.vapp_id.clone(),
        }
    }
}

/// OVF resource types used in a virtual hardware section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Cpu,
    Memory,
    EthernetAdapter,
    DiskDrive,
    Other(u16),
}

impl ResourceType {
    pub fn code(&self) -> u16 {
        match self {
            ResourceType::Cpu => 3,
            ResourceType::Memory => 4,
            ResourceType::EthernetAdapter => 10,
            ResourceType::DiskDrive => 17,
            ResourceType::Other(code) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareItem {
    pub instance_id: u32,
    pub resource_type: ResourceType,
    pub element_name: String,
    /// Count for CPU, MB for memory, unused for disks.
    pub virtual_quantity: u64,
    /// Disk capacity in MB.
    pub capacity_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub instance_id: u32,
    pub name: String,
    pub size_mb: u64,
}

const FIRST_DISK_INSTANCE_ID: u32 = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHardwareSection {
    pub items: Vec<HardwareItem>,
}

impl VirtualHardwareSection {
    fn quantity(&self, resource_type: ResourceType) -> Option<u64> {
        self.items
            .iter()
            .find(|item| item.resource_type == resource_type)
            .map(|item| item.virtual_quantity)
    }

    fn set_quantity(&mut self, resource_type: ResourceType, quantity: u64) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| item.resource_type == resource_type)
        {
            Some(item) => {
                item.virtual_quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn cpu_count(&self) -> Option<u64> {
        self.quantity(ResourceType::Cpu)
    }

    pub fn memory_mb(&self) -> Option<u64> {
        self.quantity(ResourceType::Memory)
    }

    /// Returns false when the section has no CPU item to update.
    pub fn set_cpu_count(&mut self, count: u64) -> bool {
        self.set_quantity(ResourceType::Cpu, count)
    }

    pub fn set_memory_mb(&mut self, memory: u64) -> bool {
        self.set_quantity(ResourceType::Memory, memory)
    }

    /// Disk entries in instance order, base disk first.
    pub fn disks(&self) -> Vec<DiskInfo> {
        let mut disks: Vec<DiskInfo> = self
            .items
            .iter()
            .filter(|item| item.resource_type == ResourceType::DiskDrive)
            .map(|item| DiskInfo {
                instance_id: item.instance_id,
                name: item.element_name.clone(),
                size_mb: item.capacity_mb.unwrap_or_default(),
            })
            .collect();
        disks.sort_by_key(|disk| disk.instance_id);
        disks
    }

    /// Appends a disk after the existing ones and returns its instance id.
    /// Unnamed disks follow the `Hard disk N` convention.
    pub fn add_disk(&mut self, name: Option<&str>, size_mb: u64) -> u32 {
        let existing = self.disks();
        let instance_id = existing
            .last()
            .map(|disk| disk.instance_id + 1)
            .unwrap_or(FIRST_DISK_INSTANCE_ID);
        let element_name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Hard disk {}", existing.len() + 1));
        self.items.push(HardwareItem {
            instance_id,
            resource_type: ResourceType::DiskDrive,
            element_name,
            virtual_quantity: 0,
            capacity_mb: Some(size_mb),
        });
        instance_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub network: String,
    pub network_connection_index: u32,
    pub ip_address: Option<String>,
    pub is_connected: bool,
    pub ip_address_allocation_mode: IpAllocationMode,
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConnectionSection {
    pub primary_network_connection_index: Option<u32>,
    pub connections: Vec<NetworkConnection>,
}

impl NetworkConnectionSection {
    pub fn connection(&self, network: &str) -> Option<&NetworkConnection> {
        self.connections.iter().find(|c| c.network == network)
    }

    pub fn primary(&self) -> Option<&NetworkConnection> {
        let index = self.primary_network_connection_index?;
        self.connections
            .iter()
            .find(|c| c.network_connection_index == index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCustomizationSection {
    pub enabled: bool,
    pub computer_name: String,
    pub customization_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateVappRequest {
    pub vdc_name: String,
    pub name: String,
    pub catalog: String,
    pub template: String,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVmRequest {
    pub name: String,
    pub catalog: String,
    pub template: String,
}
