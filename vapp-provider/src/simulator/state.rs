//! In-memory records behind the simulated control plane.

use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;
use vapp_config::MetadataValue;

use super::faults::{Fault, FaultEffect, Operation};
use super::world::{CatalogItem, SimulatedWorld};
use crate::documents::{
    GuestCustomizationSection, HardwareItem, NetworkConnectionSection, PowerState, ResourceType,
    VappDocument, VappNetwork, VappStatus, VirtualHardwareSection, VmDocument,
};
use crate::error::ClientError;
use crate::task::{TaskFailure, TaskHandle, TaskStatus};

/// A change that lands only when its task succeeds.
#[derive(Debug, Clone)]
pub(crate) enum PendingEffect {
    ResolveVapp { vapp_id: String, networks: Vec<String> },
    DeleteVapp { vapp_id: String },
    AddVm { vapp_id: String, vm: Box<VmDocument> },
    Hardware { vm_id: String, section: VirtualHardwareSection },
    Network { vm_id: String, section: NetworkConnectionSection },
    Metadata { vm_id: String, key: String, value: MetadataValue },
    GuestCustomization { vm_id: String, section: GuestCustomizationSection },
    StorageProfile { vm_id: String, profile: String },
    Power { vm_id: String, state: PowerState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeed,
    Fail,
    Abort,
    Hang,
}

#[derive(Debug)]
pub(crate) struct TaskRecord {
    operation: Operation,
    polls_left: u32,
    outcome: Outcome,
    failure: Option<TaskFailure>,
    effect: PendingEffect,
    status: TaskStatus,
}

/// One recorded call against the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: Operation,
    pub target: String,
}

#[derive(Debug)]
pub(crate) struct SimState {
    pub(crate) world: SimulatedWorld,
    pub(crate) vapps: IndexMap<String, VappDocument>,
    pub(crate) metadata: IndexMap<String, IndexMap<String, MetadataValue>>,
    pub(crate) tasks: IndexMap<String, TaskRecord>,
    pub(crate) faults: Vec<Fault>,
    pub(crate) calls: Vec<CallRecord>,
    pub(crate) task_latency: u32,
}

impl SimState {
    pub(crate) fn new(world: SimulatedWorld) -> Self {
        Self {
            world,
            vapps: IndexMap::new(),
            metadata: IndexMap::new(),
            tasks: IndexMap::new(),
            faults: Vec::new(),
            calls: Vec::new(),
            task_latency: 1,
        }
    }

    /// Records the call and consumes a matching fault, if any.
    pub(crate) fn enter(&mut self, operation: Operation, target: &str) -> Option<FaultEffect> {
        self.calls.push(CallRecord {
            operation,
            target: target.to_string(),
        });
        let fault = self
            .faults
            .iter_mut()
            .find(|fault| fault.matches(operation, target))?;
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        fault.remaining -= 1;
        debug!(?operation, resource = target, effect = ?fault.effect, "Injecting fault");
        Some(fault.effect.clone())
    }

    /// Turns an accepted request into a task, unless the fault rejects it.
    pub(crate) fn start_task(
        &mut self,
        operation: Operation,
        target_id: &str,
        fault: Option<FaultEffect>,
        effect: PendingEffect,
    ) -> Result<TaskHandle, ClientError> {
        let (outcome, failure) = match fault {
            Some(FaultEffect::Reject(error)) => return Err(error),
            Some(FaultEffect::TaskError(failure)) => (Outcome::Fail, Some(failure)),
            Some(FaultEffect::TaskAbort) => (Outcome::Abort, None),
            Some(FaultEffect::TaskHang) => (Outcome::Hang, None),
            Some(FaultEffect::Stall) | None => (Outcome::Succeed, None),
        };
        let id = format!("urn:vcloud:task:{}", Uuid::new_v4());
        self.tasks.insert(
            id.clone(),
            TaskRecord {
                operation,
                polls_left: self.task_latency,
                outcome,
                failure,
                effect,
                status: TaskStatus::Queued,
            },
        );
        Ok(TaskHandle::new(id, operation.task_name(), target_id))
    }

    /// Advances a task by one poll and returns its status.
    pub(crate) fn poll(&mut self, task_id: &str) -> Result<TaskStatus, ClientError> {
        let record = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| ClientError::not_found("task", task_id))?;
        if record.status.is_terminal() {
            return Ok(record.status.clone());
        }
        if record.outcome == Outcome::Hang {
            record.status = TaskStatus::Running { progress: Some(50) };
            return Ok(record.status.clone());
        }

        record.polls_left = record.polls_left.saturating_sub(1);
        if record.polls_left > 0 {
            record.status = TaskStatus::Running { progress: None };
            return Ok(record.status.clone());
        }

        let operation = record.operation;
        let outcome = record.outcome;
        let effect = record.effect.clone();
        let status = match outcome {
            Outcome::Succeed => TaskStatus::Success,
            Outcome::Abort => TaskStatus::Aborted,
            _ => TaskStatus::Error(record.failure.clone().unwrap_or_else(|| TaskFailure {
                major_code: 500,
                minor_code: "INTERNAL_SERVER_ERROR".into(),
                message: "task failed".into(),
            })),
        };
        record.status = status.clone();

        if outcome == Outcome::Succeed {
            self.apply(effect);
        } else if let PendingEffect::ResolveVapp { vapp_id, .. } = effect {
            if let Some(vapp) = self.vapps.get_mut(&vapp_id) {
                vapp.status = VappStatus::FailedCreation;
            }
        }
        debug!(?operation, task_id, ?status, "Task finished");
        Ok(status)
    }

    fn apply(&mut self, effect: PendingEffect) {
        match effect {
            PendingEffect::ResolveVapp { vapp_id, networks } => {
                if let Some(vapp) = self.vapps.get_mut(&vapp_id) {
                    vapp.status = VappStatus::Resolved;
                    vapp.networks = networks
                        .into_iter()
                        .map(|name| VappNetwork { name })
                        .collect();
                }
            }
            PendingEffect::DeleteVapp { vapp_id } => {
                if let Some(vapp) = self.vapps.shift_remove(&vapp_id) {
                    for vm in vapp.children {
                        self.metadata.shift_remove(&vm.id);
                    }
                }
            }
            PendingEffect::AddVm { vapp_id, vm } => {
                if let Some(vapp) = self.vapps.get_mut(&vapp_id) {
                    self.metadata.insert(vm.id.clone(), IndexMap::new());
                    vapp.children.push(*vm);
                }
            }
            PendingEffect::Hardware { vm_id, section } => {
                if let Some(vm) = self.vm_mut(&vm_id) {
                    vm.hardware = section;
                }
            }
            PendingEffect::Network { vm_id, section } => {
                if let Some(vm) = self.vm_mut(&vm_id) {
                    vm.network = section;
                }
            }
            PendingEffect::Metadata { vm_id, key, value } => {
                self.metadata.entry(vm_id).or_default().insert(key, value);
            }
            PendingEffect::GuestCustomization { vm_id, section } => {
                if let Some(vm) = self.vm_mut(&vm_id) {
                    vm.guest_customization = section;
                }
            }
            PendingEffect::StorageProfile { vm_id, profile } => {
                if let Some(vm) = self.vm_mut(&vm_id) {
                    vm.storage_profile = Some(profile);
                }
            }
            PendingEffect::Power { vm_id, state } => {
                if let Some(vm) = self.vm_mut(&vm_id) {
                    vm.power_state = state;
                }
            }
        }
    }

    pub(crate) fn vapp_by_name(&self, vdc_name: &str, name: &str) -> Option<&VappDocument> {
        self.vapps
            .values()
            .find(|vapp| vapp.vdc_name == vdc_name && vapp.name == name)
    }

    pub(crate) fn vm(&self, vm_id: &str) -> Option<&VmDocument> {
        self.vapps
            .values()
            .flat_map(|vapp| vapp.children.iter())
            .find(|vm| vm.id == vm_id)
    }

    fn vm_mut(&mut self, vm_id: &str) -> Option<&mut VmDocument> {
        self.vapps
            .values_mut()
            .flat_map(|vapp| vapp.children.iter_mut())
            .find(|vm| vm.id == vm_id)
    }

    pub(crate) fn vdc_of_vm(&self, vm_id: &str) -> Option<&str> {
        self.vapps
            .values()
            .find(|vapp| vapp.children.iter().any(|vm| vm.id == vm_id))
            .map(|vapp| vapp.vdc_name.as_str())
    }
}

pub(crate) fn new_vapp(name: &str, vdc_name: &str) -> VappDocument {
    VappDocument {
        id: format!("urn:vcloud:vapp:{}", Uuid::new_v4()),
        name: name.to_string(),
        vdc_name: vdc_name.to_string(),
        status: VappStatus::Unresolved,
        networks: Vec::new(),
        children: Vec::new(),
    }
}

/// A powered-off VM shaped like its catalog item: CPU, memory and one base
/// disk, no network connections.
pub(crate) fn new_vm(
    name: &str,
    vapp_id: &str,
    item: &CatalogItem,
    storage_profile: Option<String>,
) -> VmDocument {
    let mut hardware = VirtualHardwareSection {
        items: vec![
            HardwareItem {
                instance_id: 1,
                resource_type: ResourceType::Cpu,
                element_name: format!("{} virtual CPU(s)", item.cpu),
                virtual_quantity: item.cpu,
                capacity_mb: None,
            },
            HardwareItem {
                instance_id: 2,
                resource_type: ResourceType::Memory,
                element_name: format!("{} MB of memory", item.memory),
                virtual_quantity: item.memory,
                capacity_mb: None,
            },
        ],
    };
    hardware.add_disk(None, item.disk_size);

    VmDocument {
        id: format!("urn:vcloud:vm:{}", Uuid::new_v4()),
        name: name.to_string(),
        vapp_id: vapp_id.to_string(),
        power_state: PowerState::PoweredOff,
        hardware,
        network: NetworkConnectionSection::default(),
        guest_customization: GuestCustomizationSection {
            enabled: false,
            computer_name: name.to_string(),
            customization_script: None,
        },
        storage_profile,
    }
}
