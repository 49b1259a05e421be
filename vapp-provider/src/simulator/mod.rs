//! An in-memory control plane.
//!
//! Behaves like the real API where the orchestrator can tell the difference:
//! mutations return tasks, effects land only when a task is polled to
//! success, and a freshly instantiated vApp is visible but unresolved until
//! its task completes. Faults can be injected per operation.

mod faults;
mod state;
mod world;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;
use vapp_config::MetadataValue;

pub use faults::{Fault, FaultEffect, Operation};
pub use state::CallRecord;
pub use world::{CatalogConfig, CatalogItem, SimulatedWorld, VdcConfig};

use self::state::{new_vapp, new_vm, PendingEffect, SimState};
use crate::documents::{
    CreateVmRequest, GuestCustomizationSection, InstantiateVappRequest, NetworkConnectionSection,
    PowerAction, PowerState, VappDocument, VappRef, VappStatus, VdcDocument,
    VirtualHardwareSection, VmDocument, VmRef,
};
use crate::error::{ClientError, ClientResult, RejectReason};
use crate::task::{Accepted, TaskHandle, TaskStatus};
use crate::ControlPlane;

/// Cheap to clone; clones share the same world.
#[derive(Debug, Clone)]
pub struct SimulatedControlPlane {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedControlPlane {
    pub fn new(world: SimulatedWorld) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(world))),
        }
    }

    /// Number of polls a task needs before it finishes. At least one.
    pub fn with_task_latency(self, polls: u32) -> Self {
        self.lock().task_latency = polls.max(1);
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }

    /// How many times an operation was called, successful or not.
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn call_log(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Snapshot of a vApp by name, for inspection outside the trait.
    pub fn vapp(&self, vdc_name: &str, name: &str) -> Option<VappDocument> {
        self.lock().vapp_by_name(vdc_name, name).cloned()
    }

    pub fn vapp_count(&self) -> usize {
        self.lock().vapps.len()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject_if_faulted(
        state: &mut SimState,
        operation: Operation,
        target: &str,
    ) -> ClientResult<()> {
        match state.enter(operation, target) {
            Some(FaultEffect::Reject(error)) => Err(error),
            _ => Ok(()),
        }
    }

    fn existing_vm(state: &SimState, vm: &VmRef) -> ClientResult<VmDocument> {
        state
            .vm(&vm.id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("VM", &vm.name))
    }
}

#[async_trait]
impl ControlPlane for SimulatedControlPlane {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn get_vdc(&self, vdc_name: &str) -> ClientResult<VdcDocument> {
        let mut state = self.lock();
        Self::reject_if_faulted(&mut state, Operation::GetVdc, vdc_name)?;
        let vdc = state
            .world
            .vdc(vdc_name)
            .ok_or_else(|| ClientError::not_found("vdc", vdc_name))?;
        Ok(VdcDocument {
            name: vdc.name.clone(),
            networks: vdc.networks.clone(),
            storage_profiles: vdc.storage_profiles.clone(),
        })
    }

    async fn find_vapp_by_name(
        &self,
        vdc_name: &str,
        vapp_name: &str,
    ) -> ClientResult<Option<VappRef>> {
        let mut state = self.lock();
        Self::reject_if_faulted(&mut state, Operation::FindVapp, vapp_name)?;
        if state.world.vdc(vdc_name).is_none() {
            return Err(ClientError::not_found("vdc", vdc_name));
        }
        Ok(state
            .vapp_by_name(vdc_name, vapp_name)
            .map(VappDocument::to_ref))
    }

    async fn instantiate_vapp(
        &self,
        request: &InstantiateVappRequest,
    ) -> ClientResult<Accepted<VappRef>> {
        let mut state = self.lock();
        let fault = state.enter(Operation::InstantiateVapp, &request.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }

        let vdc = state
            .world
            .vdc(&request.vdc_name)
            .ok_or_else(|| ClientError::not_found("vdc", &request.vdc_name))?;
        if let Some(missing) = request.networks.iter().find(|n| !vdc.networks.contains(n)) {
            return Err(ClientError::rejected(
                RejectReason::InvalidRequest,
                format!("network {missing} is not available in vdc {}", vdc.name),
            ));
        }
        if state
            .world
            .catalog_item(&request.catalog, &request.template)
            .is_none()
        {
            return Err(ClientError::not_found(
                "catalogItem",
                format!("{}/{}", request.catalog, request.template),
            ));
        }
        if state.vapp_by_name(&request.vdc_name, &request.name).is_some() {
            return Err(ClientError::Conflict(format!(
                "vApp {} already exists in vdc {}",
                request.name, request.vdc_name
            )));
        }

        let vapp = new_vapp(&request.name, &request.vdc_name);
        let vapp_ref = vapp.to_ref();
        let task = state.start_task(
            Operation::InstantiateVapp,
            &vapp.id,
            fault,
            PendingEffect::ResolveVapp {
                vapp_id: vapp.id.clone(),
                networks: request.networks.clone(),
            },
        )?;
        debug!(vapp = %request.name, id = %vapp.id, "Instantiating vApp");
        state.vapps.insert(vapp.id.clone(), vapp);

        Ok(Accepted {
            resource: vapp_ref,
            task,
        })
    }

    async fn get_vapp(&self, vapp: &VappRef) -> ClientResult<VappDocument> {
        let mut state = self.lock();
        Self::reject_if_faulted(&mut state, Operation::GetVapp, &vapp.name)?;
        state
            .vapps
            .get(&vapp.id)
            .cloned()
            .ok_or_else(|| ClientError::not_found("vApp", &vapp.name))
    }

    async fn delete_vapp(&self, vapp: &VappRef) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::DeleteVapp, &vapp.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        let document = state
            .vapps
            .get(&vapp.id)
            .ok_or_else(|| ClientError::not_found("vApp", &vapp.name))?;
        if document
            .children
            .iter()
            .any(|vm| vm.power_state == PowerState::PoweredOn)
        {
            return Err(ClientError::rejected(
                RejectReason::Busy,
                format!("vApp {} has running VMs; power them off first", vapp.name),
            ));
        }
        state.start_task(
            Operation::DeleteVapp,
            &vapp.id,
            fault,
            PendingEffect::DeleteVapp {
                vapp_id: vapp.id.clone(),
            },
        )
    }

    async fn create_vm(
        &self,
        vapp: &VappRef,
        request: &CreateVmRequest,
    ) -> ClientResult<Accepted<VmRef>> {
        let mut state = self.lock();
        let fault = state.enter(Operation::CreateVm, &request.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }

        let document = state
            .vapps
            .get(&vapp.id)
            .ok_or_else(|| ClientError::not_found("vApp", &vapp.name))?;
        if document.status != VappStatus::Resolved {
            return Err(ClientError::rejected(
                RejectReason::Busy,
                format!("vApp {} is not resolved ({:?})", vapp.name, document.status),
            ));
        }
        if document.children.iter().any(|vm| vm.name == request.name) {
            return Err(ClientError::Conflict(format!(
                "VM {} already exists in vApp {}",
                request.name, vapp.name
            )));
        }
        let item = state
            .world
            .catalog_item(&request.catalog, &request.template)
            .cloned()
            .ok_or_else(|| {
                ClientError::not_found(
                    "catalogItem",
                    format!("{}/{}", request.catalog, request.template),
                )
            })?;
        let default_profile = state
            .world
            .vdc(&vapp.vdc_name)
            .and_then(|vdc| vdc.storage_profiles.first().cloned());

        let vm = new_vm(&request.name, &vapp.id, &item, default_profile);
        let vm_ref = vm.to_ref();
        let vm_id = vm.id.clone();
        let task = state.start_task(
            Operation::CreateVm,
            &vm_id,
            fault,
            PendingEffect::AddVm {
                vapp_id: vapp.id.clone(),
                vm: Box::new(vm),
            },
        )?;
        Ok(Accepted {
            resource: vm_ref,
            task,
        })
    }

    async fn get_vm(&self, vm: &VmRef) -> ClientResult<VmDocument> {
        let mut state = self.lock();
        Self::reject_if_faulted(&mut state, Operation::GetVm, &vm.name)?;
        Self::existing_vm(&state, vm)
    }

    async fn update_hardware_section(
        &self,
        vm: &VmRef,
        section: &VirtualHardwareSection,
    ) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::UpdateHardware, &vm.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        let current = Self::existing_vm(&state, vm)?.hardware.disks();
        if let Some(limit) = state.world.max_disk_size {
            // Only disks this update adds or resizes count against the limit.
            let mut changed = section.disks().into_iter().filter(|disk| {
                !current.iter().any(|stored| {
                    stored.instance_id == disk.instance_id && stored.size_mb == disk.size_mb
                })
            });
            if let Some(disk) = changed.find(|d| d.size_mb > limit) {
                return Err(ClientError::rejected(
                    RejectReason::InsufficientCapacity,
                    format!(
                        "disk {} of {} MB exceeds the {} MB limit",
                        disk.name, disk.size_mb, limit
                    ),
                ));
            }
        }
        state.start_task(
            Operation::UpdateHardware,
            &vm.id,
            fault,
            PendingEffect::Hardware {
                vm_id: vm.id.clone(),
                section: section.clone(),
            },
        )
    }

    async fn update_network_section(
        &self,
        vm: &VmRef,
        section: &NetworkConnectionSection,
    ) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::UpdateNetwork, &vm.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        Self::existing_vm(&state, vm)?;
        let vapp = state
            .vapps
            .get(&vm.vapp_id)
            .ok_or_else(|| ClientError::not_found("vApp", &vm.vapp_id))?;
        if let Some(missing) = section
            .connections
            .iter()
            .find(|c| !vapp.has_network(&c.network))
        {
            return Err(ClientError::rejected(
                RejectReason::InvalidRequest,
                format!(
                    "network {} is not part of vApp {}",
                    missing.network, vapp.name
                ),
            ));
        }
        state.start_task(
            Operation::UpdateNetwork,
            &vm.id,
            fault,
            PendingEffect::Network {
                vm_id: vm.id.clone(),
                section: section.clone(),
            },
        )
    }

    async fn add_metadata(
        &self,
        vm: &VmRef,
        key: &str,
        value: &MetadataValue,
    ) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::AddMetadata, key);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        Self::existing_vm(&state, vm)?;
        state.start_task(
            Operation::AddMetadata,
            &vm.id,
            fault,
            PendingEffect::Metadata {
                vm_id: vm.id.clone(),
                key: key.to_string(),
                value: value.clone(),
            },
        )
    }

    async fn get_metadata(&self, vm: &VmRef) -> ClientResult<IndexMap<String, MetadataValue>> {
        let mut state = self.lock();
        Self::reject_if_faulted(&mut state, Operation::GetMetadata, &vm.name)?;
        Self::existing_vm(&state, vm)?;
        Ok(state.metadata.get(&vm.id).cloned().unwrap_or_default())
    }

    async fn set_guest_customization(
        &self,
        vm: &VmRef,
        section: &GuestCustomizationSection,
    ) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::SetGuestCustomization, &vm.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        Self::existing_vm(&state, vm)?;
        state.start_task(
            Operation::SetGuestCustomization,
            &vm.id,
            fault,
            PendingEffect::GuestCustomization {
                vm_id: vm.id.clone(),
                section: section.clone(),
            },
        )
    }

    async fn set_storage_profile(&self, vm: &VmRef, profile: &str) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::SetStorageProfile, &vm.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        Self::existing_vm(&state, vm)?;
        let known = state
            .vdc_of_vm(&vm.id)
            .and_then(|vdc_name| state.world.vdc(vdc_name))
            .is_some_and(|vdc| vdc.storage_profiles.iter().any(|p| p == profile));
        if !known {
            return Err(ClientError::not_found("storageProfile", profile));
        }
        state.start_task(
            Operation::SetStorageProfile,
            &vm.id,
            fault,
            PendingEffect::StorageProfile {
                vm_id: vm.id.clone(),
                profile: profile.to_string(),
            },
        )
    }

    async fn set_power_state(&self, vm: &VmRef, action: PowerAction) -> ClientResult<TaskHandle> {
        let mut state = self.lock();
        let fault = state.enter(Operation::SetPowerState, &vm.name);
        if let Some(FaultEffect::Reject(error)) = fault {
            return Err(error);
        }
        Self::existing_vm(&state, vm)?;
        let target = match action {
            PowerAction::PowerOn => PowerState::PoweredOn,
            PowerAction::PowerOff => PowerState::PoweredOff,
        };
        state.start_task(
            Operation::SetPowerState,
            &vm.id,
            fault,
            PendingEffect::Power {
                vm_id: vm.id.clone(),
                state: target,
            },
        )
    }

    async fn get_task(&self, task: &TaskHandle) -> ClientResult<TaskStatus> {
        {
            let mut state = self.lock();
            match state.enter(Operation::GetTask, task.operation()) {
                Some(FaultEffect::Reject(error)) => return Err(error),
                Some(FaultEffect::Stall) => {}
                _ => return state.poll(task.id()),
            }
        }
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SimulatedWorld {
        SimulatedWorld::default()
            .with_vdc("vdc1", &["net-a", "net-b"], &["gold", "silver"])
            .with_catalog("base", &["ubuntu"])
    }

    fn request(name: &str) -> InstantiateVappRequest {
        InstantiateVappRequest {
            vdc_name: "vdc1".into(),
            name: name.into(),
            catalog: "base".into(),
            template: "ubuntu".into(),
            networks: vec!["net-a".into()],
        }
    }

    async fn settle(cp: &SimulatedControlPlane, task: &TaskHandle) -> TaskStatus {
        loop {
            let status = cp.get_task(task).await.expect("poll");
            if status.is_terminal() {
                return status;
            }
        }
    }

    async fn resolved_vapp(cp: &SimulatedControlPlane, name: &str) -> VappRef {
        let accepted = cp.instantiate_vapp(&request(name)).await.expect("instantiate");
        assert_eq!(settle(cp, &accepted.task).await, TaskStatus::Success);
        accepted.resource
    }

    async fn created_vm(cp: &SimulatedControlPlane, vapp: &VappRef, name: &str) -> VmRef {
        let accepted = cp
            .create_vm(
                vapp,
                &CreateVmRequest {
                    name: name.into(),
                    catalog: "base".into(),
                    template: "ubuntu".into(),
                },
            )
            .await
            .expect("create vm");
        assert_eq!(settle(cp, &accepted.task).await, TaskStatus::Success);
        accepted.resource
    }

    #[tokio::test]
    async fn vapp_is_unresolved_until_its_task_succeeds() {
        let cp = SimulatedControlPlane::new(world()).with_task_latency(3);
        let accepted = cp.instantiate_vapp(&request("web")).await.unwrap();

        let doc = cp.get_vapp(&accepted.resource).await.unwrap();
        assert_eq!(doc.status, VappStatus::Unresolved);
        assert!(doc.networks.is_empty());

        assert_eq!(
            cp.get_task(&accepted.task).await.unwrap(),
            TaskStatus::Running { progress: None }
        );
        assert_eq!(settle(&cp, &accepted.task).await, TaskStatus::Success);

        let doc = cp.get_vapp(&accepted.resource).await.unwrap();
        assert_eq!(doc.status, VappStatus::Resolved);
        assert!(doc.has_network("net-a"));
    }

    #[tokio::test]
    async fn duplicate_vapp_name_conflicts() {
        let cp = SimulatedControlPlane::new(world());
        resolved_vapp(&cp, "web").await;

        let err = cp.instantiate_vapp(&request("web")).await.unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));
        assert_eq!(cp.vapp_count(), 1);
    }

    #[tokio::test]
    async fn failed_instantiation_marks_the_vapp() {
        let cp = SimulatedControlPlane::new(world());
        cp.inject(Fault::task_error(Operation::InstantiateVapp, "no capacity"));

        let accepted = cp.instantiate_vapp(&request("web")).await.unwrap();
        assert!(matches!(
            settle(&cp, &accepted.task).await,
            TaskStatus::Error(_)
        ));
        let doc = cp.vapp("vdc1", "web").unwrap();
        assert_eq!(doc.status, VappStatus::FailedCreation);
    }

    #[tokio::test]
    async fn vm_creation_requires_a_resolved_vapp() {
        let cp = SimulatedControlPlane::new(world());
        let accepted = cp.instantiate_vapp(&request("web")).await.unwrap();
        let err = cp
            .create_vm(
                &accepted.resource,
                &CreateVmRequest {
                    name: "web".into(),
                    catalog: "base".into(),
                    template: "ubuntu".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected {
                reason: RejectReason::Busy,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn hardware_changes_land_on_success_only() {
        let cp = SimulatedControlPlane::new(world().with_max_disk_size(4096));
        let vapp = resolved_vapp(&cp, "web").await;
        let vm = created_vm(&cp, &vapp, "web").await;

        let mut hw = cp.get_vm(&vm).await.unwrap().hardware;
        assert_eq!(hw.disks().len(), 1);
        hw.add_disk(None, 8192);
        let err = cp.update_hardware_section(&vm, &hw).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected {
                reason: RejectReason::InsufficientCapacity,
                ..
            }
        ));

        let mut hw = cp.get_vm(&vm).await.unwrap().hardware;
        hw.set_cpu_count(4);
        hw.add_disk(None, 2048);
        let task = cp.update_hardware_section(&vm, &hw).await.unwrap();
        assert_eq!(cp.get_vm(&vm).await.unwrap().hardware.cpu_count(), Some(1));
        settle(&cp, &task).await;
        let hw = cp.get_vm(&vm).await.unwrap().hardware;
        assert_eq!(hw.cpu_count(), Some(4));
        assert_eq!(hw.disks().len(), 2);
    }

    #[tokio::test]
    async fn growing_an_existing_disk_counts_against_the_limit() {
        let cp = SimulatedControlPlane::new(world().with_max_disk_size(4096));
        let vapp = resolved_vapp(&cp, "web").await;
        let vm = created_vm(&cp, &vapp, "web").await;

        let mut hw = cp.get_vm(&vm).await.unwrap().hardware;
        hw.add_disk(Some("data"), 1024);
        let task = cp.update_hardware_section(&vm, &hw).await.unwrap();
        settle(&cp, &task).await;

        let mut hw = cp.get_vm(&vm).await.unwrap().hardware;
        let data = hw
            .items
            .iter_mut()
            .find(|item| item.element_name == "data")
            .unwrap();
        data.capacity_mb = Some(8192);
        let err = cp.update_hardware_section(&vm, &hw).await.unwrap_err();
        assert!(err.to_string().contains("data"));
    }

    #[tokio::test]
    async fn metadata_faults_target_single_keys() {
        let cp = SimulatedControlPlane::new(world());
        let vapp = resolved_vapp(&cp, "web").await;
        let vm = created_vm(&cp, &vapp, "web").await;
        cp.inject(
            Fault::reject(Operation::AddMetadata, RejectReason::InvalidRequest, "bad key")
                .for_target("broken"),
        );

        assert!(cp
            .add_metadata(&vm, "broken", &MetadataValue::Boolean(true))
            .await
            .is_err());
        let task = cp
            .add_metadata(&vm, "fine", &MetadataValue::Integer(-999))
            .await
            .unwrap();
        settle(&cp, &task).await;

        let metadata = cp.get_metadata(&vm).await.unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["fine"], MetadataValue::Integer(-999));
        assert_eq!(cp.calls(Operation::AddMetadata), 2);
    }

    #[tokio::test]
    async fn running_vms_block_deletion() {
        let cp = SimulatedControlPlane::new(world());
        let vapp = resolved_vapp(&cp, "web").await;
        let vm = created_vm(&cp, &vapp, "web").await;
        let task = cp.set_power_state(&vm, PowerAction::PowerOn).await.unwrap();
        settle(&cp, &task).await;

        assert!(cp.delete_vapp(&vapp).await.is_err());

        let task = cp.set_power_state(&vm, PowerAction::PowerOff).await.unwrap();
        settle(&cp, &task).await;
        let task = cp.delete_vapp(&vapp).await.unwrap();
        settle(&cp, &task).await;
        assert!(cp.vapp("vdc1", "web").is_none());
    }

    #[tokio::test]
    async fn hung_tasks_never_finish() {
        let cp = SimulatedControlPlane::new(world());
        let vapp = resolved_vapp(&cp, "web").await;
        let vm = created_vm(&cp, &vapp, "web").await;
        cp.inject(Fault::hang(Operation::SetStorageProfile));

        let task = cp.set_storage_profile(&vm, "silver").await.unwrap();
        for _ in 0..10 {
            assert!(!cp.get_task(&task).await.unwrap().is_terminal());
        }
        assert!(cp.set_storage_profile(&vm, "platinum").await.is_err());
    }

    #[test]
    fn world_parses_from_yaml() {
        let yaml = r#"
vdcs:
  - name: vdc1
    networks: [net-a]
    storage_profiles: [gold]
catalogs:
  - name: base
    items:
      - name: ubuntu
        cpu: 2
max_disk_size: 102400
"#;
        let world: SimulatedWorld = serde_yaml_ng::from_str(yaml).unwrap();
        let item = world.catalog_item("base", "ubuntu").unwrap();
        assert_eq!(item.cpu, 2);
        assert_eq!(item.memory, 1024);
        assert_eq!(world.max_disk_size, Some(102400));
    }
}
