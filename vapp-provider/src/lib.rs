//! Control-plane abstraction for vApp provisioning.
//!
//! [`ControlPlane`] is the contract the orchestrator drives: reads return
//! structured documents, every mutation returns a [`TaskHandle`] that must be
//! polled to completion. A production client implements this trait over the
//! cloud's REST API; [`simulator::SimulatedControlPlane`] implements it in
//! memory for rehearsals and tests.

// External crates
use async_trait::async_trait;
use indexmap::IndexMap;

// Internal imports
use vapp_config::MetadataValue;

pub mod documents;
pub mod error;
pub mod simulator;
pub mod task;

pub use documents::{
    CreateVmRequest, DiskInfo, GuestCustomizationSection, HardwareItem, InstantiateVappRequest,
    NetworkConnection, NetworkConnectionSection, PowerAction, PowerState, ResourceType,
    VappDocument, VappNetwork, VappRef, VappStatus, VdcDocument, VirtualHardwareSection,
    VmDocument, VmRef,
};
pub use error::{ClientError, ClientResult, RejectReason};
pub use task::{Accepted, TaskFailure, TaskHandle, TaskStatus};

/// The operations the orchestrator needs from a cloud control plane.
///
/// Implementations must be safe to share between concurrently running
/// launches; each call stands on its own.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Short name for logs, e.g. "simulated".
    fn name(&self) -> &'static str;

    async fn get_vdc(&self, vdc_name: &str) -> ClientResult<VdcDocument>;

    /// Looks a vApp up by name. `Ok(None)` when the datacenter exists but
    /// holds no vApp of that name.
    async fn find_vapp_by_name(&self, vdc_name: &str, vapp_name: &str)
        -> ClientResult<Option<VappRef>>;

    /// Instantiates a vApp from a catalog template. The returned reference
    /// is valid immediately, but the vApp is usable only once the task ends.
    async fn instantiate_vapp(
        &self,
        request: &InstantiateVappRequest,
    ) -> ClientResult<Accepted<VappRef>>;

    async fn get_vapp(&self, vapp: &VappRef) -> ClientResult<VappDocument>;

    async fn delete_vapp(&self, vapp: &VappRef) -> ClientResult<TaskHandle>;

    async fn create_vm(
        &self,
        vapp: &VappRef,
        request: &CreateVmRequest,
    ) -> ClientResult<Accepted<VmRef>>;

    async fn get_vm(&self, vm: &VmRef) -> ClientResult<VmDocument>;

    /// Replaces the VM's whole virtual hardware section.
    async fn update_hardware_section(
        &self,
        vm: &VmRef,
        section: &VirtualHardwareSection,
    ) -> ClientResult<TaskHandle>;

    async fn update_network_section(
        &self,
        vm: &VmRef,
        section: &NetworkConnectionSection,
    ) -> ClientResult<TaskHandle>;

    async fn add_metadata(
        &self,
        vm: &VmRef,
        key: &str,
        value: &MetadataValue,
    ) -> ClientResult<TaskHandle>;

    async fn get_metadata(&self, vm: &VmRef) -> ClientResult<IndexMap<String, MetadataValue>>;

    async fn set_guest_customization(
        &self,
        vm: &VmRef,
        section: &GuestCustomizationSection,
    ) -> ClientResult<TaskHandle>;

    async fn set_storage_profile(&self, vm: &VmRef, profile: &str) -> ClientResult<TaskHandle>;

    async fn set_power_state(&self, vm: &VmRef, action: PowerAction) -> ClientResult<TaskHandle>;

    /// Reads a task's current status. Never has side effects.
    async fn get_task(&self, task: &TaskHandle) -> ClientResult<TaskStatus>;
}
