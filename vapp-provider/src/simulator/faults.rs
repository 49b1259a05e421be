//! Fault injection for the simulated control plane.

use crate::error::{ClientError, RejectReason};
use crate::task::TaskFailure;

/// Control-plane calls the simulator records and can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetVdc,
    FindVapp,
    InstantiateVapp,
    GetVapp,
    DeleteVapp,
    CreateVm,
    GetVm,
    UpdateHardware,
    UpdateNetwork,
    AddMetadata,
    GetMetadata,
    SetGuestCustomization,
    SetStorageProfile,
    SetPowerState,
    GetTask,
}

impl Operation {
    /// Name used on task handles.
    pub fn task_name(&self) -> &'static str {
        match self {
            Operation::GetVdc => "getVdc",
            Operation::FindVapp => "findVapp",
            Operation::InstantiateVapp => "instantiateVAppTemplate",
            Operation::GetVapp => "getVApp",
            Operation::DeleteVapp => "deleteVApp",
            Operation::CreateVm => "createVm",
            Operation::GetVm => "getVm",
            Operation::UpdateHardware => "updateHardwareSection",
            Operation::UpdateNetwork => "updateNetworkConnectionSection",
            Operation::AddMetadata => "addMetadata",
            Operation::GetMetadata => "getMetadata",
            Operation::SetGuestCustomization => "updateGuestCustomizationSection",
            Operation::SetStorageProfile => "updateStorageProfile",
            Operation::SetPowerState => "powerOperation",
            Operation::GetTask => "getTask",
        }
    }
}

/// What happens when a fault fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultEffect {
    /// The request itself fails with this error; nothing is started.
    Reject(ClientError),
    /// The request is accepted but its task ends in error.
    TaskError(TaskFailure),
    /// The request is accepted but its task is aborted remotely.
    TaskAbort,
    /// The request is accepted and its task never finishes.
    TaskHang,
    /// The call never returns. Only task polls honour it; other calls
    /// proceed as if no fault had fired.
    Stall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub operation: Operation,
    /// Only calls whose target (vApp name, VM name or metadata key) equals
    /// this fire the fault.
    pub target: Option<String>,
    pub effect: FaultEffect,
    /// How many matching calls fire before the fault is spent.
    pub remaining: u32,
    /// Matching calls let through before the fault starts firing.
    pub skip: u32,
}

impl Fault {
    pub fn new(operation: Operation, effect: FaultEffect) -> Self {
        Self {
            operation,
            target: None,
            effect,
            remaining: 1,
            skip: 0,
        }
    }

    pub fn transport(operation: Operation) -> Self {
        Self::new(
            operation,
            FaultEffect::Reject(ClientError::Transport("connection reset by peer".into())),
        )
    }

    pub fn reject(operation: Operation, reason: RejectReason, message: &str) -> Self {
        Self::new(
            operation,
            FaultEffect::Reject(ClientError::rejected(reason, message)),
        )
    }

    pub fn task_error(operation: Operation, message: &str) -> Self {
        Self::new(
            operation,
            FaultEffect::TaskError(TaskFailure {
                major_code: 500,
                minor_code: "INTERNAL_SERVER_ERROR".into(),
                message: message.to_string(),
            }),
        )
    }

    pub fn hang(operation: Operation) -> Self {
        Self::new(operation, FaultEffect::TaskHang)
    }

    /// A task poll that never answers.
    pub fn stalled_poll() -> Self {
        Self::new(Operation::GetTask, FaultEffect::Stall)
    }

    pub fn abort(operation: Operation) -> Self {
        Self::new(operation, FaultEffect::TaskAbort)
    }

    pub fn for_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.remaining = count;
        self
    }

    /// Lets the first `calls` matching calls succeed.
    pub fn after(mut self, calls: u32) -> Self {
        self.skip = calls;
        self
    }

    pub(crate) fn matches(&self, operation: Operation, target: &str) -> bool {
        self.remaining > 0
            && self.operation == operation
            && self.target.as_deref().is_none_or(|t| t == target)
    }
}
