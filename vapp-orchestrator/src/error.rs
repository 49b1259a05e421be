use thiserror::Error;
use vapp_core::error::{ErrorKind, LaunchError};
use vapp_provider::{VappRef, VmRef};

use crate::journal::Operation;
use crate::launch::LaunchState;

/// Best-effort rollback that did not work. Always reported next to the
/// failure that triggered it.
#[derive(Error, Debug)]
#[error("Cleanup of vApp {vapp} failed: {error}")]
pub struct CleanupFailure {
    pub vapp: String,
    #[source]
    pub error: LaunchError,
}

/// A vApp that did not finish provisioning, with whatever was created
/// before the failure.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct VappProvisionError {
    #[source]
    pub error: LaunchError,
    /// Set once the control plane accepted the instantiation.
    pub vapp: Option<VappRef>,
    pub vms: Vec<VmRef>,
}

/// The outcome of a failed run.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LaunchFailure {
    #[source]
    pub error: LaunchError,
    pub cleanup: Option<CleanupFailure>,
    /// The vApp left in place because cleanup was turned off.
    pub retained: Option<VappRef>,
    /// State the run was in when it failed.
    pub failed_in: LaunchState,
    pub journal: Vec<Operation>,
}

impl LaunchFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
