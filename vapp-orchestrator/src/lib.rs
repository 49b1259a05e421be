//! vApp provisioning orchestration
//!
//! Drives a [`vapp_provider::ControlPlane`] through creating a vApp, its VMs
//! and their configuration, waiting on every task the control plane hands
//! back. Failed runs delete what they created unless told to keep it.
//!
//! Layering, leaf first: [`task::TaskWaiter`], the [`configure`] steps,
//! [`vm::VmProvisioner`], [`vapp::VappProvisioner`], [`launch::Launcher`].

pub mod configure;
pub mod error;
pub mod journal;
pub mod launch;
pub mod session;
pub mod task;
pub mod vapp;
pub mod vm;

pub use configure::{ConfigStep, VmTarget};
pub use error::{CleanupFailure, LaunchFailure, VappProvisionError};
pub use journal::{Journal, Operation, OperationStatus, OperationType};
pub use launch::{LaunchEntry, LaunchOutcome, LaunchReport, LaunchResult, LaunchState, Launcher};
pub use session::{Created, Session};
pub use task::{client_error, RetryPolicy, TaskWaiter};
pub use vapp::{ProvisionedVapp, VappProvisioner};
pub use vm::{VmOutcome, VmProvisioner};
