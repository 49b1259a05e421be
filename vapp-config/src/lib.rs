//! Launch-file configuration for vApp provisioning.
//!
//! A launch file describes one or more vApps. It is parsed once, bootstrap
//! scripts are rendered, and the result is validated before any control-plane
//! call is made, so the orchestrator only ever sees a [`ProvisioningSpec`]
//! that is known to be well formed.

pub mod bootstrap;
pub mod loader;
pub mod metadata;
pub mod options;
pub mod spec;
pub mod validate;

pub use loader::{LaunchFile, SpecLoader};
pub use metadata::MetadataValue;
pub use options::RunOptions;
pub use spec::{
    BootstrapConfig, DiskSpec, HardwareConfig, IpAllocationMode, NetworkInterfaceSpec,
    ProvisioningSpec, VmSpec,
};
pub use validate::SpecValidator;
