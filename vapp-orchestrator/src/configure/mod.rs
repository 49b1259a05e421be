//! Resource configurators: each turns one slice of a [`VmSpec`] into
//! control-plane calls against a VM that already exists.
//!
//! Steps run in [`ConfigStep::ORDER`]. Compute and disks both rewrite the
//! virtual hardware section, so they never run concurrently; customization
//! and power-on assume hardware and network are final.

mod compute;
mod customization;
mod disks;
mod metadata;
mod network;
mod power;
mod storage;

use std::fmt::{self, Display, Formatter};

use vapp_config::VmSpec;
use vapp_core::error::Result;
use vapp_provider::{VappRef, VdcDocument, VmRef};

use crate::session::Session;

pub use power::power_off_running;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigStep {
    Compute,
    Disks,
    Network,
    StorageProfile,
    Metadata,
    GuestCustomization,
    Power,
}

impl ConfigStep {
    pub const ORDER: [ConfigStep; 7] = [
        ConfigStep::Compute,
        ConfigStep::Disks,
        ConfigStep::Network,
        ConfigStep::StorageProfile,
        ConfigStep::Metadata,
        ConfigStep::GuestCustomization,
        ConfigStep::Power,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigStep::Compute => "compute",
            ConfigStep::Disks => "disks",
            ConfigStep::Network => "network",
            ConfigStep::StorageProfile => "storage_profile",
            ConfigStep::Metadata => "metadata",
            ConfigStep::GuestCustomization => "guest_customization",
            ConfigStep::Power => "power",
        }
    }

    /// Whether the VM's spec asks for anything this step does.
    pub fn applies(&self, target: &VmTarget<'_>) -> bool {
        let spec = target.spec;
        match self {
            ConfigStep::Compute => spec.has_hardware_changes(),
            ConfigStep::Disks => !spec.extra_disks.is_empty(),
            ConfigStep::Network => !spec.network_connections.is_empty(),
            ConfigStep::StorageProfile => spec.storage_profile.is_some(),
            ConfigStep::Metadata => !spec.metadata.is_empty(),
            ConfigStep::GuestCustomization => {
                spec.customization_script.is_some() || spec.computer_name.is_some()
            }
            ConfigStep::Power => target.power_on,
        }
    }

    pub async fn configure(&self, session: &Session<'_>, target: &VmTarget<'_>) -> Result<()> {
        match self {
            ConfigStep::Compute => compute::configure(session, target).await,
            ConfigStep::Disks => disks::configure(session, target).await,
            ConfigStep::Network => network::configure(session, target).await,
            ConfigStep::StorageProfile => storage::configure(session, target).await,
            ConfigStep::Metadata => metadata::configure(session, target).await,
            ConfigStep::GuestCustomization => customization::configure(session, target).await,
            ConfigStep::Power => power::configure(session, target).await,
        }
    }
}

impl Display for ConfigStep {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The VM being configured and the context its configurators need.
#[derive(Debug, Clone, Copy)]
pub struct VmTarget<'a> {
    pub vm: &'a VmRef,
    pub spec: &'a VmSpec,
    pub vapp: &'a VappRef,
    pub vdc: &'a VdcDocument,
    /// Whether this VM ends powered on.
    pub power_on: bool,
}

impl VmTarget<'_> {
    pub fn name(&self) -> &str {
        &self.vm.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vapp_config::{DiskSpec, HardwareConfig};

    fn target<'a>(
        vm: &'a VmRef,
        spec: &'a VmSpec,
        vapp: &'a VappRef,
        vdc: &'a VdcDocument,
        power_on: bool,
    ) -> VmTarget<'a> {
        VmTarget {
            vm,
            spec,
            vapp,
            vdc,
            power_on,
        }
    }

    #[test]
    fn order_puts_hardware_first_and_power_last() {
        assert_eq!(ConfigStep::ORDER[0], ConfigStep::Compute);
        assert_eq!(ConfigStep::ORDER[1], ConfigStep::Disks);
        assert_eq!(ConfigStep::ORDER[6], ConfigStep::Power);
        let customization = ConfigStep::ORDER
            .iter()
            .position(|s| *s == ConfigStep::GuestCustomization);
        let network = ConfigStep::ORDER
            .iter()
            .position(|s| *s == ConfigStep::Network);
        assert!(network < customization);
    }

    #[test]
    fn empty_fragments_skip_their_step() {
        let vm = VmRef {
            id: "vm-1".into(),
            name: "web".into(),
            vapp_id: "vapp-1".into(),
        };
        let vapp = VappRef {
            id: "vapp-1".into(),
            name: "web".into(),
            vdc_name: "vdc1".into(),
        };
        let vdc = VdcDocument {
            name: "vdc1".into(),
            networks: vec![],
            storage_profiles: vec![],
        };
        let bare = VmSpec::default();
        let t = target(&vm, &bare, &vapp, &vdc, false);
        assert!(ConfigStep::ORDER.iter().all(|step| !step.applies(&t)));

        let sized = VmSpec {
            hardware_config: Some(HardwareConfig {
                cpu: Some(2),
                memory: None,
            }),
            extra_disks: vec![DiskSpec {
                name: None,
                size: 1024,
            }],
            ..VmSpec::default()
        };
        let t = target(&vm, &sized, &vapp, &vdc, true);
        let applied: Vec<_> = ConfigStep::ORDER
            .iter()
            .filter(|step| step.applies(&t))
            .map(ConfigStep::name)
            .collect();
        assert_eq!(applied, vec!["compute", "disks", "power"]);
    }
}
