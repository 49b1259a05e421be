use tracing::{info, instrument, warn};
use vapp_config::{ProvisioningSpec, VmSpec};
use vapp_core::error::{LaunchError, Result};
use vapp_provider::{CreateVmRequest, VappRef, VdcDocument, VmRef};

use crate::configure::{ConfigStep, VmTarget};
use crate::journal::OperationType;
use crate::session::Session;

/// Creates one VM inside a vApp and runs its configurators in order.
pub struct VmProvisioner<'s, 'a> {
    session: &'s Session<'a>,
    vdc: &'s VdcDocument,
}

/// A created VM, also returned when configuration stopped part-way so the
/// caller knows it exists.
#[derive(Debug)]
pub struct VmOutcome {
    pub vm: Option<VmRef>,
    pub result: Result<()>,
}

impl<'s, 'a> VmProvisioner<'s, 'a> {
    pub fn new(session: &'s Session<'a>, vdc: &'s VdcDocument) -> Self {
        Self { session, vdc }
    }

    /// Provisions the VM at `index` of `spec`. Stops at the first failed
    /// configurator and reports which steps had already been applied.
    #[instrument(skip_all, fields(vapp = %vapp.name, vm = %spec.vm_name(index)))]
    pub async fn provision(
        &self,
        vapp: &VappRef,
        spec: &ProvisioningSpec,
        index: usize,
        power_on: bool,
    ) -> VmOutcome {
        let Some(vm_spec) = spec.vms.get(index) else {
            return VmOutcome {
                vm: None,
                result: Err(LaunchError::validation(
                    &spec.name,
                    format!("no VM declared at position {index}"),
                )),
            };
        };
        let name = spec.vm_name(index);
        let request = CreateVmRequest {
            name: name.clone(),
            catalog: spec.catalog.clone(),
            template: vm_spec
                .template
                .clone()
                .unwrap_or_else(|| spec.vapp_template.clone()),
        };

        let cp = self.session.control_plane();
        let request = &request;
        let created = match self
            .session
            .create(OperationType::CreateVm, &name, move || {
                cp.create_vm(vapp, request)
            })
            .await
        {
            Ok(created) => created,
            Err(error) => {
                return VmOutcome {
                    vm: None,
                    result: Err(error),
                }
            }
        };
        let vm = created.resource;
        if let Err(error) = created.outcome {
            return VmOutcome {
                vm: Some(vm),
                result: Err(error),
            };
        }
        info!(id = %vm.id, "VM created");

        let result = self.configure(&vm, vm_spec, vapp, power_on).await;
        VmOutcome {
            vm: Some(vm),
            result,
        }
    }

    async fn configure(
        &self,
        vm: &VmRef,
        vm_spec: &VmSpec,
        vapp: &VappRef,
        power_on: bool,
    ) -> Result<()> {
        let target = VmTarget {
            vm,
            spec: vm_spec,
            vapp,
            vdc: self.vdc,
            power_on,
        };
        let mut applied: Vec<String> = Vec::new();

        for step in ConfigStep::ORDER {
            if !step.applies(&target) {
                continue;
            }
            if let Err(source) = step.configure(self.session, &target).await {
                warn!(step = %step, error = %source, "Configuration step failed");
                return Err(LaunchError::VmConfiguration {
                    vm: vm.name.clone(),
                    step: step.name().to_string(),
                    applied,
                    source: Box::new(source),
                });
            }
            applied.push(step.name().to_string());
        }

        info!(steps = ?applied, "VM configured");
        Ok(())
    }
}
