use tracing::{info, instrument};
use vapp_config::ProvisioningSpec;
use vapp_provider::{InstantiateVappRequest, VappRef, VdcDocument, VmRef};

use crate::error::VappProvisionError;
use crate::journal::OperationType;
use crate::session::Session;
use crate::vm::VmProvisioner;

/// A fully provisioned vApp and its VMs in declaration order.
#[derive(Debug, Clone)]
pub struct ProvisionedVapp {
    pub vapp: VappRef,
    pub vms: Vec<VmRef>,
}

/// Instantiates the vApp container, then provisions its VMs one at a time.
pub struct VappProvisioner<'s, 'a> {
    session: &'s Session<'a>,
    vdc: &'s VdcDocument,
}

impl<'s, 'a> VappProvisioner<'s, 'a> {
    pub fn new(session: &'s Session<'a>, vdc: &'s VdcDocument) -> Self {
        Self { session, vdc }
    }

    /// Creates the vApp container. `Ok` carries the reference as soon as the
    /// control plane accepted the request, so the caller owns it even when
    /// the instantiation task then fails.
    #[instrument(skip_all, fields(vapp = %spec.name))]
    pub async fn instantiate(
        &self,
        spec: &ProvisioningSpec,
    ) -> Result<VappRef, VappProvisionError> {
        let request = InstantiateVappRequest {
            vdc_name: spec.vdc_name.clone(),
            name: spec.name.clone(),
            catalog: spec.catalog.clone(),
            template: spec.vapp_template.clone(),
            networks: spec.network_names(),
        };
        let cp = self.session.control_plane();
        let request = &request;
        let created = self
            .session
            .create(OperationType::InstantiateVapp, &spec.name, move || {
                cp.instantiate_vapp(request)
            })
            .await
            .map_err(|error| VappProvisionError {
                error,
                vapp: None,
                vms: Vec::new(),
            })?;

        match created.outcome {
            Ok(()) => {
                info!(id = %created.resource.id, "vApp instantiated");
                Ok(created.resource)
            }
            Err(error) => Err(VappProvisionError {
                error,
                vapp: Some(created.resource),
                vms: Vec::new(),
            }),
        }
    }

    /// Provisions every declared VM in order. The first VM failure stops the
    /// rest; VMs created so far are returned alongside the error.
    #[instrument(skip_all, fields(vapp = %vapp.name))]
    pub async fn provision_vms(
        &self,
        vapp: &VappRef,
        spec: &ProvisioningSpec,
        power_on: bool,
    ) -> Result<Vec<VmRef>, VappProvisionError> {
        let provisioner = VmProvisioner::new(self.session, self.vdc);
        let mut vms = Vec::with_capacity(spec.vms.len());

        for index in 0..spec.vms.len() {
            let outcome = provisioner.provision(vapp, spec, index, power_on).await;
            vms.extend(outcome.vm);
            if let Err(error) = outcome.result {
                return Err(VappProvisionError {
                    error,
                    vapp: Some(vapp.clone()),
                    vms,
                });
            }
        }
        Ok(vms)
    }

    /// Instantiation followed by VM provisioning.
    pub async fn provision(
        &self,
        spec: &ProvisioningSpec,
        power_on: bool,
    ) -> Result<ProvisionedVapp, VappProvisionError> {
        let vapp = self.instantiate(spec).await?;
        let vms = self.provision_vms(&vapp, spec, power_on).await?;
        Ok(ProvisionedVapp { vapp, vms })
    }
}
