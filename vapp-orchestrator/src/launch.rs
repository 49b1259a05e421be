//! Top-level launch state machine and failure cleanup.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use vapp_config::{ProvisioningSpec, RunOptions, SpecValidator};
use vapp_core::error::{ErrorKind, LaunchError, Result};
use vapp_provider::{ControlPlane, VappRef, VdcDocument, VmRef};

use crate::configure::power_off_running;
use crate::error::{CleanupFailure, LaunchFailure};
use crate::journal::{Journal, Operation, OperationType};
use crate::session::Session;
use crate::vapp::{ProvisionedVapp, VappProvisioner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    Pending,
    VappCreating,
    VmsProvisioning,
    Complete,
    Failed,
}

impl Display for LaunchState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            LaunchState::Pending => "pending",
            LaunchState::VappCreating => "vapp_creating",
            LaunchState::VmsProvisioning => "vms_provisioning",
            LaunchState::Complete => "complete",
            LaunchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A successful run. The vApp now belongs to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchOutcome {
    pub vapp: VappRef,
    pub vms: Vec<VmRef>,
    pub journal: Vec<Operation>,
}

/// State and owned resources of one run.
#[derive(Debug)]
struct RunLedger {
    state: LaunchState,
    owned: Option<VappRef>,
}

impl RunLedger {
    fn enter(&mut self, next: LaunchState) {
        info!(from = %self.state, to = %next, "Launch state changed");
        self.state = next;
    }
}

pub struct Launcher {
    control_plane: Arc<dyn ControlPlane>,
    options: RunOptions,
}

impl Launcher {
    pub fn new(control_plane: Arc<dyn ControlPlane>, options: RunOptions) -> Self {
        Self {
            control_plane,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Launches one vApp.
    ///
    /// On failure everything this run created is deleted unless
    /// `retain_on_failure` is set. A cancelled run is cleaned up the same
    /// way. A vApp name already present in the datacenter fails fast with a
    /// conflict and leaves the existing vApp alone.
    #[instrument(skip_all, fields(vapp = %spec.name, vdc = %spec.vdc_name))]
    pub async fn run(
        &self,
        spec: &ProvisioningSpec,
        cancel: CancellationToken,
    ) -> std::result::Result<LaunchOutcome, LaunchFailure> {
        let journal = Journal::new();
        let session = Session::new(
            self.control_plane.as_ref(),
            &self.options,
            cancel,
            journal.clone(),
        );
        let mut ledger = RunLedger {
            state: LaunchState::Pending,
            owned: None,
        };

        match self.drive(&session, spec, &mut ledger).await {
            Ok(provisioned) => {
                ledger.enter(LaunchState::Complete);
                info!(vms = provisioned.vms.len(), "vApp launched");
                Ok(LaunchOutcome {
                    vapp: provisioned.vapp,
                    vms: provisioned.vms,
                    journal: journal.entries(),
                })
            }
            Err(err) => {
                let failed_in = ledger.state;
                ledger.enter(LaunchState::Failed);
                error!(kind = %err.kind(), error = %err, state = %failed_in, "Launch failed");

                let (cleanup, retained) = match ledger.owned.take() {
                    Some(vapp) if self.options.retain_on_failure => {
                        warn!(vapp = %vapp.name, "Retaining vApp after failure");
                        (None, Some(vapp))
                    }
                    Some(vapp) => match self.cleanup(&vapp, &journal).await {
                        Ok(()) => (None, None),
                        Err(failure) => {
                            warn!(error = %failure, "Cleanup failed");
                            (Some(failure), None)
                        }
                    },
                    None => (None, None),
                };

                Err(LaunchFailure {
                    error: err,
                    cleanup,
                    retained,
                    failed_in,
                    journal: journal.entries(),
                })
            }
        }
    }

    async fn drive(
        &self,
        session: &Session<'_>,
        spec: &ProvisioningSpec,
        ledger: &mut RunLedger,
    ) -> Result<ProvisionedVapp> {
        SpecValidator::new()?.validate(spec)?;
        let vdc = self.preflight(session, spec).await?;

        ledger.enter(LaunchState::VappCreating);
        let provisioner = VappProvisioner::new(session, &vdc);
        let vapp = provisioner.instantiate(spec).await.map_err(|failure| {
            ledger.owned = failure.vapp;
            failure.error
        })?;
        ledger.owned = Some(vapp.clone());

        ledger.enter(LaunchState::VmsProvisioning);
        let power_on = spec.power_on && self.options.power_on;
        let vms = provisioner
            .provision_vms(&vapp, spec, power_on)
            .await
            .map_err(|failure| failure.error)?;

        Ok(ProvisionedVapp { vapp, vms })
    }

    /// Checks made before anything is created: the datacenter exists, offers
    /// every referenced network, and holds no vApp of the same name.
    async fn preflight(&self, session: &Session<'_>, spec: &ProvisioningSpec) -> Result<VdcDocument> {
        let cp = session.control_plane();
        let vdc_name = spec.vdc_name.as_str();
        let vapp_name = spec.name.as_str();

        let vdc = session
            .request(vdc_name, move || cp.get_vdc(vdc_name))
            .await?;
        let missing: Vec<String> = spec
            .network_names()
            .into_iter()
            .filter(|network| !vdc.networks.contains(network))
            .collect();
        if !missing.is_empty() {
            return Err(LaunchError::validation(
                vapp_name,
                format!(
                    "networks not available in vdc {}: {}",
                    vdc.name,
                    missing.join(", ")
                ),
            ));
        }

        let existing = session
            .request(vapp_name, move || cp.find_vapp_by_name(vdc_name, vapp_name))
            .await?;
        if let Some(existing) = existing {
            return Err(LaunchError::conflict(
                vapp_name,
                format!(
                    "a vApp with this name already exists in vdc {} ({})",
                    vdc_name, existing.id
                ),
            ));
        }
        Ok(vdc)
    }

    /// Powers off and deletes a vApp this run created. Runs under its own
    /// cancellation token so a cancelled run can still clean up.
    #[instrument(skip_all, fields(vapp = %vapp.name))]
    async fn cleanup(
        &self,
        vapp: &VappRef,
        journal: &Journal,
    ) -> std::result::Result<(), CleanupFailure> {
        let session = Session::new(
            self.control_plane.as_ref(),
            &self.options,
            CancellationToken::new(),
            journal.clone(),
        );
        let cp = session.control_plane();
        let result = async {
            let stopped = power_off_running(&session, vapp).await?;
            if stopped > 0 {
                info!(stopped, "Powered off running VMs before delete");
            }
            session
                .execute(OperationType::DeleteVapp, &vapp.name, move || {
                    cp.delete_vapp(vapp)
                })
                .await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Deleted vApp after failure");
                Ok(())
            }
            Err(error) => Err(CleanupFailure {
                vapp: vapp.name.clone(),
                error,
            }),
        }
    }

    /// Launches several vApps one after another, each with its own cleanup.
    ///
    /// The first failure skips the rest unless `continue_on_error` is set.
    /// Cancellation always stops the batch.
    pub async fn run_all(
        &self,
        specs: &[ProvisioningSpec],
        cancel: &CancellationToken,
    ) -> LaunchReport {
        let mut entries = Vec::with_capacity(specs.len());
        let mut halted = false;

        for spec in specs {
            let result = if halted {
                LaunchResult::Skipped
            } else {
                match self.run(spec, cancel.clone()).await {
                    Ok(outcome) => LaunchResult::Launched(outcome),
                    Err(failure) => {
                        if !self.options.continue_on_error
                            || failure.kind() == ErrorKind::Cancelled
                        {
                            halted = true;
                        }
                        LaunchResult::Failed(failure)
                    }
                }
            };
            entries.push(LaunchEntry {
                name: spec.name.clone(),
                result,
            });
        }

        LaunchReport { entries }
    }
}

#[derive(Debug)]
pub enum LaunchResult {
    Launched(LaunchOutcome),
    Failed(LaunchFailure),
    /// Not attempted because an earlier vApp failed.
    Skipped,
}

#[derive(Debug)]
pub struct LaunchEntry {
    pub name: String,
    pub result: LaunchResult,
}

/// Per-vApp outcome of [`Launcher::run_all`], in launch-file order.
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub entries: Vec<LaunchEntry>,
}

impl LaunchReport {
    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| matches!(entry.result, LaunchResult::Launched(_)))
    }

    pub fn launched(&self) -> impl Iterator<Item = &LaunchOutcome> {
        self.entries.iter().filter_map(|entry| match &entry.result {
            LaunchResult::Launched(outcome) => Some(outcome),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &LaunchFailure)> {
        self.entries.iter().filter_map(|entry| match &entry.result {
            LaunchResult::Failed(failure) => Some((entry.name.as_str(), failure)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry.result {
            LaunchResult::Skipped => Some(entry.name.as_str()),
            _ => None,
        })
    }
}
