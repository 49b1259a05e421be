//! Human and JSON renderings of plans and launch reports.

use serde_json::{json, Value};
use vapp_config::ProvisioningSpec;
use vapp_core::{launch_error_with_details, launch_println, launch_success, launch_warning};
use vapp_orchestrator::{LaunchFailure, LaunchReport, LaunchResult};

/// One line per planned resource, indented under its vApp.
pub fn plan(spec: &ProvisioningSpec) -> Vec<String> {
    let mut lines = vec![format!(
        "vApp {} in {} from {}/{} (power on: {})",
        spec.name, spec.vdc_name, spec.catalog, spec.vapp_template, spec.power_on
    )];
    for (index, vm) in spec.vms.iter().enumerate() {
        let template = vm.template.as_deref().unwrap_or(&spec.vapp_template);
        lines.push(format!("  VM {} ({})", spec.vm_name(index), template));
        if let Some(hw) = &vm.hardware_config {
            let cpu = hw.cpu.map_or("-".to_string(), |c| c.to_string());
            let memory = hw.memory.map_or("-".to_string(), |m| format!("{m} MB"));
            lines.push(format!("    compute: cpu {cpu}, memory {memory}"));
        }
        for disk in &vm.extra_disks {
            let name = disk.name.as_deref().unwrap_or("(unnamed)");
            lines.push(format!("    disk: {name} {} MB", disk.size));
        }
        let primary = vm.primary_index();
        for (position, nic) in vm.interfaces_by_position() {
            let address = nic.ip_address.as_deref().unwrap_or("-");
            let marker = if Some(position) == primary { " primary" } else { "" };
            lines.push(format!(
                "    nic {position}: {} {} {address}{marker}",
                nic.name,
                nic.effective_mode().as_str()
            ));
        }
        if let Some(profile) = &vm.storage_profile {
            lines.push(format!("    storage profile: {profile}"));
        }
        if !vm.metadata.is_empty() {
            let keys: Vec<&str> = vm.metadata.keys().map(String::as_str).collect();
            lines.push(format!("    metadata: {}", keys.join(", ")));
        }
        if vm.customization_script.is_some() {
            lines.push("    guest customization script: yes".to_string());
        }
    }
    lines
}

fn failure_details(failure: &LaunchFailure) -> Vec<String> {
    let mut details = vec![
        failure.error.to_string(),
        format!("failed while {}", failure.failed_in),
    ];
    if let Some(cleanup) = &failure.cleanup {
        details.push(cleanup.to_string());
    }
    if let Some(vapp) = &failure.retained {
        details.push(format!("vApp {} retained ({})", vapp.name, vapp.id));
    }
    details
}

pub fn print_report(report: &LaunchReport) {
    for entry in &report.entries {
        match &entry.result {
            LaunchResult::Launched(outcome) => {
                launch_success!(
                    "vApp {} launched in {} with {} VM(s)",
                    outcome.vapp.name,
                    outcome.vapp.vdc_name,
                    outcome.vms.len()
                );
                for vm in &outcome.vms {
                    launch_println!("  {} ({})", vm.name, vm.id);
                }
            }
            LaunchResult::Failed(failure) => {
                launch_error_with_details!(
                    format!("vApp {} failed: {}", entry.name, failure.kind()),
                    failure_details(failure)
                );
            }
            LaunchResult::Skipped => {
                launch_warning!("vApp {} skipped after an earlier failure", entry.name);
            }
        }
    }
}

pub fn report_json(report: &LaunchReport) -> Value {
    let vapps: Vec<Value> = report
        .entries
        .iter()
        .map(|entry| match &entry.result {
            LaunchResult::Launched(outcome) => json!({
                "name": entry.name,
                "status": "launched",
                "vapp": outcome.vapp,
                "vms": outcome.vms,
                "journal": outcome.journal,
            }),
            LaunchResult::Failed(failure) => json!({
                "name": entry.name,
                "status": "failed",
                "error": {
                    "kind": failure.kind().to_string(),
                    "message": failure.error.to_string(),
                    "resource": failure.error.resource(),
                },
                "failed_in": failure.failed_in,
                "cleanup_error": failure.cleanup.as_ref().map(|c| c.to_string()),
                "retained": failure.retained,
                "journal": failure.journal,
            }),
            LaunchResult::Skipped => json!({
                "name": entry.name,
                "status": "skipped",
            }),
        })
        .collect();

    json!({
        "success": report.is_success(),
        "vapps": vapps,
    })
}
