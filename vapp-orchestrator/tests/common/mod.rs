//! Shared fixtures: a simulated datacenter and launch specs parsed the same
//! way the launcher parses them.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vapp_config::{ProvisioningSpec, RunOptions, SpecLoader};
use vapp_orchestrator::Launcher;
use vapp_provider::simulator::{SimulatedControlPlane, SimulatedWorld};
use vapp_provider::ControlPlane;

pub const VDC: &str = "test-vdc";

pub fn world() -> SimulatedWorld {
    SimulatedWorld::default()
        .with_vdc(VDC, &["network-1", "network-2"], &["gold", "silver"])
        .with_catalog("test-catalog", &["ubuntu-precise", "centos"])
}

pub fn control_plane() -> SimulatedControlPlane {
    SimulatedControlPlane::new(world())
}

/// Quick polling, no retry backoff worth waiting on.
pub fn fast_options() -> RunOptions {
    RunOptions::default()
        .with_task_timeout(Duration::from_secs(30))
        .with_poll_interval(Duration::from_millis(10))
        .with_request_retries(3, Duration::from_millis(10))
}

pub fn launcher(cp: &SimulatedControlPlane, options: RunOptions) -> Launcher {
    let shared: Arc<dyn ControlPlane> = Arc::new(cp.clone());
    Launcher::new(shared, options)
}

pub fn specs(yaml: &str) -> Vec<ProvisioningSpec> {
    SpecLoader::new()
        .load_str(yaml, Path::new("."))
        .expect("launch spec parses")
        .vapps
}

pub fn spec(yaml: &str) -> ProvisioningSpec {
    specs(yaml).remove(0)
}

/// A single-VM vApp exercising every configurator.
pub fn full_spec(name: &str) -> ProvisioningSpec {
    spec(&format!(
        r##"
name: {name}
vdc_name: {VDC}
catalog: test-catalog
vapp_template: ubuntu-precise
vm:
  hardware_config:
    cpu: 4
    memory: 8192
  extra_disks:
    - size: 1024
    - name: scratch
      size: 2048
  network_connections:
    - name: network-1
      ip_address: 192.168.1.10
    - name: network-2
      ip_address: 192.168.2.10
  metadata:
    is_true: true
    is_false: false
    is_integer: -999
    is_string: Hello World
    created: {{datetime: '2013-10-23T15:34:00Z'}}
  storage_profile: silver
  customization_script: "#!/bin/sh\necho hello > /root/hello.txt"
"##
    ))
}

pub fn minimal_spec(name: &str) -> ProvisioningSpec {
    spec(&format!(
        r#"
name: {name}
vdc_name: {VDC}
catalog: test-catalog
vapp_template: ubuntu-precise
vm: {{}}
"#
    ))
}
