use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const WORLD: &str = r#"
vdcs:
  - name: test-vdc
    networks: [network-1, network-2]
    storage_profiles: [gold, silver]
catalogs:
  - name: test-catalog
    items:
      - name: ubuntu-precise
"#;

const LAUNCH: &str = r#"
vapps:
  - name: web
    vdc_name: test-vdc
    catalog: test-catalog
    vapp_template: ubuntu-precise
    vm:
      hardware_config: {cpu: 2, memory: 2048}
      extra_disks: [{size: 1024}]
      network_connections:
        - name: network-1
          ip_address: 192.168.0.10
      metadata:
        role: frontend
      storage_profile: gold
      bootstrap:
        script_path: bootstrap.sh.j2
        vars: {greeting: hello}
"#;

fn launcher_cmd() -> Command {
    let mut cmd = Command::from(std::process::Command::new(assert_cmd::cargo::cargo_bin(
        "vapp-launch",
    )));
    cmd.env("LOG_OUTPUT", "off");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn workspace(launch: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "bootstrap.sh.j2", "#!/bin/sh\necho {{ vars.greeting }} from {{ vm_name }}\n");
    let launch = write(dir.path(), "launch.yaml", launch);
    let world = write(dir.path(), "world.yaml", WORLD);
    (dir, launch, world)
}

fn launch_json(launch: &Path, world: &Path, extra: &[&str]) -> (bool, Value) {
    let output = launcher_cmd()
        .arg("launch")
        .arg(launch)
        .arg("--world")
        .arg(world)
        .args(["--poll-interval", "1", "--json"])
        .args(extra)
        .output()
        .unwrap();
    let report = serde_json::from_slice(&output.stdout).unwrap();
    (output.status.success(), report)
}

#[test]
fn validate_prints_the_plan() {
    let (_dir, launch, _world) = workspace(LAUNCH);

    launcher_cmd()
        .arg("validate")
        .arg(&launch)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "vApp web in test-vdc from test-catalog/ubuntu-precise",
        ))
        .stdout(predicate::str::contains("nic 0: network-1 MANUAL 192.168.0.10 primary"))
        .stderr(predicate::str::contains("is valid (1 vApp)"));
}

#[test]
fn validate_json_contains_the_rendered_script() {
    let (_dir, launch, _world) = workspace(LAUNCH);

    let output = launcher_cmd()
        .args(["--json", "validate"])
        .arg(&launch)
        .output()
        .unwrap();
    assert!(output.status.success());

    let file: Value = serde_json::from_slice(&output.stdout).unwrap();
    let script = file["vapps"][0]["vms"][0]["customization_script"]
        .as_str()
        .unwrap();
    assert_eq!(script, "#!/bin/sh\necho hello from web\n");
}

#[test]
fn validate_rejects_an_invalid_file() {
    let (_dir, launch, _world) = workspace(
        r#"
name: broken
vdc_name: test-vdc
catalog: test-catalog
vapp_template: ubuntu-precise
vm:
  hardware_config: {cpu: 0}
"#,
    );

    launcher_cmd()
        .arg("validate")
        .arg(&launch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cpu must be at least 1"));
}

#[test]
fn launch_reports_created_resources_as_json() {
    let (_dir, launch, world) = workspace(LAUNCH);

    let (success, report) = launch_json(&launch, &world, &[]);
    assert!(success);
    assert_eq!(report["success"], true);

    let vapp = &report["vapps"][0];
    assert_eq!(vapp["status"], "launched");
    assert_eq!(vapp["vapp"]["name"], "web");
    assert_eq!(vapp["vms"][0]["name"], "web");

    let operations: Vec<&str> = vapp["journal"]
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["operation_type"].as_str().unwrap())
        .collect();
    assert_eq!(operations.first(), Some(&"instantiate_vapp"));
    assert_eq!(operations.last(), Some(&"power_on"));
    assert!(vapp["journal"]
        .as_array()
        .unwrap()
        .iter()
        .all(|op| op["status"] == "success"));
}

#[test]
fn launch_without_power_on_skips_the_power_step() {
    let (_dir, launch, world) = workspace(LAUNCH);

    let (success, report) = launch_json(&launch, &world, &["--dont-power-on"]);
    assert!(success);
    let journal = report["vapps"][0]["journal"].as_array().unwrap();
    assert!(journal.iter().all(|op| op["operation_type"] != "power_on"));
}

#[test]
fn failed_launch_exits_non_zero_and_cleans_up() {
    let (_dir, launch, world) = workspace(&LAUNCH.replace("storage_profile: gold", "storage_profile: bronze"));

    let (success, report) = launch_json(&launch, &world, &[]);
    assert!(!success);
    assert_eq!(report["success"], false);

    let vapp = &report["vapps"][0];
    assert_eq!(vapp["status"], "failed");
    assert_eq!(vapp["error"]["kind"], "NotFoundError");
    assert_eq!(vapp["failed_in"], "vms_provisioning");
    assert!(vapp["cleanup_error"].is_null());
    assert!(vapp["retained"].is_null());

    let last = vapp["journal"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["operation_type"], "delete_vapp");
    assert_eq!(last["status"], "success");
}

#[test]
fn retained_vapp_is_named_in_the_summary() {
    let (_dir, launch, world) = workspace(&LAUNCH.replace("storage_profile: gold", "storage_profile: bronze"));

    launcher_cmd()
        .arg("launch")
        .arg(&launch)
        .arg("--world")
        .arg(&world)
        .args(["--poll-interval", "1", "--retain-on-failure"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vApp web failed: NotFoundError"))
        .stderr(predicate::str::contains("retained"))
        .stderr(predicate::str::contains("1 of 1 vApp(s) failed to launch"));
}

#[test]
fn missing_world_file_is_reported() {
    let (dir, launch, _world) = workspace(LAUNCH);

    launcher_cmd()
        .arg("launch")
        .arg(&launch)
        .arg("--world")
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("World file"));
}
