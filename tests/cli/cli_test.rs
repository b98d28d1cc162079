//! CLI contract tests.

use std::path::Path;

use assert_cmd::Command;

fn plugboard(dir: &Path) -> Command {
    let mut cmd = match Command::cargo_bin("plugboard") {
        Ok(cmd) => cmd,
        Err(err) => panic!("binary should build: {err}"),
    };
    cmd.current_dir(dir)
        .env("PLUGBOARD_CONFIG_PATH", dir.join("absent.toml"))
        .env("PLUGBOARD_STATE_DB", dir.join("state.db"))
        .env_remove("RUST_LOG");
    cmd
}

const REPLAY: &str = r#"{
  "plugs": [
    { "app": "gqrx", "name": "sdr", "interface": "lime-sdr" }
  ],
  "events": [
    {
      "action": "add",
      "devpath": "/sys/devices/pci0000:00/usb1/1-2",
      "devname": "/dev/bus/usb/001/004",
      "subsystem": "usb",
      "attrs": {
        "DEVTYPE": "usb_device",
        "MAJOR": "189",
        "MINOR": "3",
        "ID_VENDOR_ID": "1d50",
        "ID_MODEL_ID": "6108",
        "ID_MODEL": "LimeSDR-USB",
        "ID_SERIAL": "Myriad-RF_LimeSDR-USB_0009"
      }
    },
    { "action": "enumeration-done" }
  ]
}"#;

#[test]
fn device_key_prints_default_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = plugboard(dir.path())
        .args(["device-key", "ID_VENDOR_ID=0403", "ID_MODEL_ID=6001", "ID_SERIAL=A1"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "/0403/6001/A1");
}

#[test]
fn config_loading_is_logged_before_subscriber_setup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = plugboard(dir.path())
        .args(["device-key", "ID_VENDOR_ID=0403", "ID_MODEL_ID=6001", "ID_SERIAL=A1"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no config file found"), "stderr: {stderr}");
}

#[test]
fn device_key_rejects_unidentifiable_device() {
    let dir = tempfile::tempdir().expect("tempdir");
    plugboard(dir.path())
        .args(["device-key", "ID_SERIAL=A1"])
        .assert()
        .failure();
    plugboard(dir.path())
        .args(["device-key", "garbage"])
        .assert()
        .failure();
}

#[test]
fn replay_prints_changes_and_policy_and_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("events.json");
    std::fs::write(&input, REPLAY).expect("write input");

    let output = plugboard(dir.path())
        .arg("replay")
        .arg(&input)
        .args(["--backend", "apparmor"])
        .output()
        .expect("run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = match serde_json::from_slice(&output.stdout) {
        Ok(report) => report,
        Err(err) => panic!("stdout should be JSON: {err}"),
    };
    let changes = report["changes"].as_array().expect("changes array");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["kind"], "hotplug-connect-lime-sdr");
    assert_eq!(changes[0]["status"], "done");

    let policy = report["policy"].as_object().expect("policy object");
    assert_eq!(policy.keys().collect::<Vec<_>>(), ["apparmor"]);
    let snippets = report["policy"]["apparmor"]["snippets"].to_string();
    assert!(snippets.contains("/dev/bus/usb/001/004 rw,"));

    assert!(dir.path().join("state.db").exists());
}

#[test]
fn replay_rejects_unknown_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("events.json");
    std::fs::write(&input, REPLAY).expect("write input");
    plugboard(dir.path())
        .arg("replay")
        .arg(&input)
        .args(["--backend", "selinux"])
        .assert()
        .failure();
}

#[test]
fn replay_reports_unreadable_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    plugboard(dir.path())
        .args(["replay", "missing.json"])
        .assert()
        .failure();
}
