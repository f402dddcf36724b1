//! The `edge-agent` binary: exit status on startup failure and `--check`.

use std::fs;
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_edge-agent");

fn run(config: &str, extra: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edge-agent.toml");
    fs::write(&path, config).unwrap();
    Command::new(BIN)
        .arg("--config")
        .arg(&path)
        .args(extra)
        .env_remove("EDGE_AGENT_HARDWARE_MODE")
        .env_remove("EDGE_AGENT_BACKEND_URL")
        .current_dir(dir.path())
        .output()
        .unwrap()
}

const REAL_WITHOUT_DEVICE: &str = r#"
    [hardware]
    mode = "real"
    sysfs_root = "/nonexistent/edge-agent-sysfs"

    [[channels]]
    id = "tank_temp"
    direction = "input"
    path = "bus/iio/devices/iio:device0/in_temp0_raw"
"#;

#[test]
fn hardware_connect_failure_exits_non_zero() {
    let out = run(REAL_WITHOUT_DEVICE, &[]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("hardware unavailable at startup"), "{stderr}");
}

#[test]
fn check_accepts_valid_config_without_connecting() {
    let out = run(REAL_WITHOUT_DEVICE, &["--check"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn invalid_config_exits_non_zero() {
    let out = run("[sensors]\npoll_interval_ms = 0\n", &["--check"]);
    assert!(!out.status.success());
}
