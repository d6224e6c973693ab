mod common;

use common::{CrimsonProcess, write_file};

#[test]
fn version_human() {
    let output = CrimsonProcess::spawn_command(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("crimson "), "stdout: {stdout}");
    assert!(stdout.contains('.'), "stdout: {stdout}");
}

#[test]
fn version_json() {
    let output = CrimsonProcess::spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "crimson");
    assert!(parsed.get("version").is_some());
}

#[test]
fn completions_for_each_shell() {
    for shell in ["bash", "zsh", "fish", "powershell", "elvish"] {
        let output = CrimsonProcess::spawn_command(&["completions", shell]);
        assert!(output.status.success(), "completions {shell} failed");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("crimson"), "{shell} script: {stdout}");
    }
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = CrimsonProcess::spawn_command(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("frobnicate"), "stderr: {stderr}");
}

#[test]
fn bad_flag_value_is_usage_error() {
    let output = CrimsonProcess::spawn_command(&["run", "--port", "not-a-port"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn help_exits_cleanly() {
    let output = CrimsonProcess::spawn_command(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("check-aof"), "stdout: {stdout}");
}

#[test]
fn check_aof_clean_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ok.aof");
    write_file(
        &path,
        b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n",
    );

    let output =
        CrimsonProcess::spawn_command(&["check-aof", path.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "clean");
    assert_eq!(report["commands"], 2);
}

#[test]
fn check_aof_reports_corruption_offset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.aof");
    write_file(&path, b"*1\r\n$4\r\nPING\r\n$x\r\n");

    let output =
        CrimsonProcess::spawn_command(&["check-aof", path.to_str().unwrap(), "--format", "json"]);
    assert_eq!(output.status.code(), Some(5));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "corrupt");
    assert_eq!(report["offset"], 14);
    assert_eq!(report["commands"], 1);
}

#[test]
fn check_aof_missing_file() {
    let output = CrimsonProcess::spawn_command(&["check-aof", "/nonexistent/appendonly.aof"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn invalid_config_file_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crimson.yaml");
    write_file(&path, b"port: 6380\nmax_clients: 0\n");

    let output = CrimsonProcess::spawn_command(&["run", "--config", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("max_clients"), "stderr: {stderr}");
}

#[test]
fn unknown_config_field_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crimson.yaml");
    write_file(&path, b"maxclients: 5\n");

    let output = CrimsonProcess::spawn_command(&["run", "--config", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn config_file_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crimson.yaml");
    write_file(&path, b"expire_interval: 50ms\nmax_clients: 4\n");

    let config = path.to_str().unwrap().to_string();
    let server = CrimsonProcess::spawn(&["--config", &config]).await;
    let mut c = server.client().await;
    assert_eq!(
        c.cmd(&["PING", "configured"]).await,
        common::bulk("configured")
    );
    assert_eq!(server.shutdown().await, Some(0));
}
