//! CLI Integration Tests
//!
//! Runs the extdev binary against a throwaway `EXTDEV_HOME`.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use extdev_core::{Browser, InstanceRecord, InstanceStatus, Registry};
use tempfile::TempDir;

fn run_extdev(args: &[&str], home: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_extdev"))
        .args(args)
        .current_dir(home)
        .env("EXTDEV_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to run extdev command")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn record(id: &str, pid: u32, port: u16, start_time: u64, status: InstanceStatus) -> InstanceRecord {
    InstanceRecord {
        instance_id: id.to_string(),
        process_id: pid,
        port,
        web_socket_port: port + 1000,
        browser: Browser::Chrome,
        manager_extension_id: "abcdefghijklmnopabcdefghijklmnop".to_string(),
        extension_id: None,
        profile_path: format!("/tmp/profiles/chrome-{id}").into(),
        project_path: "/tmp/project".into(),
        start_time,
        status,
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn seed(home: &Path, records: Vec<InstanceRecord>) {
    let mut registry = Registry::default();
    for r in records {
        registry.insert(r);
    }
    fs::write(
        home.join("instances.json"),
        serde_json::to_string_pretty(&registry).unwrap(),
    )
    .unwrap();
}

#[test]
fn version_flag_prints_package_version() {
    let temp = TempDir::new().unwrap();
    let output = run_extdev(&["--version"], temp.path());
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn instances_on_empty_home() {
    let temp = TempDir::new().unwrap();
    let output = run_extdev(&["instances"], temp.path());
    assert!(output.status.success(), "{output:?}");
    let out = stdout(&output);
    assert!(out.contains("No running instances."), "{out}");
    assert!(out.contains("0 total"), "{out}");
}

#[test]
fn cleanup_marks_dead_and_drops_terminal_records() {
    let temp = TempDir::new().unwrap();
    let now = now_ms();
    seed(
        temp.path(),
        vec![
            record("deadproc0001", 0, 8080, now, InstanceStatus::Running),
            record("finished0001", 0, 8081, now, InstanceStatus::Terminated),
        ],
    );

    let listed = run_extdev(&["instances"], temp.path());
    assert!(stdout(&listed).contains("deadproc0001"));
    assert!(!stdout(&listed).contains("finished0001"));

    let output = run_extdev(&["cleanup"], temp.path());
    assert!(output.status.success(), "{output:?}");
    let out = stdout(&output);
    assert!(out.contains("Removed 1 instance record(s)"), "{out}");
    assert!(out.contains("marked 1 dead instance(s) terminated"), "{out}");

    let all = run_extdev(&["instances", "--all"], temp.path());
    let out = stdout(&all);
    assert!(out.contains("deadproc0001"), "{out}");
    assert!(out.contains("terminated"), "{out}");
    assert!(!out.contains("finished0001"), "{out}");
}

#[test]
fn install_addon_reports_connection_failure() {
    let temp = TempDir::new().unwrap();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let output = run_extdev(
        &["install-addon", "--port", &port.to_string(), "."],
        temp.path(),
    );
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}
