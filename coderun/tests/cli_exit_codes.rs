//! CLI tests for `coderun`.
//!
//! Spawns the binary and verifies exit codes and the stdout summary for the
//! main success and abort paths.

use std::net::TcpListener;
use std::process::{Command, Output};

use coderun::exit_codes;
use coderun::test_support::{mixed_fixture, write_file};
use mockito::Matcher;
use serde_json::json;

fn coderun(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_coderun"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run coderun")
}

/// A port nothing listens on: bind an ephemeral port, then release it.
fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port.to_string()
}

#[test]
fn missing_run_path_exits_with_resolution_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = coderun(
        temp.path(),
        &["127.0.0.1", &closed_port(), "python", "./missing"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::RESOLUTION));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aborted [resolution]"), "{stdout}");
}

#[test]
fn unreachable_service_exits_with_connection_code() {
    let fixture = mixed_fixture();
    let output = coderun(
        fixture.path(),
        &[
            "127.0.0.1",
            &closed_port(),
            "python",
            ".",
            "-mr",
            "1",
            "--retry-delay-ms",
            "0",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::CONNECTION));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("attempted=0"), "{stdout}");
    assert!(stdout.contains("after 2 attempts"), "{stdout}");
}

#[test]
fn reset_without_lifecycle_command_is_a_usage_error() {
    let fixture = mixed_fixture();
    let output = coderun(
        fixture.path(),
        &["127.0.0.1", &closed_port(), "python", ".", "-rbf", "2"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lifecycle command"), "{stderr}");
}

#[test]
fn unknown_session_kind_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = coderun(temp.path(), &["127.0.0.1", "10000", "ruby", "."]);
    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
}

#[test]
fn full_run_reports_failed_units_and_writes_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_file(temp.path(), "a.py", "ok\n");
    write_file(temp.path(), "b.md", "text\n\n```python\nboom\n```\n");

    let mut server = mockito::Server::new();
    let _create = server
        .mock("POST", "/sessions")
        .with_status(200)
        .with_body(r#"{"session_id":"cli"}"#)
        .create();
    let _ok = server
        .mock("POST", "/sessions/cli/run")
        .match_body(Matcher::PartialJson(json!({ "code": "ok\n" })))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .create();
    let _boom = server
        .mock("POST", "/sessions/cli/run")
        .match_body(Matcher::PartialJson(json!({ "code": "boom\n" })))
        .with_status(200)
        .with_body(r#"{"success":false,"error":{"category":"NameError","message":"boom"}}"#)
        .create();

    let address = server.host_with_port();
    let (host, port) = address.rsplit_once(':').expect("host:port");
    let output = coderun(
        temp.path(),
        &[host, port, "python", ".", "--report-json", "out/report.json"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::UNITS_FAILED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("attempted=2 succeeded=1 failed=1"), "{stdout}");
    assert!(stdout.contains("b.md (block 1): NameError: boom"), "{stdout}");

    let raw = std::fs::read_to_string(temp.path().join("out/report.json")).expect("report");
    let report: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(report["failed"], 1);
    assert_eq!(report["units"][1]["status"], "failed");
}

#[test]
fn unwritable_report_fails_an_otherwise_clean_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_file(temp.path(), "blocker", "not a directory\n");

    let mut server = mockito::Server::new();
    let _create = server
        .mock("POST", "/sessions")
        .with_status(200)
        .with_body(r#"{"session_id":"cli"}"#)
        .create();

    let address = server.host_with_port();
    let (host, port) = address.rsplit_once(':').expect("host:port");
    let output = coderun(
        temp.path(),
        &[host, port, "python", ".", "--report-json", "blocker/report.json"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::REPORT_WRITE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("blocker").count(), 1, "{stderr}");
}
