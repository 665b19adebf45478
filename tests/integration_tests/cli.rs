//! Integration tests for the zoneprof binary.

use std::path::Path;
use std::process::{Command, Output};

use prost::Message;
use serde_json::Value;
use zoneprof::output::xplane::XSpace;

const CAPTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/testdata/capture.json");

fn zoneprof(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zoneprof"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run zoneprof")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// The default run prints the summary and nothing else.
#[test]
fn test_summary_on_stdout() {
    let output = zoneprof(&[CAPTURE]);
    assert!(output.status.success(), "zoneprof should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[CAPTURE] Name = matmul"), "{stdout}");
    assert!(stdout.contains("[CAPTURE] CpuArch = x86_64"), "{stdout}");
    assert!(stdout.contains("[CPU] Zones = 5"), "{stdout}");
    assert!(stdout.contains("[GPU] Zones = 1"), "{stdout}");

    // Ties keep declaration order: compile before invoke
    let compile = stdout.find("compile").unwrap();
    let invoke = stdout.find("invoke").unwrap();
    let dispatch = stdout.find("dispatch_matmul").unwrap();
    assert!(compile < invoke && invoke < dispatch, "{stdout}");
    assert!(stdout.contains("4.000ms (42.1%)"), "{stdout}");
}

#[test]
fn test_filters_and_unit() {
    let output = zoneprof(&[CAPTURE, "--zone", "dispatch", "--thread", "work", "--unit", "us"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("compile"), "{stdout}");
    assert!(!stdout.contains("main"), "{stdout}");
    // Worker runs dispatch_matmul for 1.5ms, its busiest zone
    assert!(stdout.contains("1500.000us (100.0%)"), "{stdout}");
}

#[test]
fn test_writes_timeline_and_flat_files() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = dir.path().join("trace.json");
    let flat = dir.path().join("trace.pb");

    let output = zoneprof(&[
        CAPTURE,
        "--no-stdout",
        "--output-timeline",
        path_arg(&timeline),
        "--output-flat",
        path_arg(&flat),
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "--no-stdout should print nothing");

    let events: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&timeline).unwrap()).unwrap();
    let begins = events.iter().filter(|e| e["ph"] == "B").count();
    let ends = events.iter().filter(|e| e["ph"] == "E").count();
    assert_eq!((begins, ends), (6, 6));
    assert_eq!(events[0]["args"]["name"], "matmul");

    let space = XSpace::decode(std::fs::read(&flat).unwrap().as_slice()).unwrap();
    let plane = &space.planes[0];
    assert_eq!(plane.event_metadata.len(), 3);
    let lines: Vec<_> = plane.lines.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(lines, vec!["main", "worker", "compute queue"]);
    // 4ms compile event, in picoseconds
    assert_eq!(plane.lines[0].events[0].duration_ps, 4_000_000_000);
}

/// A failing exporter is reported but doesn't stop the others.
#[test]
fn test_unwritable_output_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = dir.path().join("missing").join("trace.json");
    let flat = dir.path().join("trace.pb");

    let output = zoneprof(&[
        CAPTURE,
        "--output-timeline",
        path_arg(&timeline),
        "--output-flat",
        path_arg(&flat),
    ]);
    assert!(output.status.success(), "Export failures should not fail the run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timeline export failed"), "{stderr}");
    assert!(flat.exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[CAPTURE]"));
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("zoneprof.toml");
    let timeline = dir.path().join("from-config.json");
    std::fs::write(
        &config,
        format!(
            "timeline-file = {:?}\nstdout = false\n",
            path_arg(&timeline)
        ),
    )
    .unwrap();

    let output = zoneprof(&[CAPTURE, "--config", path_arg(&config)]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(timeline.exists());
}

#[test]
fn test_missing_capture() {
    let output = zoneprof(&["/nonexistent/capture.json"]);
    assert!(!output.status.success(), "Should fail with non-existent file");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not load capture"), "{stderr}");
}

#[test]
fn test_invalid_capture() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("bad.json");
    std::fs::write(
        &capture,
        r#"{"threads": [{"id": 1, "timeline": {"storage": "inline", "events": [{"zone": 5, "start": 0, "end": 1}]}}]}"#,
    )
    .unwrap();

    let output = zoneprof(&[path_arg(&capture)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown zone 5"), "{stderr}");
}
