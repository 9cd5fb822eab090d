//! Black-box tests of the `txlat` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const PAYMENT_EXIT: &str = "_ZN6ripple7Payment7doApplyEv";

/// A `txlat` command isolated from the caller's configuration.
fn txlat(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("txlat").unwrap();
    cmd.env("XDG_CONFIG_HOME", home)
        .env_remove("TXLAT_CONFIG")
        .env_remove("TXLAT_TIMESLICE")
        .env_remove("TXLAT_DURATION")
        .env_remove("TXLAT_NEGATIVE_DELTA")
        .env_remove("TXLAT_SNAPSHOT_DIR");
    cmd
}

fn write_snapshot(dir: &Path, probe: i64, count: u64) {
    let mut dist = vec![0u64; 64];
    dist[10] = count;
    let mut tecs = vec![0u64; 51];
    tecs[0] = 1;
    let mut negs = vec![0u64; 400];
    negs[1] = 2;
    let body = serde_json::json!({
        "dist": dist,
        "result": [count],
        "tecs": tecs,
        "negs": negs,
    });
    std::fs::write(dir.join(format!("probe-{probe}.json")), body.to_string()).unwrap();
}

#[test]
fn unresolvable_target_is_an_attach_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("probes.db");

    txlat(dir.path())
        .args(["trace", "-c", "abc", "--duration", "1", "--timeslice", "1"])
        .arg("--db")
        .arg(&db)
        .arg("--exe")
        .arg(dir.path().join("no-such-binary"))
        .assert()
        .code(11)
        .stderr(predicate::str::contains("error[21]"));

    assert!(!db.exists());
}

#[test]
fn binary_without_symbols_is_an_attach_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("probes.db");
    let exe = dir.path().join("rippled");
    std::fs::write(&exe, b"nothing to see here").unwrap();

    txlat(dir.path())
        .args(["trace", "-c", "abc", "--duration", "1", "--timeslice", "1"])
        .arg("--db")
        .arg(&db)
        .arg("--exe")
        .arg(&exe)
        .arg("--snapshot-dir")
        .arg(dir.path())
        .assert()
        .code(11)
        .stderr(predicate::str::contains("0 attach points"));

    assert!(!db.exists());
}

#[test]
fn missing_snapshot_is_a_sampling_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("probes.db");
    let exe = dir.path().join("rippled");
    std::fs::write(&exe, format!("\0{PAYMENT_EXIT}\0")).unwrap();

    txlat(dir.path())
        .args(["trace", "-c", "abc", "--duration", "1", "--timeslice", "1"])
        .arg("--db")
        .arg(&db)
        .arg("--exe")
        .arg(&exe)
        .arg("--snapshot-dir")
        .arg(dir.path())
        .assert()
        .code(12)
        .stderr(predicate::str::contains("error[30]"))
        .stderr(predicate::str::contains("no snapshot available for probe 1"));

    txlat(dir.path())
        .arg("collections")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("closed"));
}

#[test]
fn trace_then_report() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("probes.db");
    let exe = dir.path().join("rippled");
    std::fs::write(&exe, format!("\0{PAYMENT_EXIT}\0")).unwrap();
    write_snapshot(dir.path(), 1, 4);
    write_snapshot(dir.path(), 2, 7);

    txlat(dir.path())
        .args(["trace", "-c", "deadbeef", "--timeslice", "1", "--duration", "1"])
        .args(["-t", "v1,nightly"])
        .arg("--db")
        .arg(&db)
        .arg("--exe")
        .arg(&exe)
        .arg("--snapshot-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("collection 1 closed: 1 intervals"));

    txlat(dir.path())
        .arg("collections")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("deadbeef"))
        .stdout(predicate::str::contains("[v1, nightly]"));

    let output = txlat(dir.path())
        .args(["report", "--format", "json"])
        .arg("--db")
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["collection"]["id"], 1);
    assert_eq!(report["collection"]["build_id"], "deadbeef");
    assert_eq!(report["latency_series"].as_array().unwrap().len(), 2);

    txlat(dir.path())
        .args(["report", "--probe", "2"])
        .arg("--db")
        .arg(&db)
        .assert()
        .success();
}

#[test]
fn report_on_missing_database_fails() {
    let dir = TempDir::new().unwrap();

    txlat(dir.path())
        .arg("report")
        .arg("--db")
        .arg(dir.path().join("absent.db"))
        .assert()
        .failure();
}

#[test]
fn config_commands_print_json() {
    let dir = TempDir::new().unwrap();

    let output = txlat(dir.path()).args(["config", "show"]).output().unwrap();
    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["timeslice_secs"], 600);

    txlat(dir.path())
        .args(["config", "schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeslice_secs"));
}

#[test]
fn invalid_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"timeslice_secs": 0}"#).unwrap();

    txlat(dir.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .code(10);
}
