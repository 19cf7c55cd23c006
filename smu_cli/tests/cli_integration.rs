use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config keeping simulated runs fast.
fn write_quick_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[timing]
sample_interval_ms = 0
pause_poll_ms = 10
init_settle_ms = 0
handoff_settle_ms = 1

[waveform]
kind = "sine"
amplitude_v = 1.0
frequency_hz = 1.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn smu(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("smu").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
fn help_prints_usage() {
    Command::cargo_bin("smu")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[rstest]
fn preview_reports_samples_and_duration() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    smu(&cfg)
        .args(["preview", "--waveform", "sine", "--repeat", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2000 samples"))
        .stdout(predicate::str::contains("Total Duration: 2.00 s"));
}

#[rstest]
fn preview_custom_table_drops_bad_rows() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    let table = dir.path().join("table.csv");
    fs::write(&table, "0,1.0\nbad,x\n1,2.0\n").unwrap();
    smu(&cfg)
        .args(["preview", "--waveform", "custom", "--table"])
        .arg(&table)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 samples"))
        .stdout(predicate::str::contains("Total Duration: 1.00 s"));
}

#[rstest]
fn simulated_run_completes() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    smu(&cfg)
        .args(["--simulate", "run", "--frequency", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first: completed"));
}

#[rstest]
fn offline_run_reports_simulated_outcome() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    // Without --simulate and without the hardware feature, links are
    // offline and the run takes the demo path.
    smu(&cfg)
        .args(["run", "--frequency", "2", "--repeat", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first: simulated (duration 2.00 s)"));
}

#[rstest]
fn sequence_runs_both_devices_in_order() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    smu(&cfg)
        .args(["--json", "--simulate", "sequence", "--frequency", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"device\":\"lead\""))
        .stdout(predicate::str::contains("\"device\":\"follow\""));
}

#[rstest]
fn steady_falls_back_on_bad_voltage_text() {
    let dir = tempdir().unwrap();
    let cfg = write_quick_config(&dir);
    smu(&cfg)
        .args(["--simulate", "steady", "--volts", "not-a-number"])
        .assert()
        .success()
        .stdout(predicate::str::contains("steady voltage 0.00 V applied"));
}

#[rstest]
fn invalid_config_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "this is not toml [").unwrap();
    smu(&path)
        .args(["preview"])
        .assert()
        .success()
        .stderr(predicate::str::contains("using defaults"));
}
