//! Smoke tests -- verify the binary runs and the offline-safe commands work.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Client-side network quality probe"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("netpulse"));
}

#[test]
fn test_run_subcommand_exists() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success();
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success();
}

#[test]
fn test_classify_boundaries() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["classify", "--latency", "50"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Good (3 bars)"));

    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["classify", "--latency", "49"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Excellent (4 bars)"));

    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["classify", "--latency", "200"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Poor (1 bar)"));
}

#[test]
fn test_classify_without_sample_or_offline() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .arg("classify")
        .assert()
        .success()
        .stdout(predicates::str::contains("Unknown (0 bars)"));

    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["classify", "--latency", "10", "--offline"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Disconnected (0 bars)"));
}

#[test]
fn test_config_prints_effective_values() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("netpulse.toml");
    std::fs::write(&path, "[probes]\nnominal_download_bytes = 1234\n").unwrap();

    Command::cargo_bin("netpulse")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicates::str::contains("nominal_download_bytes = 1234"))
        .stdout(predicates::str::contains("latency_url"));
}

#[test]
fn test_missing_explicit_config_fails() {
    Command::cargo_bin("netpulse")
        .unwrap()
        .args(["--config", "/nonexistent/netpulse.toml", "config"])
        .assert()
        .failure();
}
