use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use ota_core::{config, VerifyStrategy};

fn ota_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ota"));
    cmd.env("HOME", home).env("USERPROFILE", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_config_points_at_init() {
    let home = TempDir::new().expect("home");
    ota_cmd(home.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("ota init"));
}

#[test]
fn init_writes_default_location_and_config_prints_urls() {
    let home = TempDir::new().expect("home");
    ota_cmd(home.path())
        .args(["init", "--owner", "acme", "--repo", "firmware", "--remote-root", "device"])
        .assert()
        .success()
        .stdout(contains("acme/firmware@main"));

    let saved = config::load_at(&config::config_path_at(home.path())).expect("load");
    assert_eq!(saved.remote_root, "device");
    assert_eq!(saved.strategy, VerifyStrategy::CacheThenVerify);

    ota_cmd(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(contains(
            "https://api.github.com/repos/acme/firmware/git/trees/main?recursive=1",
        ))
        .stdout(contains(
            "https://raw.githubusercontent.com/acme/firmware/main/device",
        ));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let home = TempDir::new().expect("home");
    let path = home.path().join("ota.yaml");
    let path_arg = path.to_str().expect("utf-8 path");

    ota_cmd(home.path())
        .args(["--config", path_arg, "init", "--owner", "acme", "--repo", "a"])
        .assert()
        .success();
    ota_cmd(home.path())
        .args(["--config", path_arg, "init", "--owner", "acme", "--repo", "b"])
        .assert()
        .failure()
        .stderr(contains("--force"));
    ota_cmd(home.path())
        .args([
            "--config", path_arg, "init", "--owner", "acme", "--repo", "b", "--strategy",
            "verify-then-fetch", "--force",
        ])
        .assert()
        .success();

    let saved = config::load_at(&path).expect("load");
    assert_eq!(saved.repo.name, "b");
    assert_eq!(saved.strategy, VerifyStrategy::VerifyThenFetch);
}

#[test]
fn init_rejects_unknown_strategy() {
    let home = TempDir::new().expect("home");
    ota_cmd(home.path())
        .args(["init", "--owner", "acme", "--repo", "a", "--strategy", "yolo"])
        .assert()
        .failure()
        .stderr(contains("unknown strategy"));
}

#[test]
fn clear_removes_staging_directory() {
    let home = TempDir::new().expect("home");
    let device = TempDir::new().expect("device");
    let staged = device.path().join("_ota_cache/lib/ota.py");
    fs::create_dir_all(staged.parent().unwrap()).unwrap();
    fs::write(&staged, "staged").unwrap();

    let mut cfg = ota_core::OtaConfig::new("acme", "firmware", "main");
    cfg.local_root = device.path().to_path_buf();
    config::save_at(&config::config_path_at(home.path()), &cfg).expect("save");

    ota_cmd(home.path())
        .arg("clear")
        .assert()
        .success()
        .stdout(contains("removed"));
    assert!(!device.path().join("_ota_cache").exists());

    ota_cmd(home.path())
        .arg("clear")
        .assert()
        .success()
        .stdout(contains("nothing to clear"));
}

#[test]
fn unreachable_host_fails_the_check_and_touches_nothing() {
    let home = TempDir::new().expect("home");
    let device = TempDir::new().expect("device");
    fs::write(device.path().join("main.py"), "print('v1')").unwrap();

    let mut cfg = ota_core::OtaConfig::new("acme", "firmware", "main");
    cfg.local_root = device.path().to_path_buf();
    cfg.api_url = Some("http://127.0.0.1:1/{owner}/{repo}/{branch}".into());
    cfg.raw_url = Some("http://127.0.0.1:1/{owner}/{repo}/{branch}/{path}".into());
    cfg.retry.api_attempts = 1;
    cfg.retry.api_backoff_ms = 0;
    cfg.timeout_secs = 2;
    config::save_at(&config::config_path_at(home.path()), &cfg).expect("save");

    ota_cmd(home.path())
        .arg("update")
        .assert()
        .failure()
        .stderr(contains("update failed"));
    assert_eq!(
        fs::read_to_string(device.path().join("main.py")).unwrap(),
        "print('v1')"
    );
}
