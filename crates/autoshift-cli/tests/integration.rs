#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn autoshift(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("autoshift").unwrap();
    cmd.current_dir(dir.path()).env_remove("AUTOSHIFT_CONFIG");
    cmd
}

/// Config whose status and remediation are local shell one-liners.
fn write_config(dir: &TempDir, status: &str, remediation: &str, login_check: Option<&str>) {
    write_config_with_post_install(dir, status, remediation, login_check, None);
}

fn write_config_with_post_install(
    dir: &TempDir,
    status: &str,
    remediation: &str,
    login_check: Option<&str>,
    post_install: Option<&str>,
) {
    let login = match login_check {
        Some(script) => format!("login_check:\n  program: sh\n  args: ['-c', '{script}']\n"),
        None => "login_check: null\n".to_string(),
    };
    let post = match post_install {
        Some(script) => format!("post_install:\n  program: sh\n  args: ['-c', '{script}']\n"),
        None => "post_install: null\n".to_string(),
    };
    let yaml = format!(
        "readiness:\n  target_status: Running\n  poll_interval_secs: 1\n\
         status_command:\n  program: sh\n  args: ['-c', '{status}']\n\
         remediation_command:\n  program: sh\n  args: ['-c', '{remediation}']\n\
         {login}{post}"
    );
    std::fs::write(dir.path().join("autoshift.yaml"), yaml).unwrap();
}

/// Puts a fake `oc` that echoes its arguments first on PATH.
fn with_fake_oc(cmd: &mut Command, dir: &TempDir, exit_code: i32) {
    use std::os::unix::fs::PermissionsExt;
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let oc = bin.join("oc");
    std::fs::write(&oc, format!("#!/bin/sh\necho \"oc-args: $*\"\nexit {exit_code}\n")).unwrap();
    std::fs::set_permissions(&oc, std::fs::Permissions::from_mode(0o755)).unwrap();
    let path = std::env::var("PATH").unwrap_or_default();
    cmd.env("PATH", format!("{}:{path}", bin.display()));
}

// ---------------------------------------------------------------------------
// autoshift init / check
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote autoshift.yaml"));

    let content = std::fs::read_to_string(dir.path().join("autoshift.yaml")).unwrap();
    assert!(content.contains("target_status: Running"));
    assert!(content.contains("multiclusterhub"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir).arg("init").assert().success();
    autoshift(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    autoshift(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn init_can_select_gitops_post_install() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir)
        .args(["init", "--post-install", "gitops"])
        .assert()
        .success();
    let content = std::fs::read_to_string(dir.path().join("autoshift.yaml")).unwrap();
    assert!(content.contains("helm"));
    assert!(content.contains("openshift-gitops"));

    autoshift(&dir)
        .args(["init", "--force", "--post-install", "none"])
        .assert()
        .success();
    let content = std::fs::read_to_string(dir.path().join("autoshift.yaml")).unwrap();
    assert!(content.contains("post_install: null"));
}

#[test]
fn check_accepts_default_config() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir).arg("init").assert().success();
    autoshift(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn check_rejects_zero_interval() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("autoshift.yaml"),
        "readiness:\n  poll_interval_secs: 0\n",
    )
    .unwrap();
    autoshift(&dir)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("poll interval"))
        .stderr(predicate::str::contains("1 error(s)"));
}

#[test]
fn missing_config_points_at_init() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("autoshift init"));
}

#[test]
fn config_flag_overrides_default_path() {
    let dir = TempDir::new().unwrap();
    autoshift(&dir)
        .args(["--config", "custom.yaml", "init"])
        .assert()
        .success();
    assert!(dir.path().join("custom.yaml").exists());
    assert!(!dir.path().join("autoshift.yaml").exists());
}

// ---------------------------------------------------------------------------
// autoshift status
// ---------------------------------------------------------------------------

#[test]
fn status_prints_current_value() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Installing", "true", None);
    autoshift(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installing"));
}

#[test]
fn status_json_reports_readiness() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "true", None);
    let out = autoshift(&dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["status"], "Running");
    assert_eq!(value["ready"], true);
}

#[test]
fn status_maps_missing_resource_to_absent_status() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "echo Error from server NotFound >&2; exit 1",
        "true",
        None,
    );
    autoshift(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("NotInstalled"));
}

// ---------------------------------------------------------------------------
// autoshift install
// ---------------------------------------------------------------------------

#[test]
fn install_skips_remediation_when_already_ready() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "touch remediated", None);
    autoshift(&dir)
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("status: Running"))
        .stdout(predicate::str::contains("bootstrap not needed"));
    assert!(!dir.path().join("remediated").exists());
}

#[test]
fn install_runs_remediation_until_ready() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "cat phase 2>/dev/null || printf Installing",
        "echo bootstrapping; printf Running > phase",
        None,
    );
    autoshift(&dir)
        .args(["install", "--timeout", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: Installing"))
        .stdout(predicate::str::contains("bootstrapping"))
        .stdout(predicate::str::contains("Installation complete"));
}

#[test]
fn install_times_out_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Installing", "true", None);
    autoshift(&dir)
        .args(["install", "--timeout", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timed out"));
}

#[test]
fn install_json_reports_outcome() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "true", None);
    let assert = autoshift(&dir)
        .args(["install", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("status: Running"));
    let out = assert.get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["state"], "succeeded");
    assert_eq!(value["run"]["triggered"], false);
}

#[test]
fn install_requires_login() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "true", Some("exit 1"));
    autoshift(&dir)
        .arg("install")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn install_skip_login_check_bypasses_preflight() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "true", Some("exit 1"));
    autoshift(&dir)
        .args(["install", "--skip-login-check"])
        .assert()
        .success();
}

#[test]
fn install_writes_session_log() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "printf Running", "true", None);
    autoshift(&dir)
        .args(["install", "--log-dir", "logs"])
        .assert()
        .success();

    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let content = std::fs::read_to_string(&logs[0]).unwrap();
    assert!(content.contains("status: Running"));
}

#[test]
fn install_runs_post_install_once_ready() {
    let dir = TempDir::new().unwrap();
    write_config_with_post_install(
        &dir,
        "printf Running",
        "true",
        None,
        Some("echo installing-autoshift; touch installed"),
    );
    autoshift(&dir)
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("installing-autoshift"));
    assert!(dir.path().join("installed").exists());
}

#[test]
fn install_skip_post_install_stops_at_ready() {
    let dir = TempDir::new().unwrap();
    write_config_with_post_install(&dir, "printf Running", "true", None, Some("touch installed"));
    autoshift(&dir)
        .args(["install", "--skip-post-install"])
        .assert()
        .success();
    assert!(!dir.path().join("installed").exists());
}

#[test]
fn post_install_does_not_run_after_timeout() {
    let dir = TempDir::new().unwrap();
    write_config_with_post_install(
        &dir,
        "printf Installing",
        "true",
        None,
        Some("touch installed"),
    );
    autoshift(&dir)
        .args(["install", "--timeout", "1"])
        .assert()
        .code(1);
    assert!(!dir.path().join("installed").exists());
}

#[test]
fn failing_post_install_fails_install() {
    let dir = TempDir::new().unwrap();
    write_config_with_post_install(&dir, "printf Running", "true", None, Some("exit 4"));
    autoshift(&dir)
        .arg("install")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("install step failed"));
}

// ---------------------------------------------------------------------------
// autoshift login / logout
// ---------------------------------------------------------------------------

#[test]
fn login_passes_server_and_credentials_to_oc() {
    let dir = TempDir::new().unwrap();
    let mut cmd = autoshift(&dir);
    with_fake_oc(&mut cmd, &dir, 0);
    cmd.args([
        "login",
        "--server",
        "https://api.hub.example.com:6443",
        "--username",
        "kubeadmin",
    ])
    .env("AUTOSHIFT_PASSWORD", "s3cret")
    .assert()
    .success()
    .stdout(predicate::str::contains(
        "oc-args: login https://api.hub.example.com:6443 --username=kubeadmin --password=s3cret",
    ));
}

#[test]
fn failed_login_reports_server() {
    let dir = TempDir::new().unwrap();
    let mut cmd = autoshift(&dir);
    with_fake_oc(&mut cmd, &dir, 1);
    cmd.args([
        "login",
        "--server",
        "https://api.hub.example.com:6443",
        "-u",
        "kubeadmin",
        "--password",
        "wrong",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
        "login to https://api.hub.example.com:6443 as kubeadmin failed",
    ));
}

#[test]
fn logout_runs_oc_logout() {
    let dir = TempDir::new().unwrap();
    let mut cmd = autoshift(&dir);
    with_fake_oc(&mut cmd, &dir, 0);
    cmd.arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("oc-args: logout"));
}
