#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

const RUNFILE: &str = r#"{
  "tasks": [
    { "id": "fmt", "run": "echo fmt" },
    { "id": "build", "needs": ["fmt"], "run": "echo \"::set-env ARTIFACT=app-$STAGE\"" },
    { "id": "test", "needs": ["build"], "run": "test \"$ARTIFACT\" = app-prod" },
    { "id": "broken", "run": "exit 3" },
    { "id": "after-broken", "needs": ["broken"], "run": "echo never" }
  ],
  "jobs": [
    { "id": "ci", "tasks": ["build", "test"] }
  ],
  "deployments": [
    { "id": "web", "deploy": "echo deploying", "rollback": "echo rolling back" }
  ]
}"#;

fn bosun(dir: &Path, args: &[&str]) -> Output {
  Command::new(env!("CARGO_BIN_EXE_bosun"))
    .current_dir(dir)
    .args(args)
    .env_remove("RUST_LOG")
    .output()
    .unwrap()
}

fn workspace() -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("bosun.json"), RUNFILE).unwrap();
  dir
}

fn summary(output: &Output) -> Value {
  serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_task_run_succeeds() {
  let dir = workspace();
  let output = bosun(dir.path(), &["task", "test", "-e", "STAGE=prod"]);
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let summary = summary(&output);
  assert_eq!(summary["status"], "success");
  let ids: Vec<&str> = summary["results"]
    .as_array()
    .unwrap()
    .iter()
    .map(|r| r["id"].as_str().unwrap())
    .collect();
  assert_eq!(ids, vec!["fmt", "build", "test"]);
}

#[test]
fn test_env_file_feeds_the_run() {
  let dir = workspace();
  std::fs::write(dir.path().join("prod.env"), "STAGE=prod\n").unwrap();

  let output = bosun(dir.path(), &["task", "test", "--env-file", "prod.env"]);
  assert!(output.status.success());
}

#[test]
fn test_failure_exits_non_zero() {
  let dir = workspace();
  let output = bosun(dir.path(), &["task", "after-broken"]);
  assert_eq!(output.status.code(), Some(1));

  let summary = summary(&output);
  assert_eq!(summary["status"], "failed");
  assert_eq!(summary["results"][1]["status"], "skipped");

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("[task] broken: failed: exited with code 3"));
}

#[test]
fn test_missing_dependency_exits_non_zero() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(
    dir.path().join("bosun.json"),
    r#"{ "tasks": [{ "id": "orphan", "needs": ["ghost"], "run": "true" }] }"#,
  )
  .unwrap();

  let output = bosun(dir.path(), &["task", "orphan"]);
  assert_eq!(output.status.code(), Some(1));

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("orphan needs ghost"));
}

#[test]
fn test_no_targets_exits_non_zero() {
  let dir = workspace();
  assert_eq!(bosun(dir.path(), &["task"]).status.code(), Some(1));
}

#[test]
fn test_unknown_command_exits_non_zero() {
  let dir = workspace();
  assert_eq!(bosun(dir.path(), &["launch"]).status.code(), Some(1));
}

#[test]
fn test_dry_run_prints_order() {
  let dir = workspace();
  let output = bosun(dir.path(), &["task", "test", "--dry-run"]);
  assert!(output.status.success());
  assert_eq!(String::from_utf8_lossy(&output.stdout), "fmt\nbuild\ntest\n");
}

#[test]
fn test_job_and_rollback() {
  let dir = workspace();
  let output = bosun(dir.path(), &["job", "ci", "-e", "STAGE=prod"]);
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let output = bosun(dir.path(), &["rollback", "web"]);
  assert!(output.status.success());
  assert_eq!(summary(&output)["results"][0]["output"]["stdout"], "rolling back\n");

  let output = bosun(dir.path(), &["destroy", "web"]);
  assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_list() {
  let dir = workspace();
  let output = bosun(dir.path(), &["list"]);
  assert!(output.status.success());

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("  build (needs: fmt)"));
  assert!(stdout.contains("  ci [build, test]"));
  assert!(stdout.contains("  web (deploy, rollback)"));
}

#[test]
fn test_runfile_flag() {
  let dir = workspace();
  let other = tempfile::tempdir().unwrap();
  let path = dir.path().join("bosun.json");
  let output = bosun(other.path(), &["-f", path.to_str().unwrap(), "task", "fmt"]);
  assert!(output.status.success());

  let output = bosun(other.path(), &["task", "fmt"]);
  assert_eq!(output.status.code(), Some(1));
}
