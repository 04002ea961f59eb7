// CLI tests: each command runs against a fresh snapshot directory

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn cli(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("creator-pipeline").unwrap();
    cmd.current_dir(workdir.path())
        .env("CREATOR_PIPELINE__STORAGE__SNAPSHOT_DIR", workdir.path().join("snapshots"))
        .env("RUST_LOG", "warn");
    cmd
}

fn run_json(workdir: &TempDir, args: &[&str]) -> Value {
    let output = cli(workdir).args(args).assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn test_help_lists_commands() {
    let workdir = TempDir::new().unwrap();
    cli(&workdir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("select-thumbnail"))
        .stdout(predicate::str::contains("declare-winner"))
        .stdout(predicate::str::contains("ab-status"));
}

#[test]
fn test_start_approve_select_declare_flow() {
    let workdir = TempDir::new().unwrap();

    let started = run_json(&workdir, &["start", "coffee brewing", "--platform", "youtube"]);
    assert_eq!(started["status"], "awaiting_approval");
    assert_eq!(started["requires_action"], "script_approval");
    assert_eq!(started["scripts"].as_array().unwrap().len(), 3);
    let workflow_id = started["workflow_id"].as_str().unwrap().to_string();

    let approved = run_json(&workdir, &["approve", &workflow_id]);
    assert_eq!(approved["current_step"], "awaiting_thumbnail_selection");
    let thumbnail_id = approved["thumbnails"][1]["id"].as_str().unwrap().to_string();

    let selected = run_json(&workdir, &["select-thumbnail", &workflow_id, &thumbnail_id]);
    assert_eq!(selected["status"], "ab_testing");

    let ab_status = run_json(&workdir, &["ab-status", &workflow_id]);
    assert_eq!(ab_status["is_running"], true);
    assert_eq!(ab_status["variants"].as_array().unwrap().len(), 3);

    let declared = run_json(&workdir, &["declare-winner", &workflow_id, &thumbnail_id]);
    assert_eq!(declared["status"], "completed");
    assert_eq!(declared["selected_thumbnail_id"], thumbnail_id.as_str());

    let results = run_json(&workdir, &["results", &workflow_id]);
    assert_eq!(results["export_ready"], true);
    assert_eq!(results["experiment"]["was_manual_override"], true);

    let listed = run_json(&workdir, &["list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["workflow_id"], workflow_id.as_str());
}

#[test]
fn test_results_before_completion_fails() {
    let workdir = TempDir::new().unwrap();
    let started = run_json(&workdir, &["start", "knife sharpening"]);
    let workflow_id = started["workflow_id"].as_str().unwrap();

    cli(&workdir)
        .args(["results", workflow_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has not completed yet"));
}

#[test]
fn test_unknown_workflow_is_reported() {
    let workdir = TempDir::new().unwrap();
    cli(&workdir)
        .args(["status", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_thumbnail_is_recorded_as_error() {
    let workdir = TempDir::new().unwrap();
    let started = run_json(&workdir, &["start", "watercolor basics"]);
    let workflow_id = started["workflow_id"].as_str().unwrap().to_string();
    run_json(&workdir, &["approve", &workflow_id]);

    let view = run_json(&workdir, &["select-thumbnail", &workflow_id, "bogus"]);
    assert_eq!(view["status"], "error");
    assert_eq!(view["errors"].as_array().unwrap().len(), 1);
}

#[test]
fn test_refused_requests_keep_completed_workflow_exportable() {
    let workdir = TempDir::new().unwrap();
    let started = run_json(&workdir, &["start", "trail running"]);
    let workflow_id = started["workflow_id"].as_str().unwrap().to_string();
    let approved = run_json(&workdir, &["approve", &workflow_id]);
    let thumbnail_id = approved["thumbnails"][0]["id"].as_str().unwrap().to_string();
    run_json(&workdir, &["select-thumbnail", &workflow_id, &thumbnail_id]);
    run_json(&workdir, &["declare-winner", &workflow_id, &thumbnail_id]);

    cli(&workdir)
        .args(["declare-winner", &workflow_id, "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid thumbnail ID: bogus"));
    cli(&workdir)
        .args(["stop-test", &workflow_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Test not running"));

    let results = run_json(&workdir, &["results", &workflow_id]);
    assert_eq!(results["export_ready"], true);
    assert_eq!(results["winning_thumbnail"]["id"], thumbnail_id.as_str());
}
