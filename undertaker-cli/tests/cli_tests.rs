use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const NOW: &str = "2023-11-14T22:13:20Z";

/// c1 exited two hours before NOW, c2 is running
const SNAPSHOT: &str = r#"{
  "containers": [
    {
      "id": "c1",
      "names": ["old-job"],
      "status": "exited",
      "image": { "kind": "reference", "value": "app:latest" },
      "exited_at": 1699992800
    },
    {
      "id": "c2",
      "names": ["web"],
      "status": { "other": "running" },
      "image": { "kind": "id", "value": "imgB" }
    }
  ],
  "images": [
    { "id": "imgA", "repo_tags": ["app:latest"] },
    { "id": "imgB", "repo_tags": ["base:1"] }
  ]
}"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn undertaker() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_undertaker"));
    cmd.env_remove("RUST_LOG").env_remove("DOCKER_HOST");
    cmd
}

#[test]
fn test_help_command() {
    undertaker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reclaims stopped containers"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("reap"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_version_command() {
    undertaker()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("undertaker"));
}

#[test]
fn test_invalid_command() {
    undertaker()
        .arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_plan_help_lists_policy_flags() {
    undertaker()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cexc"))
        .stdout(predicate::str::contains("--iexc"))
        .stdout(predicate::str::contains("--filecexc"))
        .stdout(predicate::str::contains("--fileiexc"))
        .stdout(predicate::str::contains("--wait"));
}

#[test]
fn test_check_valid_patterns() {
    let excludes = write_temp("# keep databases\n^postgres\nredis # cache\n");

    undertaker()
        .args(["check", "--cexc", "^c1$", "--fileiexc"])
        .arg(excludes.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("container excludes: 1"))
        .stdout(predicate::str::contains("image excludes:     2"));
}

#[test]
fn test_check_invalid_pattern() {
    undertaker()
        .args(["check", "--iexc", "(unclosed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pattern [(unclosed]"));
}

#[test]
fn test_missing_pattern_file() {
    undertaker()
        .args(["check", "--filecexc", "/nonexistent/excludes.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read pattern file"));
}

#[test]
fn test_plan_from_snapshot() {
    let snapshot = write_temp(SNAPSHOT);

    undertaker()
        .args(["plan", "--now", NOW, "--wait", "3600", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("rm container [ 0]:"))
        .stdout(predicate::str::contains("old-job"))
        .stdout(predicate::str::contains("rm image     [ 0]:"))
        .stdout(predicate::str::contains("[app:latest]"))
        .stdout(predicate::str::contains("base:1").not());
}

#[test]
fn test_plan_exclude_protects_image() {
    let snapshot = write_temp(SNAPSHOT);

    let output = undertaker()
        .args(["plan", "--json", "--now", NOW, "--cexc", "^c1$", "--snapshot"])
        .arg(snapshot.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["containers"].as_array().unwrap().len(), 0);
    assert_eq!(json["images"].as_array().unwrap().len(), 0);
    assert_eq!(json["in_use"], serde_json::json!(["imgA", "imgB"]));
    assert_eq!(json["stats"]["containers_excluded"], 1);
}

#[test]
fn test_plan_long_wait_retains() {
    let snapshot = write_temp(SNAPSHOT);

    undertaker()
        .args(["plan", "--now", NOW, "--wait", "86400", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("rm container").not())
        .stdout(predicate::str::contains("1 retained"));
}

#[test]
fn test_reap_requires_confirmation() {
    let snapshot = write_temp(SNAPSHOT);

    undertaker()
        .args(["reap", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_reap_snapshot() {
    let snapshot = write_temp(SNAPSHOT);

    undertaker()
        .args(["reap", "--yes", "--now", NOW, "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Removed 1 container(s) and 1 image(s)",
        ));
}

#[test]
fn test_invalid_snapshot_file() {
    let snapshot = write_temp("{ not json");

    undertaker()
        .args(["plan", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid snapshot"));
}

#[test]
fn test_out_of_range_exit_time_in_snapshot() {
    let snapshot = write_temp(
        r#"{ "containers": [{ "id": "c1", "names": [], "status": "exited",
              "image": { "kind": "id", "value": "imgA" },
              "exited_at": 18446744073709551615 }] }"#,
    );

    undertaker()
        .args(["plan", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid snapshot"));
}

#[test]
fn test_plan_lists_inconsistent_records_by_short_id() {
    let snapshot = write_temp(
        r#"{
          "containers": [{
            "id": "4f9a1c2b3d4e5f60718293a4b5c6d7e8",
            "names": ["broken"],
            "status": "exited",
            "image": { "kind": "unavailable", "value": "unparseable FinishedAt" }
          }],
          "images": [{ "id": "imgA", "repo_tags": ["app:latest"] }]
        }"#,
    );

    undertaker()
        .args(["plan", "--now", NOW, "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("rm container").not())
        .stdout(predicate::str::contains("Skipped 1 inconsistent record(s)"))
        .stdout(predicate::str::contains("4f9a1c2b3d4e "))
        .stdout(predicate::str::contains("unparseable FinishedAt"));
}

#[test]
fn test_invalid_now() {
    let snapshot = write_temp(SNAPSHOT);

    undertaker()
        .args(["plan", "--now", "yesterday", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --now"));
}
