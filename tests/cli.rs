//! Command line surface tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    Command::cargo_bin("bundle_orchestrator").unwrap()
}

#[test]
fn help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("bundle"));
}

#[test]
fn start_help_shows_defaults() {
    bin()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--hot"))
        .stdout(predicate::str::contains("8081"))
        .stdout(predicate::str::contains("bundler.toml"));
}

#[test]
fn missing_config_file_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    bin()
        .current_dir(tmp.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Must specify --config or create ./bundler.toml",
        ));
    assert!(!tmp.path().join("_entry").exists());
}

#[test]
fn disabling_every_platform_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("bundler.toml"),
        "command = [\"true\"]\noutput_dir = \"build\"\n",
    )
    .unwrap();

    bin()
        .current_dir(tmp.path())
        .args(["bundle", "--no-android", "--no-ios"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nothing to serve"));
}

#[test]
fn unknown_subcommand_fails() {
    bin().arg("serve").assert().failure();
}
