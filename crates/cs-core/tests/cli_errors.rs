//! CLI surface tests: argument validation and exit-code mapping. These
//! exercise only error paths so they never touch real services.

use assert_cmd::Command;
use predicates::prelude::*;

fn csctl() -> Command {
    Command::cargo_bin("csctl").unwrap()
}

#[test]
fn help_lists_subcommands() {
    csctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("registry"));
}

#[test]
fn unknown_subcommand_fails() {
    csctl().arg("frobnicate").assert().failure().code(1);
}

#[test]
fn show_requires_a_name() {
    csctl().arg("show").assert().failure().code(1);
}

#[test]
fn add_requires_a_mode_flag() {
    csctl()
        .args(["add", "cstask-1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--single"));
}

#[test]
fn add_rejects_conflicting_mode_flags() {
    csctl()
        .args(["add", "cstask-1", "--single", "--between", "1-3"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn malformed_range_is_a_usage_error() {
    // Range parsing happens before any filesystem write.
    csctl()
        .args(["add", "cstask", "--between", "5-3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("range"));
}

#[test]
fn missing_config_file_is_a_usage_error() {
    csctl()
        .args(["--config", "/nonexistent/csctl.toml", "status"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn aborting_errors_are_never_silent_at_default_verbosity() {
    // No -v flags, no CSCTL_LOG: the status line must still appear.
    csctl()
        .env_remove("CSCTL_LOG")
        .args(["add", "cstask-1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty().not());
}

#[test]
fn registry_register_needs_all_three_fields() {
    csctl()
        .args(["registry", "--component", "task"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn group_conflicts_with_positional_name() {
    csctl()
        .args(["stop", "cstask-1", "--group", "cstask"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn quiet_conflicts_with_verbose() {
    csctl()
        .args(["status", "-q", "-v"])
        .assert()
        .failure()
        .code(1);
}
