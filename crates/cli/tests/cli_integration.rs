//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `marrow` binary against scripts written
//! into temporary directories, checking exit codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn marrow() -> Command {
    let mut cmd = cargo_bin_cmd!("marrow");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Write `src` to `<dir>/<name>` and return the path.
fn script(dir: &TempDir, name: &str, src: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, src).expect("write script");
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    marrow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Marrow scripting language runner"));
}

#[test]
fn version_exits_0() {
    marrow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("marrow"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    marrow().assert().failure();
}

// ──────────────────────────────────────────────
// 2. run
// ──────────────────────────────────────────────

#[test]
fn run_prints_program_output() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "loop.mrw",
        "march i from 1 to 3 =>\n  print \"Number: \" + i\nend\n",
    );
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("Number: 1\nNumber: 2\nNumber: 3\n")
        .stderr("");
}

#[test]
fn run_reports_runtime_error_with_file_and_line() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "immutable.mrw",
        "print \"before\"\nimmutable x = 5\nx := 6\nprint \"after\"\n",
    );
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stdout("before\n")
        .stderr(
            predicate::str::starts_with("error: ")
                .and(predicate::str::contains("immutable.mrw:3: "))
                .and(predicate::str::contains("'x'")),
        );
}

#[test]
fn run_reports_capability_gate_at_parse_time() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "route.mrw", "route \"/x\" =>\n  respond \"hi\"\nend\n");
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stdout("")
        .stderr(
            predicate::str::contains("route.mrw:1:1:")
                .and(predicate::str::contains("'route'"))
                .and(predicate::str::contains("'web'")),
        );
}

#[test]
fn run_reads_answers_from_stdin() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "ask.mrw",
        "immutable name = ask \"Name: \"\nprint \"hi \", name\n",
    );
    marrow()
        .arg("run")
        .arg(&path)
        .write_stdin("Ada\n")
        .assert()
        .success()
        .stdout("Name: hi Ada\n");
}

#[test]
fn run_quiet_suppresses_output_and_diagnostics() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "fail.mrw", "print 1\nprint 1 / 0\n");
    marrow()
        .args(["--quiet", "run"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout("")
        .stderr("");
}

#[test]
fn run_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    marrow()
        .arg("run")
        .arg(dir.path().join("absent.mrw"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read file"));
}

#[test]
fn run_declared_route_without_port_exits_cleanly() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "service.mrw",
        "declare web\nroute \"/hello\" =>\n  respond \"hi\"\nend\nprint \"registered\"\n",
    );
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("registered\n");
}

// ──────────────────────────────────────────────
// 3. check
// ──────────────────────────────────────────────

#[test]
fn check_valid_script_prints_ok() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "ok.mrw", "immutable x = 5\nx := 6\n");
    // Parsing only: the immutable assignment is a runtime error.
    marrow()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout("ok\n");
}

#[test]
fn check_reports_syntax_error() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "bad.mrw", "print 1\neach x in =>\nend\n");
    marrow()
        .arg("check")
        .arg(&path)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("error: ").and(predicate::str::contains("bad.mrw:2:")));
}

#[test]
fn check_json_output_serializes_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "bad.mrw", "mutable x = @\n");
    let output = marrow()
        .args(["--output", "json", "check"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["kind"], "invalid_character");
    assert_eq!(err["location"]["line"], 1);
    assert_eq!(err["location"]["column"], 13);
    assert!(err["file"].as_str().unwrap().ends_with("bad.mrw"));
    assert!(err["message"].as_str().unwrap().contains("'@'"));
}

#[test]
fn check_json_output_on_success() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "ok.mrw", "declare time\nprint now()\nprint 2\n");
    let output = marrow()
        .args(["check", "--output", "json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], true);
    assert_eq!(report["declarations"], 1);
    assert_eq!(report["statements"], 2);
}

// ──────────────────────────────────────────────
// 4. Config
// ──────────────────────────────────────────────

const RECURSIVE: &str = "task down(n) =>\n  down(n + 1)\nend\ndown(0)\n";

#[test]
fn config_beside_script_is_applied() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "deep.mrw", RECURSIVE);
    fs::write(dir.path().join("marrow.toml"), "[engine]\nmax_call_depth = 4\n").unwrap();
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("call depth limit of 4 exceeded"));
}

#[test]
fn default_call_depth_is_reachable() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "deep.mrw",
        "task down(n) =>\n  if n < 127 =>\n    down(n + 1)\n  else =>\n    n\n  end\nend\nprint down(1)\n",
    );
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("127\n")
        .stderr("");
}

#[test]
fn default_call_depth_is_enforced() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "deep.mrw", RECURSIVE);
    marrow()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("call depth limit of 128 exceeded"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.mrw", "print \"hello\"\n");
    marrow()
        .arg("run")
        .arg(&path)
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("cannot read config"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.mrw", "print \"hello\"\n");
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[engine]\necho = \"loud\"\n").unwrap();
    marrow()
        .args(["run", "--config"])
        .arg(&config)
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn config_can_disable_echo() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.mrw", "print \"hello\"\n");
    fs::write(dir.path().join("marrow.toml"), "[engine]\necho = false\n").unwrap();
    marrow().arg("run").arg(&path).assert().success().stdout("");
}
