//! CLI-level integration tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn drydock() -> Command {
    Command::cargo_bin("drydock").unwrap()
}

fn write_demo_suite(dir: &std::path::Path) {
    std::fs::write(
        dir.join("suite.conf"),
        "suite=demo\n\
         library@A@path=lib/a.jar\n\
         library@A@optional=true\n\
         project@P@sourceDirs=src\n\
         project@P@javaCompliance=1.8\n\
         project@P@dependencies=A\n\
         project@Q@sourceDirs=src\n\
         project@Q@javaCompliance=1.8\n\
         project@Q@dependencies=P\n",
    )
    .unwrap();
}

#[test]
fn help_lists_subcommands() {
    drydock()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("canonicalize"))
        .stdout(predicate::str::contains("order"));
}

#[test]
fn order_is_dependency_first() {
    let tmp = TempDir::new().unwrap();
    write_demo_suite(tmp.path());

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("order")
        .assert()
        .success()
        .stdout(predicate::str::diff("P\nQ\n"));
}

#[test]
fn order_with_libraries() {
    let tmp = TempDir::new().unwrap();
    write_demo_suite(tmp.path());

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .args(["order", "--libs"])
        .assert()
        .success()
        .stdout(predicate::str::diff("A\nP\nQ\n"));
}

#[test]
fn order_json_output() {
    let tmp = TempDir::new().unwrap();
    write_demo_suite(tmp.path());

    let output = drydock()
        .args(["-C"])
        .arg(tmp.path())
        .args(["order", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let names: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(names, vec!["P", "Q"]);
}

#[test]
fn graph_emits_dot() {
    let tmp = TempDir::new().unwrap();
    write_demo_suite(tmp.path());

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph"));
}

#[test]
fn self_dependency_rejected_at_query_time() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("suite.conf"),
        "suite=demo\n\
         project@X@sourceDirs=src\n\
         project@X@javaCompliance=1.8\n\
         project@X@dependencies=X\n",
    )
    .unwrap();

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("order")
        .assert()
        .failure()
        .stderr(predicate::str::contains("depends on itself"));
}

#[test]
fn missing_suite_is_an_error() {
    let tmp = TempDir::new().unwrap();

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("order")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no suite.conf"));
}

#[test]
fn malformed_suite_reports_line() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("suite.conf"), "suite=demo\nbroken\n").unwrap();

    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("order")
        .assert()
        .failure()
        .stderr(predicate::str::contains("suite.conf:2"));
}

#[test]
fn canonicalize_exit_reflects_changes() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("suite.conf"),
        "suite=demo\n\
         project@solo@sourceDirs=src\n\
         project@solo@javaCompliance=1.8\n\
         project@solo@dependencies=\n",
    )
    .unwrap();
    let pkg = tmp.path().join("solo/src/solo");
    std::fs::create_dir_all(&pkg).unwrap();
    std::fs::write(pkg.join("Solo.java"), "package solo;\nclass Solo {}\n").unwrap();

    // Already canonical: nothing rewritten, exit status 0.
    drydock()
        .args(["-C"])
        .arg(tmp.path())
        .arg("canonicalize")
        .assert()
        .success();
}
