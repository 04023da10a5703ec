//! Command-line behaviour and exit codes

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tablekit() -> Command {
    Command::cargo_bin("tablekit").unwrap()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

const GAUGES: &str = "\"site\",\"zone\",\"flow\"\n\"Ash\",3,1.5\n\"Birch\",1,2.5\n\"Cedar\",2,0.5\n";

#[test]
fn show_prints_rows_and_schema() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "gauges.csv", GAUGES);

    tablekit()
        .arg("show")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("site").and(predicate::str::contains("Birch")));

    tablekit()
        .args(["show", "--schema-json"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"flow\"").and(predicate::str::contains("Float64")));
}

#[test]
fn convert_to_dbf_and_back_compares_equal() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "gauges.csv", GAUGES);
    let dbf = dir.path().join("gauges.dbf");
    let back = dir.path().join("back.csv");

    tablekit().arg("convert").arg(&input).arg(&dbf).assert().success();
    tablekit()
        .arg("convert")
        .arg(&dbf)
        .arg(&back)
        .arg("--on-the-fly")
        .assert()
        .success();

    tablekit()
        .args(["compare", "--color", "never"])
        .arg(&input)
        .arg(&back)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("0 difference(s)"));
}

#[test]
fn compare_reports_differences_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    let left = write_file(dir.path(), "left.csv", "\"id\",\"value\"\n\"A\",1\n\"B\",2.5\n");
    let right = write_file(dir.path(), "right.csv", "\"id\",\"value\"\n\"A\",1\n\"C\",2.5\n");

    tablekit()
        .args(["compare", "--color", "never"])
        .arg(&left)
        .arg(&right)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("B / C"));
}

#[test]
fn sort_descending_writes_reordered_file() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "gauges.csv", GAUGES);
    let output = dir.path().join("sorted.csv");

    tablekit()
        .arg("sort")
        .arg(&input)
        .arg(&output)
        .args(["--key", "zone:desc"])
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    let ash = text.find("\"Ash\"").unwrap();
    let cedar = text.find("\"Cedar\"").unwrap();
    let birch = text.find("\"Birch\"").unwrap();
    assert!(ash < cedar && cedar < birch);
}

#[test]
fn join_and_copy() {
    let dir = TempDir::new().unwrap();
    let primary = write_file(dir.path(), "gauges.csv", GAUGES);
    let names = write_file(
        dir.path(),
        "names.csv",
        "\"site\",\"river\"\n\"ash\",\"North Fork\"\n\"Cedar\",\"South Fork\"\n",
    );
    let joined = dir.path().join("joined.csv");
    let copied = dir.path().join("copied.csv");

    tablekit()
        .arg("join")
        .arg(&primary)
        .arg(&names)
        .arg(&joined)
        .args(["--key", "site"])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 matched"));

    tablekit()
        .arg("copy")
        .arg(&joined)
        .arg(&copied)
        .args(["--columns", "site,river", "--include", "river=*fork"])
        .assert()
        .success();

    let text = fs::read_to_string(&copied).unwrap();
    assert!(text.starts_with("\"site\",\"river\""));
    assert!(text.contains("\"Ash\",\"North Fork\""));
    assert!(!text.contains("Birch"));
}

#[test]
fn missing_file_exits_with_two() {
    tablekit()
        .args(["show", "does-not-exist.csv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}
