// tests/integration_tests.rs
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file should be created");
    file.write_all(contents.as_bytes())
        .expect("temp file should be writable");
    file
}

#[test]
fn test_cli_runs_program_and_prints_summary() {
    let asm = write_temp_file(
        "addi r1, r0, 5\n\
         addi r2, r0, 7\n\
         add  r3, r1, r2\n",
    );

    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg(asm.path())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Cycles"))
        .stdout(predicate::str::contains("IPC"))
        .stdout(predicate::str::contains("ADD R3, R1, R2"));
}

#[test]
fn test_cli_memory_image_preload() {
    let asm = write_temp_file("load r1, 0x100(r0)\nstore r1, 0x101(r0)\n");
    let image = write_temp_file("0x100 42\n");

    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg(asm.path())
        .arg("--memory-image")
        .arg(image.path())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("Instructions Retired: 2"));
}

#[test]
fn test_cli_json_output_is_valid() {
    let asm = write_temp_file(
        "addi r1, r0, 3\n\
         beq  r1, r1, 1\n\
         addi r2, r0, 99\n\
         addi r3, r0, 7\n",
    );

    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    let output = cmd
        .arg("--input")
        .arg(asm.path())
        .arg("--format")
        .arg("json")
        .output()
        .expect("binary should run");
    assert!(output.status.success());

    let doc: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(doc["summary"]["mispredictions"], 1);
    assert_eq!(doc["summary"]["misprediction_rate"], 100.0);
    assert!(doc["timeline"].as_array().is_some_and(|t| !t.is_empty()));
}

#[test]
fn test_cli_missing_input_file_fails() {
    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg("/nonexistent/program.asm")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_cli_parse_error_reports_line_and_fails() {
    let asm = write_temp_file("addi r1, r0, 1\nbogus r2, r3\n");

    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg(asm.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_cli_writes_output_file() {
    let asm = write_temp_file("addi r1, r0, 1\n");
    let out = NamedTempFile::new().expect("temp output file");

    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg(asm.path())
        .arg("--output")
        .arg(out.path())
        .arg("--format")
        .arg("csv")
        .assert()
        .success();

    let written = std::fs::read_to_string(out.path()).expect("output file should exist");
    assert!(written.contains("index,pc,instruction"));
    assert!(written.contains("ADDI R1, R0, 1"));
}

#[test]
fn test_cli_start_address() {
    let asm = write_temp_file("entry: addi r1, r0, 1\n       beq r1, r0, entry\n");

    // Starting at 0x20, the program still assembles and the (not-taken)
    // backward branch resolves against the shifted addresses
    let mut cmd = Command::cargo_bin("tomasim_rust").expect("binary should build");
    cmd.arg("--input")
        .arg(asm.path())
        .arg("--start-address")
        .arg("0x20")
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("0x0020"));
}
