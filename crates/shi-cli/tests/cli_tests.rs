//! CLI end-to-end tests: running a source file, piping a program over
//! stdin, and exit codes (§6).

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn shi_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shi"))
}

#[test]
fn help_flag_succeeds() {
    shi_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shi"));
}

#[test]
fn runs_a_source_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "(write 1 (pr-str (+ 1 2 3)))").unwrap();

    shi_bin()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("6"));
}

#[test]
fn unhandled_error_exits_with_code_one() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "totally-unbound-name").unwrap();

    shi_bin()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unhandled error"));
}

#[test]
fn reads_program_piped_over_stdin() {
    shi_bin()
        .write_stdin("(write 1 (pr-str (+ 40 2)))")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn missing_source_file_is_an_error() {
    shi_bin()
        .arg("/nonexistent/path/does-not-exist.shi")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn trap_error_scenario_from_stdin() {
    shi_bin()
        .write_stdin(r#"(write 1 (trap-error (fn () (error "boom")) (fn (m) m)))"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("boom"));
}
