// Runs the rexpp binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn rexpp() -> Command {
    let mut cmd = Command::cargo_bin("rexpp").unwrap();
    cmd.arg("--color").arg("never");
    cmd
}

#[test]
fn expands_standard_input() {
    rexpp()
        .write_stdin("#define X 42\nX\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("//#define X 42 => new named macro[0]"))
        .stdout(predicate::str::is_match("(?m)^42$").unwrap())
        .stderr(predicate::str::contains("rexpp: 0 warnings, 0 errors"));
}

#[test]
fn command_line_defines_come_first() {
    rexpp()
        .arg("-DX=42")
        .write_stdin("X\n")
        .assert()
        .success()
        .stdout(predicate::str::is_match("(?m)^42$").unwrap());
}

#[test]
fn reported_errors_set_the_exit_code() {
    rexpp()
        .write_stdin("#error boom\nstill here\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("still here"))
        .stderr(predicate::str::contains("[ERROR] boom"));
}

#[test]
fn fatal_errors_stop_with_a_diagnostic_code() {
    rexpp()
        .write_stdin("#define X (X)\nX\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rexpp::expand::iteration_limit"));
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nowhere.c");
    rexpp()
        .arg(&missing)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn invalid_options_are_reported() {
    rexpp()
        .arg("-bogus")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid option: '-bogus'"));
}

#[test]
fn dump_json_lists_the_macro_table() {
    rexpp()
        .arg("--dump-json")
        .write_stdin("#define A 1\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("\"key\": \"A\""));
}

#[test]
fn quoted_includes_resolve_next_to_the_including_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("defs.h"), "#define GREETING hello\n").unwrap();
    let main = dir.path().join("main.c");
    fs::write(&main, "#include \"defs.h\"\nGREETING world\n").unwrap();
    rexpp()
        .arg(&main)
        .assert()
        .success()
        .stdout(predicate::str::is_match("(?m)^hello world$").unwrap());
}

#[test]
fn include_folders_resolve_angle_includes() {
    let dir = tempdir().unwrap();
    let inc = dir.path().join("inc");
    fs::create_dir(&inc).unwrap();
    fs::write(inc.join("lib.h"), "#define LIB 7\n").unwrap();
    let main = dir.path().join("main.c");
    fs::write(&main, "#include <lib.h>\nLIB\n").unwrap();
    rexpp()
        .arg(format!("-I{}", inc.display()))
        .arg(&main)
        .assert()
        .success()
        .stdout(predicate::str::is_match("(?m)^7$").unwrap());
}

#[test]
fn self_hosted_directives_give_the_same_output() {
    let input = "#define A 1\n#if A\nyes\n#else\nno\n#endif\n";
    let native = rexpp().write_stdin(input).output().unwrap();
    let hosted = rexpp()
        .arg("--self-hosted")
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(native.status.success());
    assert_eq!(native.stdout, hosted.stdout);
}
