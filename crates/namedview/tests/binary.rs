//! Integration tests for the `namedview` binary.
//!
//! Drives the bundled function table over real stdin and stdout and checks
//! exit statuses for clean and fatal session ends.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn closed_stdin_exits_successfully() {
    let mut command = cargo_bin_cmd!("namedview");
    command.write_stdin("");
    command.assert().success().stdout("");
}

#[test]
fn builtin_reduce_answers_on_stdout() {
    let mut command = cargo_bin_cmd!("namedview");
    command.write_stdin(concat!(
        "[\"reset\"]\n",
        "[\"reduce\",[\"builtin.sum\",\"builtin.count\"],[[[\"a\",\"1\"],10],[[\"b\",\"2\"],5]]]\n",
    ));
    command
        .assert()
        .success()
        .stdout("true\n[true,[15,2]]\n");
}

#[test]
fn report_style_can_come_from_the_environment() {
    let mut command = cargo_bin_cmd!("namedview");
    command.env("NAMEDVIEW_ERROR_REPORT", "frame");
    command.write_stdin("[\"reduce\",[\"builtin.sum\"],[[[\"a\",\"1\"],\"x\"]]]\n");
    command.assert().success().stdout(concat!(
        "[\"error\",\"reduce_runtime_error\",",
        "\"expected a number, got \\\"x\\\", func_name=sum, func_mod=builtin\"]\n",
        "[true,[null]]\n",
    ));
}

#[test]
fn unknown_command_exits_with_failure() {
    let mut command = cargo_bin_cmd!("namedview");
    command.write_stdin("[\"explode\"]\n[\"reset\"]\n");
    command
        .assert()
        .code(1)
        .stdout("[\"error\",\"unknown_command\",\"unknown command: explode\"]\n");
}

#[test]
fn invalid_log_filter_is_reported_on_stderr() {
    let mut command = cargo_bin_cmd!("namedview");
    command.args(["--log-filter", "namedview=loudest"]);
    command.write_stdin("");
    command.assert().failure().stderr(contains("invalid log filter"));
}
