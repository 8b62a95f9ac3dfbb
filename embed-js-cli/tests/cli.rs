use assert_cmd::Command;
use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use predicates::str::is_empty;
use std::path::Path;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

fn embed_js() -> Command {
  Command::cargo_bin("embed-js").unwrap()
}

#[test]
fn runs_script_with_host_globals() {
  embed_js()
    .arg(fixture("hello.js"))
    .assert()
    .success()
    .stdout("AKING V1.0\nversion is a string\n")
    .stderr(is_empty());
}

#[test]
fn println_writes_strings_and_converts_other_values() {
  embed_js()
    .arg(fixture("print_values.js"))
    .assert()
    .success()
    .stdout("héllo wörld 42 null 1,2 obj\n\u{1F600}\n");
}

#[test]
fn compile_errors_fail_with_location() {
  embed_js()
    .arg(fixture("syntax_error.js"))
    .assert()
    .failure()
    .stdout(is_empty())
    .stderr(contains("syntax_error.js").and(contains("compile error")));
}

#[test]
fn uncaught_exceptions_fail() {
  embed_js()
    .arg(fixture("throws.js"))
    .assert()
    .failure()
    .stdout("before\n")
    .stderr(contains("uncaught exception: Error: boom"));
}

#[test]
fn exceptions_can_be_substituted() {
  embed_js()
    .arg(fixture("throws.js"))
    .arg("--substitute-exceptions")
    .assert()
    .success()
    .stdout("before\n");

  embed_js()
    .arg(fixture("throws.js"))
    .arg("--params")
    .arg(fixture("substitute.json"))
    .assert()
    .success();
}

#[test]
fn drives_scheduled_callback() {
  embed_js()
    .arg(fixture("ticks.js"))
    .args(["--ticks", "3"])
    .assert()
    .success()
    .stdout("tick 0 total 0\ntick 1 total 1\ntick 2 total 3\n");
}

#[test]
fn prints_completion_value() {
  embed_js()
    .arg(fixture("result.js"))
    .arg("--print-result")
    .assert()
    .success()
    .stdout("embed-js\n");
}

#[test]
fn missing_script_is_reported() {
  embed_js()
    .arg(fixture("does_not_exist.js"))
    .assert()
    .failure()
    .stderr(contains("failed to read"));
}
