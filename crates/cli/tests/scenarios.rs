//! End-to-end scenario tests (spec §8 "Scenarios") driving the compiled
//! `yasn` binary directly: source in, stdout/exit code out.

use std::path::Path;
use std::process::{Command, Output};

fn yasn_bin() -> &'static str {
    env!("CARGO_BIN_EXE_yasn")
}

fn write_source(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run(path: &Path) -> Output {
    Command::new(yasn_bin())
        .arg("run")
        .arg(path)
        .output()
        .expect("failed to spawn yasn")
}

#[test]
fn s1_print_string_literal() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "main.yasn", "function main() -> void:\n  print(\"hi\")\n");
    let out = run(&src);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hi\n");
}

#[test]
fn s2_print_arithmetic() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "main.yasn", "function main() -> void:\n  print(1 + 2)\n");
    let out = run(&src);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "3\n");
}

#[test]
fn s3_length_of_a_global_list() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        &dir,
        "main.yasn",
        "let xs: List[int] = [1, 2, 3]\nfunction main() -> void:\n  print(length(xs))\n",
    );
    let out = run(&src);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "3\n");
}

#[test]
fn s4_assert_equal_succeeds_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write_source(&dir, "ok.yasn", "function main() -> void:\n  assert_equal(2 + 2, 4)\n");
    let out = run(&ok);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let fails = write_source(&dir, "fails.yasn", "function main() -> void:\n  assert_equal(2 + 2, 5)\n");
    let out = run(&fails);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("expected 5, got 4"), "stderr was: {stderr}");
}

#[test]
fn s5_async_task_result() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        &dir,
        "main.yasn",
        "async function slow(n: int) -> int:\n  return n * 2\nfunction main() -> void:\n  let t = slow(7)\n  print(wait(t))\n",
    );
    let out = run(&src);
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "14\n");
}

#[test]
fn s6_cyclic_import_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_source(&dir, "a.yasn", "import \"b\"\nfunction main() -> void:\n  return\n");
    write_source(&dir, "b.yasn", "import \"a\"\n");
    let out = run(&dir.path().join("a.yasn"));
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cyclic import"), "stderr was: {stderr}");
}

#[test]
fn s7_bytecode_round_trip_matches_source_execution() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "main.yasn", "function main() -> void:\n  print(\"hi\")\n");
    let ybc = dir.path().join("main.ybc");

    let build = Command::new(yasn_bin())
        .arg("build")
        .arg(&src)
        .arg("-o")
        .arg(&ybc)
        .output()
        .expect("failed to spawn yasn build");
    assert!(build.status.success());

    let from_source = run(&src);
    let from_bytecode = run(&ybc);
    assert_eq!(from_source.stdout, from_bytecode.stdout);
    assert_eq!(String::from_utf8_lossy(&from_bytecode.stdout), "hi\n");
}
