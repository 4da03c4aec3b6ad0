use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{json, Value};
use wrapio_contracts::{
    WRAPIO_MARSHAL_REPORT_SCHEMA_VERSION, WRAPIO_RUN_REPORT_SCHEMA_VERSION,
    WRAPIO_SETTINGS_SCHEMA_VERSION,
};

fn run_wrapio(args: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_wrapio");
    Command::new(exe)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("WRAPIO_ECHO_COMMAND")
        .env_remove("WRAPIO_BUFFER_CAPACITY")
        .output()
        .expect("run wrapio")
}

fn parse_json_stdout(out: &std::process::Output) -> Value {
    serde_json::from_slice(&out.stdout).expect("parse stdout JSON")
}

fn write_json(path: &Path, v: &Value) {
    std::fs::write(path, serde_json::to_vec(v).expect("encode")).expect("write file");
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn marshal_prints_argv_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    write_json(&config, &json!({"i": "seqs.fasta", "quiet": null}));

    let out = run_wrapio(&["marshal", "--config", arg(&config)]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], WRAPIO_MARSHAL_REPORT_SCHEMA_VERSION);
    assert_eq!(v["program"], "run");
    assert_eq!(v["argv"], json!(["run", "-i", "seqs.fasta", "-quiet"]));
}

#[test]
fn marshal_with_pair_file_and_option_fragments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    let pair = dir.path().join("pair.json");
    write_json(&config, &json!({"C": 4}));
    write_json(&pair, &json!({"b": 62, "F": null}));

    let out = run_wrapio(&[
        "marshal",
        "--config",
        arg(&config),
        "--pair",
        arg(&pair),
        "--option",
        "-+ 16",
        "--program",
        "tbfast",
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v = parse_json_stdout(&out);
    assert_eq!(
        v["argv"],
        json!(["tbfast", "_", "-b", "62", "-F", "_", "-C", "4", "-+", "16"])
    );
}

#[test]
fn custom_pair_key_comes_from_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    let settings = dir.path().join("settings.json");
    write_json(&config, &json!({"inner": {"x": 1}, "y": true}));
    write_json(
        &settings,
        &json!({"schema_version": WRAPIO_SETTINGS_SCHEMA_VERSION, "pair_key": "inner"}),
    );

    let out = run_wrapio(&[
        "marshal",
        "--settings",
        arg(&settings),
        "--config",
        arg(&config),
    ]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse_json_stdout(&out);
    assert_eq!(v["argv"], json!(["run", "_", "-x", "1", "_", "-y", "1"]));
}

#[test]
fn unrenderable_config_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    write_json(&config, &json!({"bad key": 1}));

    let out = run_wrapio(&["marshal", "--config", arg(&config)]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad key"), "stderr:\n{stderr}");
}

#[test]
fn invalid_settings_exit_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = dir.path().join("settings.json");
    write_json(&settings, &json!({"no_such_field": 1}));

    let out = run_wrapio(&["marshal", "--settings", arg(&settings)]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn run_with_missing_library_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lib = dir.path().join("libmissing.so");

    let out = run_wrapio(&["run", "--library", arg(&lib), "--symbol", "disttbfast"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("load library"), "stderr:\n{stderr}");
    assert!(out.stdout.is_empty());
}

fn cc_command() -> (OsString, Vec<String>) {
    let cc = std::env::var_os("WRAPIO_CC").unwrap_or_else(|| OsStr::new("cc").to_os_string());
    let args = std::env::var("WRAPIO_CC_ARGS")
        .unwrap_or_default()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    (cc, args)
}

/// Builds `source` into a shared library inside `dir`.
fn compile_c_library(dir: &Path, name: &str, source: &str) -> PathBuf {
    let src_path = dir.join(format!("{name}.c"));
    let lib_path = dir.join(format!(
        "{}{name}.{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_EXTENSION
    ));
    std::fs::write(&src_path, source).expect("write C source");
    let include = Path::new(env!("CARGO_MANIFEST_DIR")).join("../wrapio/include");

    let (cc, cc_args) = cc_command();
    let out = Command::new(&cc)
        .args(cc_args)
        .arg("-std=c99")
        .arg("-shared")
        .arg("-fPIC")
        .arg("-I")
        .arg(&include)
        .arg(&src_path)
        .arg("-o")
        .arg(&lib_path)
        .output()
        .expect("invoke cc");
    assert!(
        out.status.success(),
        "cc failed\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    lib_path
}

const PLAIN_ROUTINES: &str = r#"
#include <stdio.h>

int plain_ok(int argc, char **argv) {
  printf("ROUTINE-OUT");
  for (int i = 1; i < argc; i++) {
    printf(" %s", argv[i]);
  }
  printf("\n");
  fprintf(stderr, "ROUTINE-ERR\n");
  return 0;
}

int plain_fail(int argc, char **argv) {
  (void)argc;
  fprintf(stderr, "%s: bad input\n", argv[0]);
  return 3;
}

int plain_flood(int argc, char **argv) {
  (void)argc;
  (void)argv;
  for (int i = 0; i < 20000; i++) {
    putchar('x');
  }
  return 3;
}
"#;

const IO_ROUTINES: &str = r#"
#include <string.h>
#include "wrapio.h"

int io_report(int argc, char **argv, const wrapio_io *io) {
  char pad[301];
  memset(pad, 'x', 300);
  pad[300] = 0;
  if (io->abi_version != WRAPIO_IO_ABI_VERSION) {
    return 9;
  }
  if (wrapio_fprintf(io, WRAPIO_STDOUT, "argc=%d last=%s pad=%s\n", argc, argv[argc - 1], pad) < 0) {
    return 8;
  }
  if (wrapio_fprintf(io, WRAPIO_STDERR, "%s: %05.1f%%\n", argv[0], 42.375) < 0) {
    return 7;
  }
  return 0;
}
"#;

struct Fixture {
    dir: tempfile::TempDir,
    lib: PathBuf,
    config: PathBuf,
}

fn fixture(name: &str, source: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let lib = compile_c_library(dir.path(), name, source);
    let config = dir.path().join("config.json");
    write_json(&config, &json!({"i": "a.fa"}));
    Fixture { dir, lib, config }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read capture file")
}

#[test]
#[cfg(unix)]
fn run_plain_captures_routine_output_and_keeps_report_clean() {
    let fx = fixture("plain", PLAIN_ROUTINES);
    let out_path = fx.dir.path().join("out.txt");
    let err_path = fx.dir.path().join("err.txt");

    let out = run_wrapio(&[
        "run",
        "--library",
        arg(&fx.lib),
        "--symbol",
        "plain_ok",
        "--config",
        arg(&fx.config),
        "--stdout",
        arg(&out_path),
        "--stderr",
        arg(&err_path),
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], WRAPIO_RUN_REPORT_SCHEMA_VERSION);
    assert_eq!(v["ok"], true);
    assert_eq!(v["exit_status"], 0);
    assert_eq!(v["argv"], json!(["plain_ok", "-i", "a.fa"]));
    assert_eq!(read(&out_path), "ROUTINE-OUT -i a.fa\n");
    assert_eq!(read(&err_path), "ROUTINE-ERR\n");
    assert!(!String::from_utf8_lossy(&out.stderr).contains("ROUTINE-ERR"));
}

#[test]
#[cfg(unix)]
fn run_append_extends_capture_files() {
    let fx = fixture("plain", PLAIN_ROUTINES);
    let out_path = fx.dir.path().join("out.txt");
    let run = |append: bool| {
        let mut args = vec![
            "run",
            "--library",
            arg(&fx.lib),
            "--symbol",
            "plain_ok",
            "--config",
            arg(&fx.config),
            "--stdout",
            arg(&out_path),
        ];
        if append {
            args.push("--append");
        }
        let out = run_wrapio(&args);
        assert_eq!(out.status.code(), Some(0));
    };

    run(false);
    run(true);
    assert_eq!(read(&out_path), "ROUTINE-OUT -i a.fa\n".repeat(2));
    run(false);
    assert_eq!(read(&out_path), "ROUTINE-OUT -i a.fa\n");
}

#[test]
#[cfg(unix)]
fn run_nonzero_status_exits_1_with_status_in_report() {
    let fx = fixture("plain", PLAIN_ROUTINES);
    let err_path = fx.dir.path().join("err.txt");

    let out = run_wrapio(&[
        "run",
        "--library",
        arg(&fx.lib),
        "--symbol",
        "plain_fail",
        "--config",
        arg(&fx.config),
        "--stderr",
        arg(&err_path),
    ]);
    assert_eq!(out.status.code(), Some(1));
    let v = parse_json_stdout(&out);
    assert_eq!(v["ok"], false);
    assert_eq!(v["exit_status"], 3);
    assert_eq!(v["error"], "plain_fail: abnormal exit code: 3");
    assert_eq!(read(&err_path), "plain_fail: bad input\n");
}

#[test]
#[cfg(target_os = "linux")]
fn run_sink_failure_exits_2_even_with_nonzero_status() {
    let fx = fixture("plain", PLAIN_ROUTINES);

    let out = run_wrapio(&[
        "run",
        "--library",
        arg(&fx.lib),
        "--symbol",
        "plain_flood",
        "--config",
        arg(&fx.config),
        "--stdout",
        "/dev/full",
    ]);
    assert_eq!(out.status.code(), Some(2));
    let v = parse_json_stdout(&out);
    assert_eq!(v["ok"], false);
    assert_eq!(v["exit_status"], 3);
}

#[test]
#[cfg(unix)]
fn run_io_abi_formats_through_host_buffer() {
    let fx = fixture("io", IO_ROUTINES);
    let settings = fx.dir.path().join("settings.json");
    write_json(&settings, &json!({"initial_buffer_capacity": 16}));
    let out_path = fx.dir.path().join("out.txt");
    let err_path = fx.dir.path().join("err.txt");

    let out = run_wrapio(&[
        "run",
        "--settings",
        arg(&settings),
        "--library",
        arg(&fx.lib),
        "--symbol",
        "io_report",
        "--abi",
        "io",
        "--config",
        arg(&fx.config),
        "--stdout",
        arg(&out_path),
        "--stderr",
        arg(&err_path),
    ]);
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v = parse_json_stdout(&out);
    assert_eq!(v["exit_status"], 0);
    assert_eq!(
        read(&out_path),
        format!("argc=3 last=a.fa pad={}\n", "x".repeat(300))
    );
    assert_eq!(read(&err_path), "io_report: 042.4%\n");
}
