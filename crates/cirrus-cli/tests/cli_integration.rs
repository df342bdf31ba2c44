//! End-to-end tests that run the compiled `cirrus` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cirrus_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cirrus"))
}

fn write_source(dir: &Path, name: &str, src: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, src).expect("write source");
    path
}

fn run(args: &[&str]) -> Output {
    cirrus_bin().args(args).output().expect("run binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const STACK: &str = r#"
import { Bucket } from "./sdk";

const stage = process.env.STAGE ? 'prod' : 'dev';
export const name = `site-${stage}`;
export const bucket = new Bucket(name);

export function tags(owner = 'ops', ...extra) {
  return [owner, ...extra].join(',');
}

export class Site {
  constructor(domain) { this.domain = domain; }
  url() { return 'https://' + this.domain; }
}
"#;

#[test]
fn cli_solve_prints_exports() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["solve", file.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "cirrus solve should succeed, stderr: {}",
        stderr(&output)
    );
    let out = stdout(&output);
    assert!(
        out.contains("name = union('site-prod' | 'site-dev')"),
        "stdout should list the name export: {out}"
    );
    assert!(out.contains("bucket = <unknown>"), "stdout: {out}");
    assert!(out.contains("tags = <fn tags/0>"), "stdout: {out}");
}

#[test]
fn cli_solve_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["solve", file.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("parse json output");
    assert_eq!(json["name"]["$union"][0], "site-prod");
    assert_eq!(json["bucket"]["$unknown"], true);
}

#[test]
fn cli_strict_imports_reports_the_import() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["solve", file.to_str().unwrap(), "--strict-imports"]);
    assert!(!output.status.success(), "strict solve should fail");
    let err = stderr(&output);
    assert!(
        err.contains("error:") && err.contains("identifier `Bucket` has not been declared"),
        "stderr should carry the diagnostic: {err}"
    );
    assert!(err.contains("stack.ts:6:"), "stderr should locate the read: {err}");
}

#[test]
fn cli_invoke_with_json_arguments() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);
    let path = file.to_str().unwrap();

    let output = run(&["invoke", path, "tags"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "'ops'");

    let output = run(&["invoke", path, "tags", r#""dev""#, r#""web""#, "2"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "'dev,web,2'");
}

#[test]
fn cli_invoke_rejects_bad_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["invoke", file.to_str().unwrap(), "tags", "{oops"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("is not valid JSON"), "stderr: {}", stderr(&output));
}

#[test]
fn cli_instance() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["instance", file.to_str().unwrap(), "Site", r#""example.com""#]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output).trim(),
        "{ url: <fn url/0>, domain: 'example.com' }"
    );
}

#[test]
fn cli_missing_function() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "stack.ts", STACK);

    let output = run(&["invoke", file.to_str().unwrap(), "nope"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("no top-level function `nope`"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn cli_directives() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(
        dir.path(),
        "api.ts",
        "//# moduleId = api\nconst a = 1;\n\n//@resource queue\nexport const q = a;\n",
    );

    let output = run(&["directives", file.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2, "stdout: {out}");
    assert!(lines[0].ends_with(": moduleId=api"), "stdout: {out}");
    assert!(lines[1].ends_with(":5 variable statement: resource=queue"), "stdout: {out}");
}

#[test]
fn cli_parse_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let file = write_source(dir.path(), "tiny.ts", "const a = 1;\n");

    let output = run(&["parse", file.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("parse json output");
    assert_eq!(json["stmts"].as_array().map(Vec::len), Some(1));
}

#[test]
fn cli_rejects_oversized_sources() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let big = "a;\n".repeat(400_000);
    let file = write_source(dir.path(), "big.ts", &big);

    let output = run(&["solve", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("exceeds 1MB limit"), "stderr: {}", stderr(&output));
}
