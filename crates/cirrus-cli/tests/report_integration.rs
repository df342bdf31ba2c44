//! Tests for the report renderers, driven through the library API.

use cirrus_cli::report::{self, Output};
use cirrus_cli::Settings;
use cirrus_solver::DirectiveCache;

fn parse(src: &str) -> cirrus_ast::SourceFile {
    cirrus_parse::parse_str("app.ts", src).expect("parse failed")
}

fn solve_text(src: &str) -> String {
    report::solve(&parse(src), &Settings::default(), Output::Text).expect("solve failed")
}

#[test]
fn solve_lists_exports_in_order() {
    let out = solve_text("export const a = 1;\nconst hidden = 2;\nexport const b = a + hidden;\n");
    assert_eq!(out, "a = 1\nb = 3\n");
}

#[test]
fn solve_renames_and_defaults() {
    let out = solve_text("const x = 'v';\nexport { x as renamed };\nexport default [x];\n");
    assert_eq!(out, "renamed = 'v'\ndefault = ['v']\n");
}

#[test]
fn solve_json_marks_unknowns() {
    let file = parse("import { env } from './env';\nexport const region = env.region;\n");
    let out = report::solve(&file, &Settings::default(), Output::Json).expect("solve failed");
    let json: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(json, serde_json::json!({ "region": { "$unknown": true } }));
}

#[test]
fn max_call_depth_is_honoured() {
    let src = "function deep(n) { return n < 1 ? 'bottom' : deep(n - 1); }\nexport const r = deep(2);\n";
    let settings = Settings {
        max_call_depth: 0,
        ..Settings::default()
    };
    let out = report::solve(&parse(src), &settings, Output::Text).expect("solve failed");
    assert_eq!(out, "r = union('bottom' | <unknown>)\n");
}

#[test]
fn strict_imports_fail_on_imported_reads() {
    let file = parse("import { env } from './env';\nexport const region = env.region;\n");
    let settings = Settings {
        strict_imports: true,
        ..Settings::default()
    };
    let err = report::solve(&file, &settings, Output::Text).unwrap_err();
    assert_eq!(err.to_string(), "app.ts:2:23: identifier `env` has not been declared");
}

#[test]
fn invoke_renders_json() {
    let file = parse("export function pair(a, b) { return { a, b }; }\n");
    let out = report::invoke(
        &file,
        &Settings::default(),
        "pair",
        &["1".to_string(), r#"{"k": [true]}"#.to_string()],
        Output::Json,
    )
    .expect("invoke failed");
    let json: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(json, serde_json::json!({ "a": 1, "b": { "k": [true] } }));
}

#[test]
fn instance_reads_accessors() {
    let src = r#"
export class Queue {
  constructor(name) { this.name = name; }
  get arn() { return 'arn:queue:' + this.name; }
}
"#;
    let out = report::instance(
        &parse(src),
        &Settings::default(),
        "Queue",
        &[r#""jobs""#.to_string()],
        Output::Text,
    )
    .expect("instance failed");
    assert_eq!(out, "{ arn: 'arn:queue:jobs', name: 'jobs' }\n");
}

#[test]
fn missing_class() {
    let err = report::instance(&parse("const a = 1;"), &Settings::default(), "Nope", &[], Output::Text)
        .unwrap_err();
    assert_eq!(err.to_string(), "no top-level class `Nope` in app.ts");
}

#[test]
fn directives_json() {
    let src = "//# moduleId = app\nconst a = 1;\n\n//@transform zip\nfunction handler() {}\n";
    let out = report::directives(&parse(src), &DirectiveCache::new(), Output::Json).expect("directives failed");
    let json: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(
        json,
        serde_json::json!({
            "file": { "moduleId": "app" },
            "statements": [
                { "line": 5, "kind": "function declaration", "directives": { "transform": "zip" } }
            ]
        })
    );
}

#[test]
fn directives_without_any() {
    let out = report::directives(&parse("const a = 1;"), &DirectiveCache::new(), Output::Text)
        .expect("directives failed");
    assert_eq!(out, "");
}
