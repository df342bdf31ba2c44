use cirrus_ast::SourceFile;
use cirrus_parse::parse_str;
use cirrus_solver::{hooks, StaticSolver};
use pretty_assertions::assert_eq;

fn parse(src: &str) -> SourceFile {
    parse_str("<mem>", src).expect("parse ok")
}

/// Solves `src` and renders the listed top-level bindings.
fn solve(src: &str, names: &[&str]) -> Vec<String> {
    let file = parse(src);
    let solver = StaticSolver::new(&file).with_hook(hooks::unknown_imports(&file));
    let module = solver.solve_module().expect("solve ok");
    let rendered = names
        .iter()
        .map(|name| {
            module
                .get(name)
                .expect("force ok")
                .unwrap_or_else(|| panic!("`{name}` is not bound"))
                .to_string()
        })
        .collect();
    rendered
}

#[test]
fn literals_fold() {
    let out = solve("const a = 1 + 2;\nconst b = 'a' + 'b';\nconst c = 2 ** 10 % 1000;", &["a", "b", "c"]);
    assert_eq!(out, vec!["3", "'ab'", "24"]);
}

#[test]
fn initializers_run_once() {
    let src = r#"
let ticks = 0;
function tick() { ticks = ticks + 1; return ticks; }
const a = tick();
const b = a + a;
"#;
    assert_eq!(solve(src, &["ticks", "b"]), vec!["1", "2"]);
}

#[test]
fn unread_initializers_still_run() {
    let src = r#"
const log = [];
const unused = log.push('ran');
"#;
    assert_eq!(solve(src, &["log"]), vec!["['ran']"]);
}

#[test]
fn conditional_members_distribute() {
    let src = r#"
const stage = process.env.STAGE;
const config = stage ? { size: 1 } : { size: 2 };
const size = config.size;
"#;
    assert_eq!(solve(src, &["size"]), vec!["union(1 | 2)"]);
}

#[test]
fn unknown_absorbs_operations() {
    let src = r#"
import { ext } from "./ext";
const sum = ext + 1;
const wrapped = [ext];
const count = wrapped.length;
const both = ext || 'fallback';
"#;
    assert_eq!(
        solve(src, &["sum", "wrapped", "count", "both"]),
        vec!["<unknown>", "[<unknown>]", "1", "<unknown>"]
    );
}

#[test]
fn both_branches_run() {
    let src = r#"
const log = [];
function pick(flag) {
  if (flag) { log.push('then'); } else { log.push('else'); }
}
pick(process.argv);
"#;
    assert_eq!(solve(src, &["log"]), vec!["['then', 'else']"]);
}

#[test]
fn loops_run_their_body_once() {
    let src = r#"
import { items } from "./data";
const seen = [];
for (const item of items) { seen.push(item); }
const keys = [];
for (const key in { a: 1, b: 2 }) { keys.push(key); }
let n = 0;
while (n < 10) { n += 1; }
"#;
    assert_eq!(
        solve(src, &["seen", "keys", "n"]),
        vec!["[<unknown>]", "[union('a' | 'b')]", "1"]
    );
}

#[test]
fn templates_expand_unions() {
    let src = r#"
const stage = process.env.PROD ? 'prod' : 'dev';
const name = `app-${stage}`;
const opaque = `x-${process.env.REGION}`;
"#;
    assert_eq!(
        solve(src, &["name", "opaque"]),
        vec!["union('app-prod' | 'app-dev')", "<unknown>"]
    );
}

#[test]
fn spreads() {
    let src = r#"
const base = { a: 1, b: 2 };
const merged = { ...base, b: 3 };
const choice = process.env.X ? [1] : [2, 3];
const flat = [0, ...choice];
const opaque = { ...process.env };
"#;
    assert_eq!(
        solve(src, &["merged", "flat", "opaque"]),
        vec!["{ a: 1, b: 3 }", "[0, 1, 2, 3]", "<unknown>"]
    );
}

#[test]
fn destructuring() {
    let src = r#"
const { a, b: [c, d = 4], ...rest } = { a: 1, b: [3], e: 5, f: 6 };
const [first, , third = 'z'] = 'xy';
"#;
    assert_eq!(
        solve(src, &["a", "c", "d", "rest", "first", "third"]),
        vec!["1", "3", "4", "{ e: 5, f: 6 }", "'x'", "'z'"]
    );
}

#[test]
fn writes_through_unknown_targets_are_dropped() {
    let src = r#"
import { target } from "./t";
target.field = 1;
const choice = process.env.X ? { a: 1 } : { a: 2 };
choice.a = 3;
const a = choice.a;
"#;
    assert_eq!(solve(src, &["a"]), vec!["union(1 | 2)"]);
}

#[test]
fn getters_are_lazy_properties() {
    let src = r#"
const calls = [];
const obj = { base: 2, get double() { calls.push('get'); return this.base * 2; } };
const d = obj.double;
const again = obj.double;
"#;
    assert_eq!(solve(src, &["d", "again", "calls"]), vec!["4", "4", "['get']"]);
}

#[test]
fn exports_mirror_bindings() {
    let src = r#"
export const a = 1;
let b;
b = 'late';
export { b as renamed };
export default function main() { return a; }
"#;
    let file = parse(src);
    let solver = StaticSolver::new(&file);
    let module = solver.solve_module().expect("solve ok");
    let exports: Vec<(String, String)> = module
        .exported()
        .expect("force ok")
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();
    assert_eq!(
        exports,
        vec![
            ("a".to_string(), "1".to_string()),
            ("renamed".to_string(), "'late'".to_string()),
            ("default".to_string(), "<fn main/0>".to_string()),
        ]
    );
}

#[test]
fn host_helpers() {
    let src = r#"
const obj = { b: 2, a: 1 };
const keys = Object.keys(obj);
const json = JSON.stringify({ name: 'x', tags: [1, 2], skip: undefined });
const parsed = JSON.parse('{"n": 3}').n;
const opaque = JSON.stringify({ env: process.env.X });
const joined = ['a', 'b'].map((s) => s.toUpperCase()).join('-');
const biggest = Math.max(1, 7, 3);
const id = Symbol.dispose;
"#;
    assert_eq!(
        solve(src, &["keys", "json", "parsed", "opaque", "joined", "biggest", "id"]),
        vec![
            "['b', 'a']",
            r#"'{"name":"x","tags":[1,2]}'"#,
            "3",
            "<unknown>",
            "'A-B'",
            "7",
            "'@@dispose'",
        ]
    );
}

#[test]
fn generators_collect_yields() {
    let src = r#"
function* ids() { yield 1; yield* [2, 3]; }
const all = ids();
"#;
    assert_eq!(solve(src, &["all"]), vec!["[1, 2, 3]"]);
}

#[test]
fn typeof_and_void() {
    let src = r#"
const t = typeof 'x';
const u = typeof missingGlobal;
const v = void 0;
"#;
    let file = parse(src);
    let module = StaticSolver::new(&file).solve_module().expect("solve ok");
    let render = |name: &str| module.get(name).expect("force ok").expect("bound").to_string();
    assert_eq!(render("t"), "'string'");
    assert_eq!(render("u"), "'undefined'");
    assert_eq!(render("v"), "undefined");
}

#[test]
fn methods_on_union_receivers_distribute() {
    let src = r#"
const parts = process.argv ? [1, 2] : [3];
const joined = parts.join('-');
const log = [];
parts.map(x => log.push(x));
const label = (process.argv ? 'ab' : 'c').toUpperCase();
"#;
    assert_eq!(
        solve(src, &["joined", "log", "label"]),
        vec!["union('1-2' | '3')", "[1, 2, 3]", "union('AB' | 'C')"]
    );
}

#[test]
fn oversized_writes_are_bounded() {
    let src = r#"
const a = [];
a[4000000000] = 1;
a[2] = 'x';
const n = a.length;
const wide = 'a'.padStart(1e12);
const padded = 'a'.padStart(3, '-');
"#;
    assert_eq!(
        solve(src, &["n", "wide", "padded"]),
        vec!["3", "<unknown>", "'--a'"]
    );
}

#[test]
fn generator_declarations_yield_in_order() {
    let src = r#"
function* steps() {
  const first = yield 1;
  yield 2;
}
const all = steps();
"#;
    assert_eq!(solve(src, &["all"]), vec!["[1, 2]"]);
}

#[test]
fn assigning_before_reading_runs_the_initializer() {
    let src = r#"
const log = [];
let x = log.push('init');
x = 5;
"#;
    assert_eq!(solve(src, &["log", "x"]), vec!["['init']", "5"]);
}
