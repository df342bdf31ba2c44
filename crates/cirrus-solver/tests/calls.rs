use cirrus_ast::ast::{Expr, Function, StmtKind};
use cirrus_ast::SourceFile;
use cirrus_parse::parse_str;
use cirrus_solver::{hooks, SolverOptions, StaticSolver, Value};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn parse(src: &str) -> SourceFile {
    parse_str("<mem>", src).expect("parse ok")
}

fn function<'f>(file: &'f SourceFile, name: &str) -> &'f Function {
    file.stmts
        .iter()
        .find_map(|stmt| match &stmt.kind {
            StmtKind::Function(func) if func.name.as_ref().is_some_and(|n| n.name == name) => Some(&**func),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function `{name}`"))
}

fn first_expr(file: &SourceFile) -> &Expr {
    match &file.stmts[0].kind {
        StmtKind::Expr(expr) => expr,
        other => panic!("expected an expression statement, got {}", other.name()),
    }
}

fn binding(file: &SourceFile, name: &str) -> String {
    let solver = StaticSolver::new(file).with_hook(hooks::unknown_imports(file));
    let module = solver.solve_module().expect("solve ok");
    let value = module.get(name).expect("force ok").expect("bound");
    value.to_string()
}

#[test]
fn identical_recursion_is_unknown() {
    let file = parse("function f(n) { return f(n); }\nconst r = f(1);");
    assert_eq!(binding(&file, "r"), "<unknown>");
}

#[test]
fn unbounded_recursion_hits_the_depth_limit() {
    let file = parse("function g(n) { return g(n + 1); }\nconst r = g(0);");
    assert_eq!(binding(&file, "r"), "<unknown>");
}

#[test]
fn depth_limit_is_configurable() {
    let src = r#"
function down(n) { return n < 1 ? 'done' : down(n - 1); }
const r = down(3);
"#;
    let file = parse(src);
    // Both arms of the conditional run, so each level recurses once more.
    let deep = StaticSolver::new(&file);
    let r = deep.solve_module().expect("solve ok").get("r").expect("force ok").expect("bound");
    assert!(matches!(r, Value::Union(_)), "got {r}");

    let shallow = StaticSolver::with_options(&file, SolverOptions { max_call_depth: 0 });
    let r = shallow.solve_module().expect("solve ok").get("r").expect("force ok").expect("bound");
    assert_eq!(r.to_string(), "union('done' | <unknown>)");
}

#[test]
fn partial_returns_join_the_result() {
    let src = r#"
function pick(flag) {
  if (flag) { return 'early'; }
  return 'late';
}
const r = pick(process.env.FLAG);
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "r"), "union('early' | 'late')");
}

#[test]
fn invoke_uses_parameter_defaults() {
    let src = r#"
const greeting = 'hello';
function greet(name = 'default', punct = '!') { return greeting + ' ' + name + punct; }
"#;
    let file = parse(src);
    let solver = StaticSolver::new(&file);
    let greet = function(&file, "greet");
    let out = solver.invoke(greet, Value::Undefined, vec![]).expect("invoke ok");
    assert_eq!(out.to_string(), "'hello default!'");
    let out = solver
        .invoke(greet, Value::Undefined, vec![Value::str("bob"), Value::Undefined])
        .expect("invoke ok");
    assert_eq!(out.to_string(), "'hello bob!'");
}

#[test]
fn invoke_with_undefined_argument() {
    let file = parse("function f(a) { return a || 'default'; }");
    let solver = StaticSolver::new(&file);
    let out = solver
        .invoke(function(&file, "f"), Value::Undefined, vec![Value::Undefined])
        .expect("invoke ok");
    assert_eq!(out.to_string(), "'default'");
}

#[test]
fn standalone_solve_folds_constants() {
    let file = parse("`bucket-${1 + 2}`;");
    let solver = StaticSolver::new(&file);
    assert_eq!(solver.solve(first_expr(&file)).expect("solve ok").to_string(), "'bucket-3'");
}

#[test]
fn create_solver_with_bindings() {
    let file = parse("x * factor;");
    let solver = StaticSolver::new(&file);
    let mut bindings = IndexMap::new();
    bindings.insert("x".to_string(), Value::Num(2.0));
    bindings.insert("factor".to_string(), Value::Num(21.0));
    let scoped = solver.create_solver(Vec::new(), bindings, None);
    assert_eq!(scoped.solve(first_expr(&file)).expect("solve ok").to_string(), "42");
}

#[test]
fn invoke_sees_module_state() {
    let src = r#"
let count = 0;
function bump(by) { count = count + by; return count; }
"#;
    let file = parse(src);
    let solver = StaticSolver::new(&file);
    let bump = function(&file, "bump");
    solver.invoke(bump, Value::Undefined, vec![Value::Num(2.0)]).expect("invoke ok");
    let module = solver.solve_module().expect("solve ok");
    assert_eq!(module.get("count").expect("force ok").expect("bound").to_string(), "2");
}

#[test]
fn rest_parameters_and_arguments() {
    let src = r#"
function tail(first, ...rest) { return rest; }
function count() { return arguments.length; }
const t = tail(1, 2, 3);
const c = count('a', 'b');
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "t"), "[2, 3]");
    assert_eq!(binding(&file, "c"), "2");
}

#[test]
fn closures_capture_their_scope() {
    let src = r#"
function counter(start) {
  let n = start;
  return () => { n = n + 1; return n; };
}
const next = counter(10);
const first = next();
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "first"), "11");
}

#[test]
fn call_and_apply_set_the_receiver() {
    let src = r#"
function who(suffix) { return this.name + suffix; }
const a = who.call({ name: 'x' }, '?');
const b = who.apply({ name: 'y' }, ['!']);
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "a"), "'x?'");
    assert_eq!(binding(&file, "b"), "'y!'");
}

#[test]
fn calls_on_unknown_are_unknown() {
    let src = r#"
import { client } from "./client";
const sent = client.send({ body: 'x' });
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "sent"), "<unknown>");
}

#[test]
fn resources_are_disposed_on_scope_exit() {
    let src = r#"
const events = [];
function make(tag) {
  return { [Symbol.dispose]() { events.push('disposed ' + tag); } };
}
function work() {
  using a = make('a');
  using b = make('b');
  return 1;
}
const result = work();
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "result"), "1");
    assert_eq!(binding(&file, "events"), "['disposed b', 'disposed a']");
}

#[test]
fn async_dispose_is_a_fallback() {
    let src = r#"
const events = [];
async function work() {
  await using r = { [Symbol.asyncDispose]() { events.push('closed'); } };
}
work();
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "events"), "['closed']");
}

#[test]
fn bindings_hook_supplies_values() {
    let file = parse("const region = REGION + '-1';");
    let hook = hooks::bindings(vec![("REGION".to_string(), Value::str("eu"))]);
    let solver = StaticSolver::new(&file).with_hook(hook);
    let module = solver.solve_module().expect("solve ok");
    assert_eq!(module.get("region").expect("force ok").expect("bound").to_string(), "'eu-1'");
}

#[test]
fn early_return_from_a_nested_block_disposes_once() {
    let src = r#"
const events = [];
function make(tag) {
  return { [Symbol.dispose]() { events.push('disposed ' + tag); } };
}
function work(flag) {
  using outer = make('outer');
  if (flag) {
    using inner = make('inner');
    return 'early';
  }
  return 'late';
}
const result = work(process.argv);
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "result"), "union('early' | 'late')");
    assert_eq!(binding(&file, "events"), "['disposed inner', 'disposed outer']");
}

#[test]
fn resources_are_disposed_when_the_scope_fails() {
    let src = r#"
function work() {
  using r = { [Symbol.dispose]() { events.push('disposed'); } };
  missing;
}
work();
"#;
    let file = parse(src);
    let events = Value::array(Vec::new());
    let hook = hooks::bindings(vec![("events".to_string(), events.clone())]);
    let err = StaticSolver::new(&file)
        .with_hook(hook)
        .solve_module()
        .expect_err("undeclared identifier");
    assert!(err.to_string().contains("`missing`"), "{err}");
    assert_eq!(events.to_string(), "['disposed']");
}

#[test]
fn compound_member_assignment_evaluates_the_object_once() {
    let src = r#"
let calls = 0;
const store = { x: 1 };
function get() { calls = calls + 1; return store; }
get().x += 5;
get()['x']++;
const x = store.x;
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "calls"), "2");
    assert_eq!(binding(&file, "x"), "<unknown>");
}

#[test]
fn union_receivers_call_each_method_with_its_own_this() {
    let src = r#"
const seen = [];
class Box {
  constructor(n) { this.n = n; }
  get() { seen.push(this.n); return this.n; }
}
const box = process.argv ? new Box(1) : new Box(2);
const n = box.get();
"#;
    let file = parse(src);
    assert_eq!(binding(&file, "n"), "union(1 | 2)");
    assert_eq!(binding(&file, "seen"), "[1, 2]");
}
