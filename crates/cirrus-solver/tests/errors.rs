use std::rc::Rc;

use cirrus_ast::ast::{Expr, StmtKind};
use cirrus_ast::{NodeId, SourceFile};
use cirrus_parse::parse_str;
use cirrus_solver::{Diagnostic, DiagnosticKind, StaticSolver, Substitution, SubstitutionHook, Value};
use pretty_assertions::assert_eq;

fn parse(src: &str) -> SourceFile {
    parse_str("main.ts", src).expect("parse ok")
}

fn solve_err(src: &str) -> Diagnostic {
    let file = parse(src);
    let err = StaticSolver::new(&file).solve_module().err().expect("solve fails");
    err
}

#[test]
fn undeclared_identifier() {
    let err = solve_err("const x = 1;\nconst y = z + x;");
    assert_eq!(err.kind, DiagnosticKind::UndeclaredIdentifier);
    assert_eq!(err.to_string(), "main.ts:2:11: identifier `z` has not been declared");
}

#[test]
fn assignment_to_undeclared_name() {
    let err = solve_err("missing = 1;");
    assert_eq!(err.kind, DiagnosticKind::UndeclaredIdentifier);
}

#[test]
fn imports_need_a_hook() {
    let err = solve_err("import { ext } from './ext';\nconst v = ext;");
    assert_eq!(err.kind, DiagnosticKind::UndeclaredIdentifier);
}

#[test]
fn calling_a_number() {
    let err = solve_err("const n = 1;\nconst r = n();");
    assert_eq!(err.kind, DiagnosticKind::NotCallable);
    assert_eq!(err.message, "not a function: 1");
}

#[test]
fn calling_a_falsy_value_is_unknown() {
    let file = parse("const n = null;\nconst r = n();");
    let module = StaticSolver::new(&file).solve_module().expect("solve ok");
    assert!(module.get("r").expect("force ok").expect("bound").is_unknown());
}

#[test]
fn writing_to_a_primitive() {
    let err = solve_err("const s = 'x';\ns.y = 1;");
    assert_eq!(err.kind, DiagnosticKind::NotAnObject);
    assert_eq!(err.message, "Not an object: cannot set `y` on string");
}

#[test]
fn missing_dispose() {
    let err = solve_err("using r = { close() {} };");
    assert_eq!(err.kind, DiagnosticKind::MissingDispose);
    assert_eq!(err.message, "Missing dispose method in resource");
}

#[test]
fn bitwise_not() {
    let err = solve_err("const b = ~1;");
    assert_eq!(err.kind, DiagnosticKind::NotImplemented);
}

#[test]
fn object_as_computed_pattern_key() {
    let err = solve_err("const { [{}]: v } = {};");
    assert_eq!(err.kind, DiagnosticKind::MalformedPattern);
}

#[test]
fn host_errors_are_reported() {
    let err = solve_err("const v = JSON.parse('{oops');");
    assert_eq!(err.kind, DiagnosticKind::Host);
    assert!(err.message.starts_with("JSON.parse:"), "{}", err.message);
}

#[test]
fn errors_inside_unread_bindings_still_surface() {
    let err = solve_err("function f() { return nope; }\nconst unused = f();");
    assert_eq!(err.kind, DiagnosticKind::UndeclaredIdentifier);
}

/// Substitutes every reference to `name` with `node`.
fn substitute_with<'a>(name: &'static str, node: &'a Expr) -> SubstitutionHook<'a> {
    Rc::new(move |expr: &'a Expr, _: &[NodeId]| match expr.as_ident() {
        Some(ident) if ident == name => Substitution::Node(node),
        _ => Substitution::PassThrough,
    })
}

/// Substitutes `name` with the very node being resolved.
fn self_substitution<'a>(name: &'static str) -> SubstitutionHook<'a> {
    Rc::new(move |expr: &'a Expr, _: &[NodeId]| match expr.as_ident() {
        Some(ident) if ident == name => Substitution::Node(expr),
        _ => Substitution::PassThrough,
    })
}

#[test]
fn node_substitution_solves_the_replacement() {
    let file = parse("const v = answer;");
    let other = parse("40 + 2;");
    let StmtKind::Expr(replacement) = &other.stmts[0].kind else {
        panic!("expected an expression statement");
    };
    let solver = StaticSolver::new(&file).with_hook(substitute_with("answer", replacement));
    let module = solver.solve_module().expect("solve ok");
    assert_eq!(module.get("v").expect("force ok").expect("bound").to_string(), "42");
}

#[test]
fn self_substitution_is_rejected() {
    let file = parse("const v = cycle;");
    let solver = StaticSolver::new(&file).with_hook(self_substitution("cycle"));
    let err = solver.solve_module().err().expect("solve fails");
    assert_eq!(err.kind, DiagnosticKind::RecursiveSubstitution);
}

/// Resolves `probe` to the depth of the scope chain it is read in.
fn scope_depth<'a>() -> SubstitutionHook<'a> {
    Rc::new(|expr: &'a Expr, scopes: &[NodeId]| match expr.as_ident() {
        Some("probe") => Substitution::Value(Value::Num(scopes.len() as f64)),
        _ => Substitution::PassThrough,
    })
}

#[test]
fn hooks_see_the_scope_chain() {
    let file = parse("function outer() { return probe; }\nconst v = outer();");
    let solver = StaticSolver::new(&file).with_hook(scope_depth());
    let module = solver.solve_module().expect("solve ok");
    assert_eq!(module.get("v").expect("force ok").expect("bound").to_string(), "1");
}
