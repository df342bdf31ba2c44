use cirrus_ast::ast::{Expr, ExprKind, StmtKind};
use cirrus_parse::parse_str;
use pretty_assertions::assert_eq;

fn parse_expr(src: &str) -> Expr {
    let file = parse_str("<mem>", &format!("const x = {src};")).expect("parse ok");
    let StmtKind::Var(decl) = &file.stmts[0].kind else {
        panic!("expected variable statement");
    };
    decl.decls[0].init.clone().expect("initializer")
}

#[test]
fn annotations_are_skipped() {
    let file = parse_str(
        "<mem>",
        "function f<T extends object>(a: Map<string, Array<T>>, b?: number): Promise<void> { return; }",
    )
    .expect("parse ok");
    let StmtKind::Function(f) = &file.stmts[0].kind else {
        panic!("expected function");
    };
    assert_eq!(f.params.len(), 2);
    assert_eq!(f.name.as_ref().map(|n| n.name.as_str()), Some("f"));
}

#[test]
fn type_only_declarations_are_erased() {
    let file = parse_str(
        "<mem>",
        r#"
type A = { x: number } | string;
interface I extends J<K> { m(): void; }
declare const env: Record<string, string>;
declare module "m" { export const y: number; }
"#,
    )
    .expect("parse ok");
    let names: Vec<Option<&str>> = file
        .stmts
        .iter()
        .map(|s| match &s.kind {
            StmtKind::TypeDecl { name } => name.as_ref().map(|n| n.name.as_str()),
            other => panic!("expected type declaration, got {}", other.name()),
        })
        .collect();
    assert_eq!(names, vec![Some("A"), Some("I"), Some("env"), None]);
}

#[test]
fn as_and_satisfies_keep_type_text() {
    assert!(matches!(parse_expr("y as const").kind, ExprKind::As { ref ty, .. } if ty == "const"));
    assert!(matches!(
        parse_expr("cfg satisfies Config<string>").kind,
        ExprKind::Satisfies { ref ty, .. } if ty == "Config<string>"
    ));
}

#[test]
fn non_null_assertion() {
    let ExprKind::Member { obj, .. } = parse_expr("a!.b").kind else {
        panic!("expected member");
    };
    assert!(matches!(obj.kind, ExprKind::NonNull(_)));
}

#[test]
fn generic_calls_and_constructors() {
    assert!(matches!(parse_expr("new Map<string, number>()").kind, ExprKind::New { .. }));
    assert!(matches!(
        parse_expr("f<string>(y)").kind,
        ExprKind::Call { ref args, .. } if args.len() == 1
    ));
    // plain comparison is not mistaken for type arguments
    assert!(matches!(parse_expr("a < b").kind, ExprKind::Binary { .. }));
}

#[test]
fn typed_async_arrow() {
    let ExprKind::Function(f) = parse_expr("async (n: number): Promise<number> => n * 2").kind
    else {
        panic!("expected arrow");
    };
    assert!(f.is_async);
    assert_eq!(f.params.len(), 1);
}

#[test]
fn abstract_class_with_index_signature() {
    let file = parse_str(
        "<mem>",
        "export abstract class Base<T> implements Thing {\n  [key: string]: unknown;\n  protected abstract make(): T;\n  run() { return 1; }\n}",
    )
    .expect("parse ok");
    assert!(file.stmts[0].exported);
    let StmtKind::Class(class) = &file.stmts[0].kind else {
        panic!("expected class");
    };
    // index signature and abstract signature carry no runtime member
    assert_eq!(class.members.len(), 1);
}
