use cirrus_ast::ast::{
    AssignTarget, ClassMember, ExprKind, ForInit, FunctionKind, ImportKind, Pat, Prop, StmtKind,
    VarKind,
};
use cirrus_ast::SourceFile;
use cirrus_parse::parse_str;
use pretty_assertions::assert_eq;

fn parse(src: &str) -> SourceFile {
    parse_str("<mem>", src).expect("parse ok")
}

#[test]
fn semicolons_are_optional_at_line_ends() {
    let file = parse("const a = 1\nlet b = a\nb");
    assert_eq!(file.stmts.len(), 3);
    assert!(matches!(file.stmts[2].kind, StmtKind::Expr(_)));
}

#[test]
fn return_without_value_before_newline() {
    let file = parse("function f() {\n  return\n  1\n}");
    let StmtKind::Function(f) = &file.stmts[0].kind else {
        panic!("expected function");
    };
    let Some(cirrus_ast::ast::FnBody::Block(body)) = &f.body else {
        panic!("expected block body");
    };
    assert_eq!(body.stmts.len(), 2);
    assert!(matches!(body.stmts[0].kind, StmtKind::Return(None)));
}

#[test]
fn class_members() {
    let file = parse(
        r#"
class B extends A {
  static count = 0;
  name: string = "b";
  #secret = 1;
  constructor(public id: number, private readonly opts?: Opts) { super(); }
  get label() { return this.name; }
  greet(): string { return "hi"; }
  overload(a: string): void;
  overload(a: any) {}
}
"#,
    );
    let StmtKind::Class(class) = &file.stmts[0].kind else {
        panic!("expected class");
    };
    assert_eq!(class.name.as_ref().map(|n| n.name.as_str()), Some("B"));
    assert!(class.super_class.is_some());
    assert_eq!(class.members.len(), 7);
    assert!(matches!(class.members[0], ClassMember::Field { is_static: true, .. }));

    let ctor = class.constructor().expect("constructor");
    assert_eq!(ctor.params.len(), 2);
    assert!(ctor.params.iter().all(|p| p.property));

    assert!(matches!(
        &class.members[4],
        ClassMember::Method { func, .. } if func.kind == FunctionKind::Getter
    ));
}

#[test]
fn var_kinds_including_using() {
    let file = parse("var a = 1; let b = 2; const c = 3; using d = open(); await using e = open();");
    let kinds: Vec<VarKind> = file
        .stmts
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Var(d) => d.kind,
            other => panic!("unexpected {}", other.name()),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            VarKind::Var,
            VarKind::Let,
            VarKind::Const,
            VarKind::Using,
            VarKind::AwaitUsing
        ]
    );
}

#[test]
fn destructuring_declaration_and_assignment() {
    let file = parse("const { a, b: [c, d = 2], ...rest } = obj;\n[a, b] = [b, a];");
    let StmtKind::Var(decl) = &file.stmts[0].kind else {
        panic!("expected var");
    };
    let names: Vec<&str> = decl.decls[0]
        .name
        .bound_names()
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "c", "d", "rest"]);

    let StmtKind::Expr(e) = &file.stmts[1].kind else {
        panic!("expected expression");
    };
    let ExprKind::Assign { target, .. } = &e.kind else {
        panic!("expected assignment");
    };
    assert!(matches!(**target, AssignTarget::Pattern(Pat::Array(_))));
}

#[test]
fn loops() {
    let file = parse(
        "for (const [k, v] of entries) {}\nfor (const key in obj) {}\nfor (let i = 0; i < n; i++) {}\nwhile (x) x--;\ndo { y++ } while (y < 3)",
    );
    match &file.stmts[0].kind {
        StmtKind::ForOf { head, .. } => {
            assert_eq!(head.kind, Some(VarKind::Const));
            assert!(matches!(head.pat, Pat::Array(_)));
        }
        other => panic!("expected for-of, got {}", other.name()),
    }
    assert!(matches!(file.stmts[1].kind, StmtKind::ForIn { .. }));
    assert!(matches!(
        file.stmts[2].kind,
        StmtKind::For {
            init: Some(ForInit::Var(_)),
            test: Some(_),
            update: Some(_),
            ..
        }
    ));
    assert!(matches!(file.stmts[3].kind, StmtKind::While { .. }));
    assert!(matches!(file.stmts[4].kind, StmtKind::DoWhile { .. }));
}

#[test]
fn switch_and_try() {
    let file = parse(
        "switch (k) { case 1: a(); break; case 2: default: b(); }\ntry { f(); } catch (e) { g(e); } finally { h(); }",
    );
    let StmtKind::Switch { cases, .. } = &file.stmts[0].kind else {
        panic!("expected switch");
    };
    assert_eq!(cases.len(), 3);
    assert!(cases[2].test.is_none());
    assert_eq!(cases[0].body.len(), 2);

    let StmtKind::Try {
        handler, finalizer, ..
    } = &file.stmts[1].kind
    else {
        panic!("expected try");
    };
    assert!(handler.as_ref().is_some_and(|h| h.param.is_some()));
    assert!(finalizer.is_some());
}

#[test]
fn imports_and_exports() {
    let file = parse(
        r#"
import a, { b as c, type D } from "m";
import * as ns from "n";
import "side";
export const x = 1;
export { x as y };
export default function f() {}
"#,
    );
    assert_eq!(file.imported_names(), vec!["a", "c", "D", "ns"]);

    let StmtKind::Import(decl) = &file.stmts[1].kind else {
        panic!("expected import");
    };
    assert_eq!(decl.specifiers[0].kind, ImportKind::Namespace);

    assert!(file.stmts[3].exported);
    assert!(matches!(file.stmts[3].kind, StmtKind::Var(_)));
    assert!(matches!(
        &file.stmts[4].kind,
        StmtKind::ExportNamed { specifiers, source: None } if specifiers[0].exported == "y"
    ));
    assert!(file.find_function("f").is_some());
}

#[test]
fn enum_lowers_to_const_object() {
    let file = parse("enum Color { Red, Green = 5, Blue }");
    let StmtKind::Var(decl) = &file.stmts[0].kind else {
        panic!("expected const");
    };
    assert_eq!(decl.kind, VarKind::Const);
    let Some(init) = &decl.decls[0].init else {
        panic!("expected initializer");
    };
    let ExprKind::Object(props) = &init.kind else {
        panic!("expected object");
    };
    let values: Vec<&str> = props
        .iter()
        .map(|p| match p {
            Prop::KeyValue { value, .. } => match &value.kind {
                ExprKind::Num(raw) => raw.as_str(),
                _ => panic!("expected number"),
            },
            _ => panic!("expected key/value"),
        })
        .collect();
    assert_eq!(values, vec!["0", "5", "6"]);
}

#[test]
fn generator_yield() {
    let file = parse("function* g() { yield 1; yield* other(); yield; }");
    let StmtKind::Function(f) = &file.stmts[0].kind else {
        panic!("expected function");
    };
    assert!(f.is_generator);
    let Some(cirrus_ast::ast::FnBody::Block(body)) = &f.body else {
        panic!("expected body");
    };
    assert!(matches!(
        &body.stmts[1].kind,
        StmtKind::Expr(e) if matches!(e.kind, ExprKind::Yield { delegate: true, .. })
    ));
    assert!(matches!(
        &body.stmts[2].kind,
        StmtKind::Expr(e) if matches!(e.kind, ExprKind::Yield { arg: None, .. })
    ));
}

#[test]
fn node_ids_are_unique() {
    let file = parse("const a = [1, 2, 3].map(x => x + 1);");
    let StmtKind::Var(decl) = &file.stmts[0].kind else {
        panic!("expected var");
    };
    let init = decl.decls[0].init.as_ref().expect("init");
    assert_ne!(init.id, file.stmts[0].id);
    assert!(file.node_count() > 8);
}
