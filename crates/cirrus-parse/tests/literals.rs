use cirrus_ast::ast::{BinaryOp, Expr, ExprKind, FnBody, FunctionKind, Prop, PropKey, StmtKind};
use cirrus_parse::parse_str;
use pretty_assertions::assert_eq;

/// Helper: parse `const x = <src>;` and return the initializer
fn parse_expr(src: &str) -> Expr {
    let file = parse_str("<mem>", &format!("const x = {src};")).expect("parse ok");
    let StmtKind::Var(decl) = &file.stmts[0].kind else {
        panic!("expected variable statement");
    };
    decl.decls[0].init.clone().expect("initializer")
}

#[test]
fn numeric_literal_keeps_raw_text() {
    assert!(matches!(parse_expr("0xff").kind, ExprKind::Num(ref raw) if raw == "0xff"));
    assert!(matches!(parse_expr("1_000.5").kind, ExprKind::Num(ref raw) if raw == "1_000.5"));
}

#[test]
fn string_escapes_are_cooked() {
    let ExprKind::Str(s) = parse_expr(r#""a\tbA""#).kind else {
        panic!("expected string");
    };
    assert_eq!(s, "a\tbA");
}

#[test]
fn template_splits_quasis_and_substitutions() {
    let ExprKind::Template(tpl) = parse_expr("`a${b}c${d + 1}e`").kind else {
        panic!("expected template");
    };
    assert_eq!(tpl.quasis, vec!["a", "c", "e"]);
    assert_eq!(tpl.exprs.len(), 2);
    assert!(matches!(tpl.exprs[1].kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn regex_literal_after_assignment() {
    assert!(matches!(parse_expr("/a+b/gi").kind, ExprKind::Regex(ref raw) if raw == "/a+b/gi"));
}

#[test]
fn array_with_holes_and_spread() {
    let ExprKind::Array(elems) = parse_expr("[1, , ...xs]").kind else {
        panic!("expected array");
    };
    assert_eq!(elems.len(), 3);
    assert!(elems[1].is_none());
    assert!(elems[2].as_ref().is_some_and(|e| e.spread));
}

#[test]
fn object_literal_property_forms() {
    let ExprKind::Object(props) =
        parse_expr(r#"{ a: 1, b, ...c, m() { return 1; }, [k]: 2, "s": 3, get g() { return 0; } }"#)
            .kind
    else {
        panic!("expected object");
    };
    assert_eq!(props.len(), 7);
    assert!(matches!(&props[0], Prop::KeyValue { key: PropKey::Ident(k), .. } if k == "a"));
    assert!(matches!(&props[1], Prop::Shorthand(e) if e.as_ident() == Some("b")));
    assert!(matches!(&props[2], Prop::Spread(_)));
    assert!(matches!(&props[3], Prop::Method { func, .. } if func.kind == FunctionKind::Method));
    assert!(matches!(&props[4], Prop::KeyValue { key: PropKey::Computed(_), .. }));
    assert!(matches!(&props[5], Prop::KeyValue { key: PropKey::Str(s), .. } if s == "s"));
    assert!(matches!(&props[6], Prop::Getter { .. }));
}

#[test]
fn arrow_function_forms() {
    let ExprKind::Function(f) = parse_expr("x => x").kind else {
        panic!("expected arrow");
    };
    assert!(f.is_arrow());
    assert_eq!(f.params.len(), 1);
    assert!(matches!(f.body, Some(FnBody::Expr(_))));

    let ExprKind::Function(f) = parse_expr("(a, b = 1, ...rest) => { return a; }").kind else {
        panic!("expected arrow");
    };
    assert_eq!(f.params.len(), 3);
    assert!(f.params[1].default.is_some());
    assert!(f.params[2].rest);
    assert!(matches!(f.body, Some(FnBody::Block(_))));

    let ExprKind::Function(f) = parse_expr("async () => 1").kind else {
        panic!("expected arrow");
    };
    assert!(f.is_async);
}

#[test]
fn parenthesized_expression_is_not_an_arrow() {
    let e = parse_expr("(a + b) * c");
    let ExprKind::Binary { op, left, .. } = e.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Mul);
    assert!(matches!(left.kind, ExprKind::Paren(_)));
}

#[test]
fn binary_precedence() {
    let ExprKind::Binary { op, right, .. } = parse_expr("1 + 2 * 3").kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));

    let ExprKind::Binary { op, .. } = parse_expr("a || b && c").kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Or);

    // right-associative exponent
    let ExprKind::Binary { left, .. } = parse_expr("2 ** 3 ** 2").kind else {
        panic!("expected binary");
    };
    assert!(matches!(left.kind, ExprKind::Num(_)));
}

#[test]
fn conditional_and_nullish() {
    assert!(matches!(parse_expr("a ? b : c").kind, ExprKind::Cond { .. }));
    assert!(matches!(
        parse_expr("a ?? 'd'").kind,
        ExprKind::Binary { op: BinaryOp::Nullish, .. }
    ));
}

#[test]
fn member_call_chain() {
    let e = parse_expr("a.b?.c(1)[0]");
    let ExprKind::Index { obj, .. } = e.kind else {
        panic!("expected index");
    };
    let ExprKind::Call { callee, args, .. } = obj.kind else {
        panic!("expected call");
    };
    assert_eq!(args.len(), 1);
    assert!(matches!(callee.kind, ExprKind::Member { optional: true, ref prop, .. } if prop == "c"));
}

#[test]
fn new_with_and_without_arguments() {
    assert!(matches!(parse_expr("new Foo(1, 2)").kind, ExprKind::New { ref args, .. } if args.len() == 2));
    assert!(matches!(parse_expr("new Foo").kind, ExprKind::New { ref args, .. } if args.is_empty()));
    // member access on the constructed object
    assert!(matches!(parse_expr("new a.B().c").kind, ExprKind::Member { .. }));
}
