use cirrus_ast::CommentKind;
use cirrus_parse::parse_str;
use pretty_assertions::assert_eq;

#[test]
fn leading_comments_attach_to_statements() {
    let src = "//# module=network\n// plain\nconst a = 1;\n\n/* block */\n//@resource bucket\nexport const b = 2;\n";
    let file = parse_str("<mem>", src).expect("parse ok");

    let header: Vec<&str> = file.header_comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(header, vec!["//# module=network", "// plain"]);

    let first: Vec<&str> = file.stmts[0]
        .leading_comments
        .iter()
        .map(|c| c.text.as_str())
        .collect();
    assert_eq!(first, vec!["//# module=network", "// plain"]);

    let second = &file.stmts[1].leading_comments;
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].kind, CommentKind::Block);
    assert_eq!(second[1].text, "//@resource bucket");
}

#[test]
fn trailing_comments_do_not_leak_into_next_statement() {
    let file = parse_str("<mem>", "f(); // after f\ng();").expect("parse ok");
    assert_eq!(file.stmts[1].leading_comments.len(), 1);
    assert!(file.stmts[0].leading_comments.is_empty());
}

#[test]
fn statement_spans_cover_source_text() {
    let src = "const a = 1;\nlet b = a + 2;";
    let file = parse_str("<mem>", src).expect("parse ok");
    assert_eq!(file.slice(file.stmts[1].span), "let b = a + 2;");
    assert_eq!(file.line_col(file.stmts[1].span.start), (2, 1));
}
