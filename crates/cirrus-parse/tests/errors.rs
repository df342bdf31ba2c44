use cirrus_parse::{parse_str, MAX_SOURCE_SIZE};

#[test]
fn errors_carry_file_line_and_column() {
    let err = parse_str("<mem>", "const = 1;").unwrap_err().to_string();
    assert_eq!(
        err,
        "<mem>:1:7: expected binding name or pattern, found '='"
    );
}

#[test]
fn error_on_second_line() {
    let err = parse_str("main.ts", "const a = 1;\nif (a { }").unwrap_err().to_string();
    assert!(err.starts_with("main.ts:2:7:"), "{err}");
    assert!(err.contains("expected ')'"), "{err}");
}

#[test]
fn unterminated_string() {
    let err = parse_str("<mem>", "const s = \"abc").unwrap_err().to_string();
    assert!(err.contains("unterminated string literal"), "{err}");
}

#[test]
fn unterminated_template() {
    let err = parse_str("<mem>", "const s = `abc${x}").unwrap_err().to_string();
    assert!(err.contains("unterminated template literal"), "{err}");
}

#[test]
fn missing_separator_between_statements() {
    let err = parse_str("<mem>", "const a = 1 const b = 2").unwrap_err().to_string();
    assert!(err.contains("expected ';'"), "{err}");
}

#[test]
fn oversized_source_is_rejected() {
    let src = "x;".repeat(MAX_SOURCE_SIZE);
    let err = parse_str("<mem>", &src).unwrap_err().to_string();
    assert!(err.contains("byte limit"), "{err}");
}
