use crate::token::{Tok, TokKind};
use cirrus_ast::span::Span;
use cirrus_ast::{Comment, CommentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brace {
    Block,
    /// `${` inside a template literal
    Template,
}

/// Lexer position saved for speculative parsing (arrow functions).
#[derive(Debug, Clone)]
pub struct LexState {
    pos: usize,
    braces: Vec<Brace>,
    regex_ok: bool,
    comments_len: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    braces: Vec<Brace>,
    /// Whether a `/` at this point starts a regular expression literal.
    regex_ok: bool,
    pub comments: Vec<Comment>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut lex = Self {
            src,
            pos: 0,
            braces: Vec::new(),
            regex_ok: true,
            comments: Vec::new(),
        };
        // hashbang line
        if src.starts_with("#!") {
            while let Some(c) = lex.peek() {
                if c == '\n' {
                    break;
                }
                lex.bump();
            }
        }
        lex
    }

    pub fn checkpoint(&self) -> LexState {
        LexState {
            pos: self.pos,
            braces: self.braces.clone(),
            regex_ok: self.regex_ok,
            comments_len: self.comments.len(),
        }
    }

    pub fn restore(&mut self, state: LexState) {
        self.pos = state.pos;
        self.braces = state.braces;
        self.regex_ok = state.regex_ok;
        self.comments.truncate(state.comments_len);
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_byte(&self, n: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek_byte(0) == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: start as u32,
            end: self.pos as u32,
        }
    }

    /// Skips whitespace and comments; returns whether a line break was seen.
    fn skip_trivia(&mut self) -> bool {
        let mut nl = false;
        loop {
            match self.peek() {
                Some('\n') | Some('\u{2028}') | Some('\u{2029}') => {
                    nl = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                // line comment: //
                Some('/') if self.peek_byte(1) == Some(b'/') => {
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    let text = self.src[start..self.pos].trim_end_matches('\r');
                    self.comments.push(Comment {
                        kind: CommentKind::Line,
                        text: text.to_string(),
                        span: self.span(start),
                    });
                }
                // block comment: /* */
                Some('/') if self.peek_byte(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            None => break,
                            Some('*') if self.peek_byte(0) == Some(b'/') => {
                                self.pos += 1;
                                break;
                            }
                            Some('\n') => nl = true,
                            Some(_) => {}
                        }
                    }
                    self.comments.push(Comment {
                        kind: CommentKind::Block,
                        text: self.src[start..self.pos].to_string(),
                        span: self.span(start),
                    });
                }
                _ => break,
            }
        }
        nl
    }

    pub fn next_tok(&mut self) -> Tok {
        let comments_start = self.comments.len();
        let nl_before = self.skip_trivia();
        let start = self.pos;
        let kind = self.lex_kind(start);
        self.regex_ok = regex_allowed_after(&kind);
        Tok {
            kind,
            span: self.span(start),
            nl_before,
            comments: (comments_start, self.comments.len()),
        }
    }

    fn lex_kind(&mut self, start: usize) -> TokKind {
        let Some(c) = self.bump() else {
            return TokKind::Eof;
        };

        match c {
            '(' => TokKind::LParen,
            ')' => TokKind::RParen,
            '[' => TokKind::LBracket,
            ']' => TokKind::RBracket,
            ',' => TokKind::Comma,
            ';' => TokKind::Semicolon,
            ':' => TokKind::Colon,
            '~' => TokKind::Tilde,
            '@' => TokKind::At,
            '{' => {
                self.braces.push(Brace::Block);
                TokKind::LBrace
            }
            '}' => {
                if self.braces.pop() == Some(Brace::Template) {
                    return self.lex_template(false);
                }
                TokKind::RBrace
            }
            '.' => {
                if matches!(self.peek_byte(0), Some(b) if b.is_ascii_digit()) {
                    return self.lex_number(start, true);
                }
                if self.peek_byte(0) == Some(b'.') && self.peek_byte(1) == Some(b'.') {
                    self.pos += 2;
                    return TokKind::Ellipsis;
                }
                TokKind::Dot
            }
            '?' => {
                if self.eat(b'?') {
                    if self.eat(b'=') {
                        TokKind::QuestionQuestionEq
                    } else {
                        TokKind::QuestionQuestion
                    }
                } else if self.peek_byte(0) == Some(b'.')
                    && !matches!(self.peek_byte(1), Some(b) if b.is_ascii_digit())
                {
                    self.pos += 1;
                    TokKind::QuestionDot
                } else {
                    TokKind::Question
                }
            }
            '=' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        TokKind::EqEqEq
                    } else {
                        TokKind::EqEq
                    }
                } else if self.eat(b'>') {
                    TokKind::FatArrow
                } else {
                    TokKind::Eq
                }
            }
            '!' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        TokKind::BangEqEq
                    } else {
                        TokKind::BangEq
                    }
                } else {
                    TokKind::Bang
                }
            }
            '+' => {
                if self.eat(b'+') {
                    TokKind::PlusPlus
                } else if self.eat(b'=') {
                    TokKind::PlusEq
                } else {
                    TokKind::Plus
                }
            }
            '-' => {
                if self.eat(b'-') {
                    TokKind::MinusMinus
                } else if self.eat(b'=') {
                    TokKind::MinusEq
                } else {
                    TokKind::Minus
                }
            }
            '*' => {
                if self.eat(b'*') {
                    if self.eat(b'=') {
                        TokKind::StarStarEq
                    } else {
                        TokKind::StarStar
                    }
                } else if self.eat(b'=') {
                    TokKind::StarEq
                } else {
                    TokKind::Star
                }
            }
            '/' => {
                if self.regex_ok {
                    self.lex_regex(start)
                } else if self.eat(b'=') {
                    TokKind::SlashEq
                } else {
                    TokKind::Slash
                }
            }
            '%' => {
                if self.eat(b'=') {
                    TokKind::PercentEq
                } else {
                    TokKind::Percent
                }
            }
            '<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        TokKind::ShlEq
                    } else {
                        TokKind::Shl
                    }
                } else if self.eat(b'=') {
                    TokKind::Le
                } else {
                    TokKind::Lt
                }
            }
            '>' => {
                if self.eat(b'>') {
                    if self.eat(b'>') {
                        if self.eat(b'=') {
                            TokKind::UShrEq
                        } else {
                            TokKind::UShr
                        }
                    } else if self.eat(b'=') {
                        TokKind::ShrEq
                    } else {
                        TokKind::Shr
                    }
                } else if self.eat(b'=') {
                    TokKind::Ge
                } else {
                    TokKind::Gt
                }
            }
            '&' => {
                if self.eat(b'&') {
                    if self.eat(b'=') {
                        TokKind::AmpAmpEq
                    } else {
                        TokKind::AmpAmp
                    }
                } else if self.eat(b'=') {
                    TokKind::AmpEq
                } else {
                    TokKind::Amp
                }
            }
            '|' => {
                if self.eat(b'|') {
                    if self.eat(b'=') {
                        TokKind::PipePipeEq
                    } else {
                        TokKind::PipePipe
                    }
                } else if self.eat(b'=') {
                    TokKind::PipeEq
                } else {
                    TokKind::Pipe
                }
            }
            '^' => {
                if self.eat(b'=') {
                    TokKind::CaretEq
                } else {
                    TokKind::Caret
                }
            }
            '\'' | '"' => self.lex_string(c),
            '`' => self.lex_template(true),
            '#' => {
                let name_start = self.pos;
                self.eat_ident_rest();
                TokKind::PrivateName(format!("#{}", &self.src[name_start..self.pos]))
            }
            c if c.is_ascii_digit() => self.lex_number(start, false),
            c if is_ident_start(c) => {
                self.eat_ident_rest();
                TokKind::Ident(self.src[start..self.pos].to_string())
            }
            other => TokKind::Error(format!("unexpected character {other:?}")),
        }
    }

    fn eat_ident_rest(&mut self) {
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Raw numeric literal text; conversion happens in the evaluator.
    fn lex_number(&mut self, start: usize, leading_dot: bool) -> TokKind {
        let first = self.src.as_bytes()[start];
        if !leading_dot
            && first == b'0'
            && matches!(
                self.peek_byte(0),
                Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')
            )
        {
            self.pos += 1;
            while matches!(self.peek_byte(0), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
                self.pos += 1;
            }
            return TokKind::Num(self.src[start..self.pos].to_string());
        }

        self.eat_digits();
        if !leading_dot
            && self.peek_byte(0) == Some(b'.')
            && matches!(self.peek_byte(1), Some(b) if b.is_ascii_digit())
        {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek_byte(0), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek_byte(0), Some(b) if b.is_ascii_digit()) {
                self.eat_digits();
            } else {
                self.pos = save;
            }
        }
        // BigInt suffix
        self.eat(b'n');
        TokKind::Num(self.src[start..self.pos].to_string())
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek_byte(0), Some(b) if b.is_ascii_digit() || b == b'_') {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, quote: char) -> TokKind {
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return TokKind::Error("unterminated string literal".to_string());
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    if let Some(real) = self.lex_escape() {
                        s.push(real);
                    }
                }
                Some(c) => s.push(c),
            }
        }
        TokKind::Str(s)
    }

    /// Cooked text of a template segment, starting after `` ` `` or `}`.
    fn lex_template(&mut self, is_start: bool) -> TokKind {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return TokKind::Error("unterminated template literal".to_string()),
                Some('`') => {
                    return if is_start {
                        TokKind::Template(s)
                    } else {
                        TokKind::TemplateTail(s)
                    };
                }
                Some('$') if self.peek_byte(0) == Some(b'{') => {
                    self.pos += 1;
                    self.braces.push(Brace::Template);
                    return if is_start {
                        TokKind::TemplateHead(s)
                    } else {
                        TokKind::TemplateMiddle(s)
                    };
                }
                Some('\\') => {
                    if let Some(real) = self.lex_escape() {
                        s.push(real);
                    }
                }
                Some(c) => s.push(c),
            }
        }
    }

    /// Escape sequence after a backslash. `None` for line continuations.
    fn lex_escape(&mut self) -> Option<char> {
        let esc = self.bump()?;
        let real = match esc {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !matches!(self.peek_byte(0), Some(b) if b.is_ascii_digit()) => '\0',
            'x' => {
                let hex = self.src.get(self.pos..self.pos + 2)?;
                let code = u32::from_str_radix(hex, 16).ok()?;
                self.pos += 2;
                char::from_u32(code)?
            }
            'u' => {
                let code = if self.eat(b'{') {
                    let start = self.pos;
                    while matches!(self.peek_byte(0), Some(b) if b.is_ascii_hexdigit()) {
                        self.pos += 1;
                    }
                    let code = u32::from_str_radix(&self.src[start..self.pos], 16).ok()?;
                    self.eat(b'}');
                    code
                } else {
                    let hex = self.src.get(self.pos..self.pos + 4)?;
                    let code = u32::from_str_radix(hex, 16).ok()?;
                    self.pos += 4;
                    code
                };
                char::from_u32(code).unwrap_or('\u{fffd}')
            }
            '\r' => {
                self.eat(b'\n');
                return None;
            }
            '\n' | '\u{2028}' | '\u{2029}' => return None,
            other => other,
        };
        Some(real)
    }

    fn lex_regex(&mut self, start: usize) -> TokKind {
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return TokKind::Error("unterminated regular expression literal".to_string());
                }
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        // flags
        self.eat_ident_rest();
        TokKind::Regex(self.src[start..self.pos].to_string())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || (!c.is_ascii() && c.is_alphanumeric())
}

fn regex_allowed_after(kind: &TokKind) -> bool {
    match kind {
        TokKind::Ident(word) => matches!(
            word.as_str(),
            "return"
                | "typeof"
                | "instanceof"
                | "in"
                | "of"
                | "new"
                | "delete"
                | "void"
                | "throw"
                | "case"
                | "do"
                | "else"
                | "yield"
                | "await"
        ),
        TokKind::Num(_)
        | TokKind::Str(_)
        | TokKind::Regex(_)
        | TokKind::Template(_)
        | TokKind::TemplateTail(_)
        | TokKind::PrivateName(_)
        | TokKind::RParen
        | TokKind::RBracket
        | TokKind::RBrace
        | TokKind::PlusPlus
        | TokKind::MinusMinus => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lex.next_tok();
            if tok.kind == TokKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn numbers_keep_raw_text() {
        assert_eq!(
            kinds("0x1F 1_000 1.5e3 .5 10n"),
            vec![
                TokKind::Num("0x1F".into()),
                TokKind::Num("1_000".into()),
                TokKind::Num("1.5e3".into()),
                TokKind::Num(".5".into()),
                TokKind::Num("10n".into()),
            ]
        );
    }

    #[test]
    fn slash_is_regex_only_in_operand_position() {
        assert_eq!(
            kinds("a / b"),
            vec![
                TokKind::Ident("a".into()),
                TokKind::Slash,
                TokKind::Ident("b".into())
            ]
        );
        assert_eq!(
            kinds("x = /ab+c/gi"),
            vec![
                TokKind::Ident("x".into()),
                TokKind::Eq,
                TokKind::Regex("/ab+c/gi".into())
            ]
        );
    }

    #[test]
    fn template_with_nested_braces() {
        assert_eq!(
            kinds("`a${ {b: 1}.b }c`"),
            vec![
                TokKind::TemplateHead("a".into()),
                TokKind::LBrace,
                TokKind::Ident("b".into()),
                TokKind::Colon,
                TokKind::Num("1".into()),
                TokKind::RBrace,
                TokKind::Dot,
                TokKind::Ident("b".into()),
                TokKind::TemplateTail("c".into()),
            ]
        );
    }

    #[test]
    fn comments_are_recorded_against_next_token() {
        let mut lex = Lexer::new("// one\n/* two */ x");
        let tok = lex.next_tok();
        assert!(tok.nl_before);
        assert_eq!(tok.comments, (0, 2));
        assert_eq!(lex.comments[0].text, "// one");
        assert_eq!(lex.comments[1].kind, CommentKind::Block);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'a\n\x41B\u{43}'"#),
            vec![TokKind::Str("a\nABC".into())]
        );
    }
}
