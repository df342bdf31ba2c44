use cirrus_ast::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    // trivia / eof / error
    Eof,
    /// Unterminated literal or unexpected character
    Error(String),
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    Question,
    QuestionDot,
    FatArrow,
    At,
    // assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    UShrEq,
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,
    // arithmetic
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    // equality
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    // bitwise
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    UShr,
    // logical
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    Bang,
    // idents / keywords (keywords are contextual; the parser checks the text)
    Ident(String),
    /// `#name` class member
    PrivateName(String),
    // literals
    Num(String),
    Str(String),
    Regex(String),
    /// `` `abc` `` with no substitutions
    Template(String),
    /// `` `abc${ ``
    TemplateHead(String),
    /// `` }abc${ ``
    TemplateMiddle(String),
    /// `` }abc` ``
    TemplateTail(String),
}

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
    /// A line terminator precedes this token (automatic semicolon insertion).
    pub nl_before: bool,
    /// Range of `Lexer::comments` that precede this token.
    pub comments: (usize, usize),
}

impl Tok {
    pub fn is_ident(&self, text: &str) -> bool {
        matches!(&self.kind, TokKind::Ident(s) if s == text)
    }
}
