use std::sync::atomic::{AtomicU32, Ordering};

use crate::lexer::{LexState, Lexer};
use crate::token::{Tok, TokKind};
use anyhow::{anyhow, bail, Result};
use cirrus_ast::ast::{
    ArrayPat, ArrayPatElem, AssignOp, AssignTarget, BinaryOp, Block, CatchClause, Class,
    ClassMember, Expr, ExprKind, ExprOrSpread, ExportSpecifier, FnBody, ForHead, ForInit,
    Function, FunctionKind, Ident, ImportDecl, ImportKind, ImportSpecifier, ObjectPat,
    ObjectPatProp, Param, Pat, Prop, PropKey, Stmt, StmtKind, SwitchCase, Template, UnaryOp,
    UpdateOp, VarDecl, VarDeclarator, VarKind,
};
use cirrus_ast::{Comment, FileId, NodeId, SourceFile, Span};

/// Deepest statement/expression/type nesting accepted.
pub const MAX_NESTING_DEPTH: u32 = 256;
/// Largest accepted source text, in bytes.
pub const MAX_SOURCE_SIZE: usize = 1024 * 1024;

const RED_ZONE: usize = 64 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(0);

/// Words that can never start an expression.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "const", "continue", "debugger", "default", "do", "else",
    "export", "extends", "finally", "for", "if", "in", "instanceof", "return", "switch",
    "throw", "try", "var", "while", "with",
];

const PARAM_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

const CLASS_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "static", "readonly", "abstract", "override", "declare",
    "accessor",
];

pub fn parse_str(file: &str, src: &str) -> Result<SourceFile> {
    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "{file}: source is {} bytes, larger than the {MAX_SOURCE_SIZE} byte limit",
            src.len()
        );
    }
    let mut p = Parser::new(file, src);
    let header = p.leading_comments();
    let stmts = p.parse_module()?;
    let id = FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed));
    Ok(SourceFile::new(id, file, src, stmts, header, p.next_id))
}

/// Parser state captured before a speculative parse.
struct Saved {
    lex: LexState,
    cur: Tok,
    nxt: Tok,
    prev_end: u32,
    next_id: u32,
    depth: u32,
}

struct Parser<'a> {
    file: &'a str,
    src: &'a str,
    lex: Lexer<'a>,
    cur: Tok,
    nxt: Tok,
    /// End offset of the last consumed token.
    prev_end: u32,
    next_id: u32,
    depth: u32,
    in_generator: bool,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str, src: &'a str) -> Self {
        let mut lex = Lexer::new(src);
        let cur = lex.next_tok();
        let nxt = lex.next_tok();
        Self {
            file,
            src,
            lex,
            cur,
            nxt,
            prev_end: 0,
            next_id: 0,
            depth: 0,
            in_generator: false,
        }
    }

    fn bump(&mut self) {
        self.prev_end = self.cur.span.end;
        self.cur = std::mem::replace(&mut self.nxt, self.lex.next_tok());
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur.kind) == std::mem::discriminant(k)
    }

    fn eat(&mut self, k: &TokKind) -> bool {
        if self.at(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn at_kw(&self, kw: &str) -> bool {
        self.cur.is_ident(kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, k: TokKind) -> Result<()> {
        if self.eat(&k) {
            Ok(())
        } else {
            Err(self.unexpected(token_text(&k)))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{kw}'")))
        }
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn expr(&mut self, kind: ExprKind, start: u32) -> Expr {
        Expr {
            id: self.node_id(),
            kind,
            span: self.span_from(start),
        }
    }

    fn save(&self) -> Saved {
        Saved {
            lex: self.lex.checkpoint(),
            cur: self.cur.clone(),
            nxt: self.nxt.clone(),
            prev_end: self.prev_end,
            next_id: self.next_id,
            depth: self.depth,
        }
    }

    fn restore(&mut self, saved: Saved) {
        self.lex.restore(saved.lex);
        self.cur = saved.cur;
        self.nxt = saved.nxt;
        self.prev_end = saved.prev_end;
        self.next_id = saved.next_id;
        self.depth = saved.depth;
    }

    fn leading_comments(&self) -> Vec<Comment> {
        let (from, to) = self.cur.comments;
        self.lex.comments[from..to].to_vec()
    }

    fn error(&self, msg: impl std::fmt::Display) -> anyhow::Error {
        let (line, col) = line_col(self.src, self.cur.span.start);
        anyhow!("{}:{}:{}: {}", self.file, line, col, msg)
    }

    fn unexpected(&self, expected: &str) -> anyhow::Error {
        match &self.cur.kind {
            TokKind::Error(msg) => self.error(msg),
            TokKind::Eof => self.error(format!("expected {expected}, found end of input")),
            _ => {
                let text = &self.src[self.cur.span.start as usize..self.cur.span.end as usize];
                self.error(format!("expected {expected}, found '{text}'"))
            }
        }
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING_DEPTH`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "nesting depth exceeds the limit of {MAX_NESTING_DEPTH}"
            )));
        }
        self.depth += 1;
        let out = stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || f(self));
        self.depth -= 1;
        out
    }

    /// Statement terminator with automatic semicolon insertion.
    fn consume_semi(&mut self) -> Result<()> {
        if self.eat(&TokKind::Semicolon)
            || self.at(&TokKind::RBrace)
            || self.at(&TokKind::Eof)
            || self.cur.nl_before
        {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    fn ident(&mut self) -> Result<Ident> {
        match &self.cur.kind {
            TokKind::Ident(name) => {
                let name = name.clone();
                let span = self.cur.span;
                self.bump();
                Ok(Ident {
                    id: self.node_id(),
                    name,
                    span,
                })
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Property name after `.`: any identifier, keyword or private name.
    fn member_name(&mut self) -> Result<String> {
        match &self.cur.kind {
            TokKind::Ident(name) | TokKind::PrivateName(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    fn string_lit(&mut self) -> Result<String> {
        match &self.cur.kind {
            TokKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn nxt_starts_key(&self) -> bool {
        matches!(
            self.nxt.kind,
            TokKind::Ident(_)
                | TokKind::Str(_)
                | TokKind::Num(_)
                | TokKind::LBracket
                | TokKind::PrivateName(_)
        )
    }

    // ======= module / statements =======

    fn parse_module(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at(&TokKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        self.nested(|p| p.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt> {
        let start = self.cur.span.start;
        let leading_comments = self.leading_comments();
        self.skip_decorators()?;
        if self.at_kw("export") {
            return self.parse_export(start, leading_comments);
        }
        let kind = self.parse_stmt_kind()?;
        Ok(Stmt {
            id: self.node_id(),
            kind,
            exported: false,
            leading_comments,
            span: self.span_from(start),
        })
    }

    fn parse_stmt_kind(&mut self) -> Result<StmtKind> {
        match self.cur.kind.clone() {
            TokKind::LBrace => Ok(StmtKind::Block(self.parse_block()?)),
            TokKind::Semicolon => {
                self.bump();
                Ok(StmtKind::Empty)
            }
            TokKind::Ident(word) => self.parse_word_stmt(&word),
            _ => self.parse_expr_stmt(),
        }
    }

    fn at_var_decl(&self) -> bool {
        let TokKind::Ident(word) = &self.cur.kind else {
            return false;
        };
        match word.as_str() {
            "var" | "const" => true,
            "let" => matches!(
                self.nxt.kind,
                TokKind::Ident(_) | TokKind::LBracket | TokKind::LBrace
            ),
            "using" => {
                !self.nxt.nl_before
                    && matches!(&self.nxt.kind, TokKind::Ident(n) if n != "of" && n != "in")
            }
            "await" => self.nxt.is_ident("using"),
            _ => false,
        }
    }

    fn parse_word_stmt(&mut self, word: &str) -> Result<StmtKind> {
        let same_line = !self.nxt.nl_before;
        let nxt_ident = matches!(self.nxt.kind, TokKind::Ident(_));
        match word {
            "const" if self.nxt.is_ident("enum") => {
                self.bump();
                self.parse_enum()
            }
            _ if self.at_var_decl() => {
                let decl = self.parse_var_decl(false)?;
                self.consume_semi()?;
                Ok(StmtKind::Var(decl))
            }
            "function" => Ok(StmtKind::Function(Box::new(
                self.parse_function_decl(FunctionKind::Declaration)?,
            ))),
            "async" if self.nxt.is_ident("function") && same_line => Ok(StmtKind::Function(
                Box::new(self.parse_function_decl(FunctionKind::Declaration)?),
            )),
            "class" => Ok(StmtKind::Class(Box::new(self.parse_class(true)?))),
            "abstract" if self.nxt.is_ident("class") => {
                self.bump();
                Ok(StmtKind::Class(Box::new(self.parse_class(true)?)))
            }
            "if" => {
                self.bump();
                self.expect(TokKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                let cons = Box::new(self.parse_stmt()?);
                let alt = if self.eat_kw("else") {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(StmtKind::If { test, cons, alt })
            }
            "while" => {
                self.bump();
                self.expect(TokKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(StmtKind::While { test, body })
            }
            "do" => {
                self.bump();
                let body = Box::new(self.parse_stmt()?);
                self.expect_kw("while")?;
                self.expect(TokKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(TokKind::RParen)?;
                self.eat(&TokKind::Semicolon);
                Ok(StmtKind::DoWhile { body, test })
            }
            "for" => self.parse_for(),
            "switch" => self.parse_switch(),
            "try" => self.parse_try(),
            "throw" => {
                self.bump();
                let arg = self.parse_expr()?;
                self.consume_semi()?;
                Ok(StmtKind::Throw(arg))
            }
            "return" => {
                self.bump();
                let arg = if self.at(&TokKind::Semicolon)
                    || self.at(&TokKind::RBrace)
                    || self.at(&TokKind::Eof)
                    || self.cur.nl_before
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.consume_semi()?;
                Ok(StmtKind::Return(arg))
            }
            "break" | "continue" => {
                self.bump();
                // label
                if matches!(self.cur.kind, TokKind::Ident(_)) && !self.cur.nl_before {
                    self.bump();
                }
                self.consume_semi()?;
                Ok(if word == "break" {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                })
            }
            "import" if !matches!(self.nxt.kind, TokKind::LParen | TokKind::Dot) => {
                self.parse_import()
            }
            "type" if nxt_ident && same_line => self.parse_type_alias(),
            "interface" if nxt_ident && same_line => self.parse_interface(),
            "enum" if nxt_ident => self.parse_enum(),
            "declare" if nxt_ident && same_line => self.parse_declare(),
            "namespace" | "module"
                if same_line && matches!(self.nxt.kind, TokKind::Ident(_) | TokKind::Str(_)) =>
            {
                self.skip_namespace()
            }
            _ if matches!(self.nxt.kind, TokKind::Colon) && !RESERVED.contains(&word) => {
                // labelled statement; labels carry no meaning here
                self.bump();
                self.bump();
                self.parse_stmt_kind()
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_expr_stmt(&mut self) -> Result<StmtKind> {
        let expr = self.parse_expr()?;
        self.consume_semi()?;
        Ok(StmtKind::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.cur.span.start;
        self.expect(TokKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&TokKind::RBrace) {
            if self.at(&TokKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokKind::RBrace)?;
        Ok(Block {
            id: self.node_id(),
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_fn_body(&mut self, is_generator: bool) -> Result<Block> {
        let outer = std::mem::replace(&mut self.in_generator, is_generator);
        let body = self.parse_block();
        self.in_generator = outer;
        body
    }

    fn parse_var_decl(&mut self, no_in: bool) -> Result<VarDecl> {
        let kind = if self.eat_kw("await") {
            self.expect_kw("using")?;
            VarKind::AwaitUsing
        } else {
            let kind = match &self.cur.kind {
                TokKind::Ident(w) if w == "var" => VarKind::Var,
                TokKind::Ident(w) if w == "let" => VarKind::Let,
                TokKind::Ident(w) if w == "const" => VarKind::Const,
                TokKind::Ident(w) if w == "using" => VarKind::Using,
                _ => return Err(self.unexpected("variable declaration")),
            };
            self.bump();
            kind
        };

        let mut decls = Vec::new();
        loop {
            let start = self.cur.span.start;
            let name = self.parse_binding_pat()?;
            // definite assignment: `let x!: T`
            self.eat(&TokKind::Bang);
            if self.eat(&TokKind::Colon) {
                self.skip_type()?;
            }
            let init = if self.eat(&TokKind::Eq) {
                Some(self.parse_assign(no_in)?)
            } else {
                None
            };
            decls.push(VarDeclarator {
                id: self.node_id(),
                name,
                init,
                span: self.span_from(start),
            });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        Ok(VarDecl { kind, decls })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.bump();
        let is_await = self.eat_kw("await");
        self.expect(TokKind::LParen)?;

        let init = if self.at(&TokKind::Semicolon) {
            None
        } else if self.at_var_decl() {
            Some(ForInit::Var(self.parse_var_decl(true)?))
        } else {
            Some(ForInit::Expr(self.parse_assign(true)?))
        };

        if self.at_kw("of") || self.at_kw("in") {
            let is_of = self.at_kw("of");
            self.bump();
            let head = match init {
                Some(ForInit::Var(mut decl)) if decl.decls.len() == 1 => {
                    let declarator = decl.decls.remove(0);
                    if declarator.init.is_some() {
                        return Err(self.error("for-in/of variable may not have an initializer"));
                    }
                    ForHead {
                        kind: Some(decl.kind),
                        pat: declarator.name,
                    }
                }
                Some(ForInit::Expr(expr)) => ForHead {
                    kind: None,
                    pat: self.expr_to_pat(expr)?,
                },
                _ => return Err(self.error("invalid left-hand side in for-in/of loop")),
            };
            let right = if is_of {
                self.parse_assign(false)?
            } else {
                self.parse_expr()?
            };
            self.expect(TokKind::RParen)?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(if is_of {
                StmtKind::ForOf {
                    head,
                    right,
                    body,
                    is_await,
                }
            } else {
                StmtKind::ForIn { head, right, body }
            });
        }

        self.expect(TokKind::Semicolon)?;
        let test = if self.at(&TokKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokKind::Semicolon)?;
        let update = if self.at(&TokKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<StmtKind> {
        self.bump();
        self.expect(TokKind::LParen)?;
        let discriminant = self.parse_expr()?;
        self.expect(TokKind::RParen)?;
        self.expect(TokKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            let start = self.cur.span.start;
            let test = if self.eat_kw("case") {
                Some(self.parse_expr()?)
            } else {
                self.expect_kw("default")?;
                None
            };
            self.expect(TokKind::Colon)?;
            let mut body = Vec::new();
            while !self.at_kw("case") && !self.at_kw("default") && !self.at(&TokKind::RBrace) {
                if self.at(&TokKind::Eof) {
                    return Err(self.unexpected("'}'"));
                }
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase {
                id: self.node_id(),
                test,
                body,
                span: self.span_from(start),
            });
        }
        Ok(StmtKind::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_try(&mut self) -> Result<StmtKind> {
        self.bump();
        let block = self.parse_block()?;
        let start = self.cur.span.start;
        let handler = if self.eat_kw("catch") {
            let param = if self.eat(&TokKind::LParen) {
                let pat = self.parse_binding_pat()?;
                if self.eat(&TokKind::Colon) {
                    self.skip_type()?;
                }
                self.expect(TokKind::RParen)?;
                Some(pat)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                id: self.node_id(),
                param,
                body,
                span: self.span_from(start),
            })
        } else {
            None
        };
        let finalizer = if self.eat_kw("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(StmtKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    // ======= modules =======

    fn parse_import(&mut self) -> Result<StmtKind> {
        let start = self.cur.span.start;
        self.bump();

        // side-effect import
        if let TokKind::Str(source) = self.cur.kind.clone() {
            self.bump();
            self.skip_import_attributes()?;
            self.consume_semi()?;
            return Ok(StmtKind::Import(ImportDecl {
                specifiers: Vec::new(),
                source,
            }));
        }

        if self.at_kw("type")
            && !self.nxt.is_ident("from")
            && matches!(
                self.nxt.kind,
                TokKind::Ident(_) | TokKind::LBrace | TokKind::Star
            )
        {
            self.bump();
        }

        let mut specifiers = Vec::new();
        if matches!(self.cur.kind, TokKind::Ident(_)) {
            let local = self.ident()?;
            // `import x = require("m")`
            if self.eat(&TokKind::Eq) {
                let init = self.parse_expr()?;
                self.consume_semi()?;
                return Ok(StmtKind::Var(VarDecl {
                    kind: VarKind::Const,
                    decls: vec![VarDeclarator {
                        id: self.node_id(),
                        name: Pat::Ident(local),
                        init: Some(init),
                        span: self.span_from(start),
                    }],
                }));
            }
            specifiers.push(ImportSpecifier {
                kind: ImportKind::Default,
                local,
                imported: None,
            });
            if self.eat(&TokKind::Comma) {
                self.parse_import_clause(&mut specifiers)?;
            }
        } else {
            self.parse_import_clause(&mut specifiers)?;
        }

        self.expect_kw("from")?;
        let source = self.string_lit()?;
        self.skip_import_attributes()?;
        self.consume_semi()?;
        Ok(StmtKind::Import(ImportDecl { specifiers, source }))
    }

    /// `* as ns` or `{ a, b as c }`
    fn parse_import_clause(&mut self, specifiers: &mut Vec<ImportSpecifier>) -> Result<()> {
        if self.eat(&TokKind::Star) {
            self.expect_kw("as")?;
            let local = self.ident()?;
            specifiers.push(ImportSpecifier {
                kind: ImportKind::Namespace,
                local,
                imported: None,
            });
            return Ok(());
        }
        self.expect(TokKind::LBrace)?;
        while !self.eat(&TokKind::RBrace) {
            if self.at_kw("type") && matches!(self.nxt.kind, TokKind::Ident(_) | TokKind::Str(_))
            {
                self.bump();
            }
            let span = self.cur.span;
            let imported = match self.cur.kind.clone() {
                TokKind::Ident(name) | TokKind::Str(name) => {
                    self.bump();
                    name
                }
                _ => return Err(self.unexpected("imported name")),
            };
            let local = if self.eat_kw("as") {
                self.ident()?
            } else {
                Ident {
                    id: self.node_id(),
                    name: imported.clone(),
                    span,
                }
            };
            specifiers.push(ImportSpecifier {
                kind: ImportKind::Named,
                local,
                imported: Some(imported),
            });
            if !self.eat(&TokKind::Comma) {
                self.expect(TokKind::RBrace)?;
                break;
            }
        }
        Ok(())
    }

    /// `with { type: "json" }` / `assert { ... }`
    fn skip_import_attributes(&mut self) -> Result<()> {
        if (self.at_kw("with") || self.at_kw("assert")) && !self.cur.nl_before {
            self.bump();
            self.skip_balanced()?;
        }
        Ok(())
    }

    fn parse_export(&mut self, start: u32, leading_comments: Vec<Comment>) -> Result<Stmt> {
        self.bump();
        let kind = if self.eat_kw("default") {
            let expr_start = self.cur.span.start;
            if self.at_kw("function")
                || (self.at_kw("async") && self.nxt.is_ident("function") && !self.nxt.nl_before)
            {
                let func = self.parse_function_decl(FunctionKind::Declaration)?;
                StmtKind::ExportDefault(self.expr(ExprKind::Function(Box::new(func)), expr_start))
            } else if self.at_kw("class") || self.at_kw("abstract") {
                self.eat_kw("abstract");
                let class = self.parse_class(false)?;
                StmtKind::ExportDefault(self.expr(ExprKind::Class(Box::new(class)), expr_start))
            } else if self.at_kw("interface") && matches!(self.nxt.kind, TokKind::Ident(_)) {
                self.parse_interface()?
            } else {
                let expr = self.parse_assign(false)?;
                self.consume_semi()?;
                StmtKind::ExportDefault(expr)
            }
        } else if self.eat(&TokKind::Eq) {
            // `export = value`
            let expr = self.parse_expr()?;
            self.consume_semi()?;
            StmtKind::ExportDefault(expr)
        } else if self.eat(&TokKind::Star) {
            if self.eat_kw("as") {
                self.member_name()?;
            }
            self.expect_kw("from")?;
            let source = self.string_lit()?;
            self.skip_import_attributes()?;
            self.consume_semi()?;
            StmtKind::ExportNamed {
                specifiers: Vec::new(),
                source: Some(source),
            }
        } else if self.at(&TokKind::LBrace)
            || (self.at_kw("type") && matches!(self.nxt.kind, TokKind::LBrace))
        {
            self.eat_kw("type");
            self.parse_export_list()?
        } else {
            let inner = self.parse_stmt()?;
            return Ok(Stmt {
                exported: true,
                leading_comments,
                span: self.span_from(start),
                ..inner
            });
        };
        Ok(Stmt {
            id: self.node_id(),
            kind,
            exported: false,
            leading_comments,
            span: self.span_from(start),
        })
    }

    fn parse_export_list(&mut self) -> Result<StmtKind> {
        self.expect(TokKind::LBrace)?;
        let mut specifiers = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            if self.at_kw("type") && matches!(self.nxt.kind, TokKind::Ident(_)) {
                self.bump();
            }
            let local = self.ident()?;
            let exported = if self.eat_kw("as") {
                match self.cur.kind.clone() {
                    TokKind::Ident(name) | TokKind::Str(name) => {
                        self.bump();
                        name
                    }
                    _ => return Err(self.unexpected("export name")),
                }
            } else {
                local.name.clone()
            };
            specifiers.push(ExportSpecifier { local, exported });
            if !self.eat(&TokKind::Comma) {
                self.expect(TokKind::RBrace)?;
                break;
            }
        }
        let source = if self.eat_kw("from") {
            Some(self.string_lit()?)
        } else {
            None
        };
        self.consume_semi()?;
        Ok(StmtKind::ExportNamed { specifiers, source })
    }

    // ======= erased TypeScript declarations =======

    fn parse_type_alias(&mut self) -> Result<StmtKind> {
        self.bump();
        let name = self.ident()?;
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        self.expect(TokKind::Eq)?;
        self.skip_type()?;
        self.consume_semi()?;
        Ok(StmtKind::TypeDecl { name: Some(name) })
    }

    fn parse_interface(&mut self) -> Result<StmtKind> {
        self.bump();
        let name = self.ident()?;
        while !self.at(&TokKind::LBrace) {
            if self.at(&TokKind::Eof) {
                return Err(self.unexpected("'{'"));
            }
            if self.at(&TokKind::Lt) {
                self.skip_angles()?;
            } else {
                self.bump();
            }
        }
        self.skip_balanced()?;
        Ok(StmtKind::TypeDecl { name: Some(name) })
    }

    fn skip_namespace(&mut self) -> Result<StmtKind> {
        self.bump();
        let name = match self.cur.kind {
            TokKind::Ident(_) => {
                let name = self.ident()?;
                while self.eat(&TokKind::Dot) {
                    self.member_name()?;
                }
                Some(name)
            }
            _ => {
                self.string_lit()?;
                None
            }
        };
        if self.at(&TokKind::LBrace) {
            self.skip_balanced()?;
        } else {
            self.consume_semi()?;
        }
        Ok(StmtKind::TypeDecl { name })
    }

    /// `declare ...` introduces no runtime binding.
    fn parse_declare(&mut self) -> Result<StmtKind> {
        self.bump();
        if self.at_kw("global") {
            self.bump();
            self.skip_balanced()?;
            return Ok(StmtKind::TypeDecl { name: None });
        }
        if self.at_kw("module") || self.at_kw("namespace") {
            return self.skip_namespace();
        }
        let inner = self.parse_stmt_kind()?;
        let name = match inner {
            StmtKind::Var(decl) => decl
                .decls
                .first()
                .and_then(|d| d.name.bound_names().first().map(|id| (*id).clone())),
            StmtKind::Function(func) => func.name,
            StmtKind::Class(class) => class.name,
            StmtKind::TypeDecl { name } => name,
            _ => None,
        };
        Ok(StmtKind::TypeDecl { name })
    }

    /// `enum E { A, B = 5 }` lowers to `const E = { A: 0, B: 5 }`.
    fn parse_enum(&mut self) -> Result<StmtKind> {
        let start = self.cur.span.start;
        self.bump();
        let name = self.ident()?;
        let obj_start = self.cur.span.start;
        self.expect(TokKind::LBrace)?;
        let mut props = Vec::new();
        let mut next = 0.0f64;
        while !self.at(&TokKind::RBrace) {
            let key_start = self.cur.span.start;
            let key = match self.cur.kind.clone() {
                TokKind::Ident(s) => PropKey::Ident(s),
                TokKind::Str(s) => PropKey::Str(s),
                _ => return Err(self.unexpected("enum member name")),
            };
            self.bump();
            let value = if self.eat(&TokKind::Eq) {
                let value = self.parse_assign(false)?;
                next = match &value.kind {
                    ExprKind::Num(raw) => raw.parse::<f64>().map_or(next + 1.0, |v| v + 1.0),
                    _ => next + 1.0,
                };
                value
            } else {
                let value = self.expr(ExprKind::Num(next.to_string()), key_start);
                next += 1.0;
                value
            };
            props.push(Prop::KeyValue { key, value });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RBrace)?;
        let init = self.expr(ExprKind::Object(props), obj_start);
        Ok(StmtKind::Var(VarDecl {
            kind: VarKind::Const,
            decls: vec![VarDeclarator {
                id: self.node_id(),
                name: Pat::Ident(name),
                init: Some(init),
                span: self.span_from(start),
            }],
        }))
    }

    // ======= functions and classes =======

    fn parse_function_decl(&mut self, kind: FunctionKind) -> Result<Function> {
        let start = self.cur.span.start;
        let is_async = self.eat_kw("async");
        self.expect_kw("function")?;
        let is_generator = self.eat(&TokKind::Star);
        let name = if matches!(self.cur.kind, TokKind::Ident(_)) {
            Some(self.ident()?)
        } else {
            None
        };
        self.parse_function_rest(start, kind, name, is_async, is_generator)
    }

    /// Type parameters, parameter list, return type and body.
    fn parse_function_rest(
        &mut self,
        start: u32,
        kind: FunctionKind,
        name: Option<Ident>,
        is_async: bool,
        is_generator: bool,
    ) -> Result<Function> {
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        let params = self.parse_params()?;
        if self.eat(&TokKind::Colon) {
            self.skip_type()?;
        }
        let body = if self.at(&TokKind::LBrace) {
            Some(FnBody::Block(self.parse_fn_body(is_generator)?))
        } else {
            // overload signature or ambient declaration
            self.consume_semi()?;
            None
        };
        Ok(Function {
            id: self.node_id(),
            name,
            kind,
            params,
            body,
            is_async,
            is_generator,
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect(TokKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(&TokKind::RParen) {
            let param = self.parse_param()?;
            // `this: T` only annotates the receiver
            if !matches!(&param.pat, Pat::Ident(id) if id.name == "this") {
                params.push(param);
            }
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RParen)?;
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param> {
        let start = self.cur.span.start;
        self.skip_decorators()?;
        let mut property = false;
        while PARAM_MODIFIERS.iter().any(|m| self.at_kw(m))
            && matches!(
                self.nxt.kind,
                TokKind::Ident(_) | TokKind::LBrace | TokKind::LBracket
            )
        {
            self.bump();
            property = true;
        }
        let rest = self.eat(&TokKind::Ellipsis);
        let pat = self.parse_binding_pat()?;
        self.eat(&TokKind::Question);
        if self.eat(&TokKind::Colon) {
            self.skip_type()?;
        }
        let default = if self.eat(&TokKind::Eq) {
            Some(self.parse_assign(false)?)
        } else {
            None
        };
        Ok(Param {
            id: self.node_id(),
            pat,
            default,
            rest,
            property,
            span: self.span_from(start),
        })
    }

    fn parse_class(&mut self, is_decl: bool) -> Result<Class> {
        let start = self.cur.span.start;
        self.expect_kw("class")?;
        let name = if matches!(self.cur.kind, TokKind::Ident(_))
            && !self.at_kw("extends")
            && !self.at_kw("implements")
        {
            Some(self.ident()?)
        } else if is_decl {
            return Err(self.unexpected("class name"));
        } else {
            None
        };
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        let super_class = if self.eat_kw("extends") {
            Some(Box::new(self.parse_call_member()?))
        } else {
            None
        };
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        if self.eat_kw("implements") {
            while !self.at(&TokKind::LBrace) && !self.at(&TokKind::Eof) {
                if self.at(&TokKind::Lt) {
                    self.skip_angles()?;
                } else {
                    self.bump();
                }
            }
        }

        self.expect(TokKind::LBrace)?;
        let mut members = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            if self.at(&TokKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            if let Some(member) = self.parse_class_member()? {
                members.push(member);
            }
        }
        Ok(Class {
            id: self.node_id(),
            name,
            super_class,
            members,
            span: self.span_from(start),
        })
    }

    /// `None` for members with no runtime effect (signatures, index signatures, static blocks).
    fn parse_class_member(&mut self) -> Result<Option<ClassMember>> {
        if self.eat(&TokKind::Semicolon) {
            return Ok(None);
        }
        let start = self.cur.span.start;
        self.skip_decorators()?;

        if self.at_kw("static") && matches!(self.nxt.kind, TokKind::LBrace) {
            self.bump();
            self.parse_block()?;
            return Ok(None);
        }

        let mut is_static = false;
        while CLASS_MODIFIERS.iter().any(|m| self.at_kw(m))
            && (self.nxt_starts_key() || matches!(self.nxt.kind, TokKind::Star))
            && !self.nxt.nl_before
        {
            if self.at_kw("static") {
                is_static = true;
            }
            self.bump();
        }

        // index signature: `[key: string]: T;`
        if self.at(&TokKind::LBracket) && matches!(self.nxt.kind, TokKind::Ident(_)) {
            let saved = self.save();
            self.bump();
            self.bump();
            if self.eat(&TokKind::Colon) {
                self.skip_type()?;
                self.expect(TokKind::RBracket)?;
                if self.eat(&TokKind::Colon) {
                    self.skip_type()?;
                }
                self.consume_semi()?;
                return Ok(None);
            }
            self.restore(saved);
        }

        let accessor = if (self.at_kw("get") || self.at_kw("set")) && self.nxt_starts_key() {
            let getter = self.at_kw("get");
            self.bump();
            Some(getter)
        } else {
            None
        };
        let is_async = accessor.is_none()
            && self.at_kw("async")
            && !self.nxt.nl_before
            && (self.nxt_starts_key() || matches!(self.nxt.kind, TokKind::Star));
        if is_async {
            self.bump();
        }
        let is_generator = self.eat(&TokKind::Star);

        if accessor.is_none()
            && !is_async
            && !is_generator
            && self.at_kw("constructor")
            && matches!(self.nxt.kind, TokKind::LParen)
        {
            self.bump();
            let func =
                self.parse_function_rest(start, FunctionKind::Constructor, None, false, false)?;
            return Ok(func.body.is_some().then_some(ClassMember::Constructor(func)));
        }

        let key = self.parse_prop_key()?;
        self.eat(&TokKind::Question);
        self.eat(&TokKind::Bang);

        if accessor.is_some()
            || is_async
            || is_generator
            || self.at(&TokKind::LParen)
            || self.at(&TokKind::Lt)
        {
            let kind = match accessor {
                Some(true) => FunctionKind::Getter,
                Some(false) => FunctionKind::Setter,
                None => FunctionKind::Method,
            };
            let func = self.parse_function_rest(start, kind, None, is_async, is_generator)?;
            if func.body.is_none() {
                return Ok(None);
            }
            return Ok(Some(ClassMember::Method {
                key,
                func,
                is_static,
            }));
        }

        if self.eat(&TokKind::Colon) {
            self.skip_type()?;
        }
        let value = if self.eat(&TokKind::Eq) {
            Some(self.parse_assign(false)?)
        } else {
            None
        };
        self.consume_semi()?;
        Ok(Some(ClassMember::Field {
            key,
            value,
            is_static,
            span: self.span_from(start),
        }))
    }

    fn skip_decorators(&mut self) -> Result<()> {
        while self.eat(&TokKind::At) {
            self.parse_call_member()?;
        }
        Ok(())
    }

    // ======= binding patterns =======

    fn parse_binding_pat(&mut self) -> Result<Pat> {
        match self.cur.kind {
            TokKind::LBracket => self.nested(|p| p.parse_array_pat()),
            TokKind::LBrace => self.nested(|p| p.parse_object_pat()),
            TokKind::Ident(_) => Ok(Pat::Ident(self.ident()?)),
            _ => Err(self.unexpected("binding name or pattern")),
        }
    }

    fn parse_array_pat(&mut self) -> Result<Pat> {
        let start = self.cur.span.start;
        self.expect(TokKind::LBracket)?;
        let mut elems = Vec::new();
        let mut rest = None;
        while !self.at(&TokKind::RBracket) {
            if self.eat(&TokKind::Comma) {
                elems.push(None);
                continue;
            }
            if self.eat(&TokKind::Ellipsis) {
                rest = Some(Box::new(self.parse_binding_pat()?));
                break;
            }
            let pat = self.parse_binding_pat()?;
            let default = if self.eat(&TokKind::Eq) {
                Some(self.parse_assign(false)?)
            } else {
                None
            };
            elems.push(Some(ArrayPatElem { pat, default }));
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RBracket)?;
        Ok(Pat::Array(ArrayPat {
            id: self.node_id(),
            elems,
            rest,
            span: self.span_from(start),
        }))
    }

    fn parse_object_pat(&mut self) -> Result<Pat> {
        let start = self.cur.span.start;
        self.expect(TokKind::LBrace)?;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.at(&TokKind::RBrace) {
            if self.eat(&TokKind::Ellipsis) {
                rest = Some(self.ident()?);
                break;
            }
            let prop_start = self.cur.span.start;
            let key_span = self.cur.span;
            let key = self.parse_prop_key()?;
            let value = if self.eat(&TokKind::Colon) {
                self.parse_binding_pat()?
            } else {
                match &key {
                    PropKey::Ident(name) => Pat::Ident(Ident {
                        id: self.node_id(),
                        name: name.clone(),
                        span: key_span,
                    }),
                    _ => return Err(self.unexpected("':'")),
                }
            };
            let default = if self.eat(&TokKind::Eq) {
                Some(self.parse_assign(false)?)
            } else {
                None
            };
            props.push(ObjectPatProp {
                key,
                value,
                default,
                span: self.span_from(prop_start),
            });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RBrace)?;
        Ok(Pat::Object(ObjectPat {
            id: self.node_id(),
            props,
            rest,
            span: self.span_from(start),
        }))
    }

    /// Reinterprets an array/object literal as a destructuring target.
    fn expr_to_pat(&self, expr: Expr) -> Result<Pat> {
        let what = expr.kind.name();
        match expr.kind {
            ExprKind::Ident(name) => Ok(Pat::Ident(Ident {
                id: expr.id,
                name,
                span: expr.span,
            })),
            ExprKind::Paren(inner) => self.expr_to_pat(*inner),
            ExprKind::Array(items) => {
                let count = items.len();
                let mut elems = Vec::new();
                let mut rest = None;
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        None => elems.push(None),
                        Some(ExprOrSpread { spread: true, expr }) => {
                            if i + 1 != count {
                                return Err(self.error("rest element must be last"));
                            }
                            rest = Some(Box::new(self.expr_to_pat(expr)?));
                        }
                        Some(ExprOrSpread { expr, .. }) => {
                            let (pat, default) = self.pat_with_default(expr)?;
                            elems.push(Some(ArrayPatElem { pat, default }));
                        }
                    }
                }
                Ok(Pat::Array(ArrayPat {
                    id: expr.id,
                    elems,
                    rest,
                    span: expr.span,
                }))
            }
            ExprKind::Object(items) => {
                let mut props = Vec::new();
                let mut rest = None;
                for item in items {
                    match item {
                        Prop::KeyValue { key, value } => {
                            let span = value.span;
                            let (value, default) = self.pat_with_default(value)?;
                            props.push(ObjectPatProp {
                                key,
                                value,
                                default,
                                span,
                            });
                        }
                        Prop::Shorthand(Expr {
                            id,
                            kind: ExprKind::Ident(name),
                            span,
                        }) => props.push(ObjectPatProp {
                            key: PropKey::Ident(name.clone()),
                            value: Pat::Ident(Ident { id, name, span }),
                            default: None,
                            span,
                        }),
                        Prop::Spread(Expr {
                            id,
                            kind: ExprKind::Ident(name),
                            span,
                        }) => rest = Some(Ident { id, name, span }),
                        _ => return Err(self.error("invalid destructuring target in object pattern")),
                    }
                }
                Ok(Pat::Object(ObjectPat {
                    id: expr.id,
                    props,
                    rest,
                    span: expr.span,
                }))
            }
            _ => Err(self.error(format!("invalid destructuring target: {what}"))),
        }
    }

    fn pat_with_default(&self, expr: Expr) -> Result<(Pat, Option<Expr>)> {
        match expr.kind {
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => {
                let pat = match *target {
                    AssignTarget::Simple(e) => self.expr_to_pat(e)?,
                    AssignTarget::Pattern(p) => p,
                };
                Ok((pat, Some(*value)))
            }
            kind => Ok((
                self.expr_to_pat(Expr {
                    id: expr.id,
                    kind,
                    span: expr.span,
                })?,
                None,
            )),
        }
    }

    // ======= expressions =======

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assign(false)
    }

    /// Assignment-level expression. `no_in` disables the `in` operator
    /// inside `for (...)` heads.
    fn parse_assign(&mut self, no_in: bool) -> Result<Expr> {
        if let Some(arrow) = self.try_arrow(no_in)? {
            return Ok(arrow);
        }
        if self.in_generator && self.at_kw("yield") {
            return self.parse_yield(no_in);
        }

        let start = self.cur.span.start;
        let lhs = self.parse_conditional(no_in)?;
        let op = match self.cur.kind {
            TokKind::Eq => AssignOp::Assign,
            TokKind::PlusEq => AssignOp::Compound(BinaryOp::Add),
            TokKind::MinusEq => AssignOp::Compound(BinaryOp::Sub),
            TokKind::StarEq => AssignOp::Compound(BinaryOp::Mul),
            TokKind::SlashEq => AssignOp::Compound(BinaryOp::Div),
            TokKind::PercentEq => AssignOp::Compound(BinaryOp::Mod),
            TokKind::StarStarEq => AssignOp::Compound(BinaryOp::Exp),
            TokKind::AmpEq => AssignOp::Compound(BinaryOp::BitAnd),
            TokKind::PipeEq => AssignOp::Compound(BinaryOp::BitOr),
            TokKind::CaretEq => AssignOp::Compound(BinaryOp::BitXor),
            TokKind::ShlEq => AssignOp::Compound(BinaryOp::Shl),
            TokKind::ShrEq => AssignOp::Compound(BinaryOp::Shr),
            TokKind::UShrEq => AssignOp::Compound(BinaryOp::UShr),
            TokKind::AmpAmpEq => AssignOp::Compound(BinaryOp::And),
            TokKind::PipePipeEq => AssignOp::Compound(BinaryOp::Or),
            TokKind::QuestionQuestionEq => AssignOp::Compound(BinaryOp::Nullish),
            _ => return Ok(lhs),
        };
        let target = if op == AssignOp::Assign
            && matches!(lhs.kind, ExprKind::Array(_) | ExprKind::Object(_))
        {
            AssignTarget::Pattern(self.expr_to_pat(lhs)?)
        } else if is_simple_target(&lhs) {
            AssignTarget::Simple(lhs)
        } else {
            return Err(self.error(format!(
                "invalid assignment target: {}",
                lhs.kind.name()
            )));
        };
        self.bump();
        let value = self.parse_assign(no_in)?;
        Ok(self.expr(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    fn parse_yield(&mut self, no_in: bool) -> Result<Expr> {
        let start = self.cur.span.start;
        self.bump();
        let delegate = self.eat(&TokKind::Star);
        let ends = self.cur.nl_before
            || matches!(
                self.cur.kind,
                TokKind::RParen
                    | TokKind::RBracket
                    | TokKind::RBrace
                    | TokKind::Comma
                    | TokKind::Semicolon
                    | TokKind::Colon
                    | TokKind::Eof
            );
        let arg = if delegate || !ends {
            Some(Box::new(self.parse_assign(no_in)?))
        } else {
            None
        };
        Ok(self.expr(ExprKind::Yield { arg, delegate }, start))
    }

    /// Arrow function at the current position, if there is one.
    fn try_arrow(&mut self, no_in: bool) -> Result<Option<Expr>> {
        let start = self.cur.span.start;
        if let TokKind::Ident(name) = &self.cur.kind {
            if matches!(self.nxt.kind, TokKind::FatArrow) && !RESERVED.contains(&name.as_str()) {
                let param = self.single_param()?;
                return self.parse_arrow_body(start, vec![param], false, no_in).map(Some);
            }
        }

        let is_async = self.at_kw("async")
            && !self.nxt.nl_before
            && matches!(
                self.nxt.kind,
                TokKind::Ident(_) | TokKind::LParen | TokKind::Lt
            );
        if !is_async && !matches!(self.cur.kind, TokKind::LParen | TokKind::Lt) {
            return Ok(None);
        }

        let saved = self.save();
        if is_async {
            self.bump();
            if matches!(self.cur.kind, TokKind::Ident(_))
                && matches!(self.nxt.kind, TokKind::FatArrow)
            {
                let param = self.single_param()?;
                return self.parse_arrow_body(start, vec![param], true, no_in).map(Some);
            }
        }
        match self.arrow_head() {
            Ok(params) => self.parse_arrow_body(start, params, is_async, no_in).map(Some),
            Err(_) => {
                self.restore(saved);
                Ok(None)
            }
        }
    }

    fn single_param(&mut self) -> Result<Param> {
        let ident = self.ident()?;
        let span = ident.span;
        Ok(Param {
            id: self.node_id(),
            pat: Pat::Ident(ident),
            default: None,
            rest: false,
            property: false,
            span,
        })
    }

    /// `<T>(a, b): R` up to and excluding `=>`.
    fn arrow_head(&mut self) -> Result<Vec<Param>> {
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        if !self.at(&TokKind::LParen) {
            return Err(self.unexpected("'('"));
        }
        let params = self.parse_params()?;
        if self.eat(&TokKind::Colon) {
            self.skip_type()?;
        }
        if !self.at(&TokKind::FatArrow) || self.cur.nl_before {
            return Err(self.unexpected("'=>'"));
        }
        Ok(params)
    }

    fn parse_arrow_body(
        &mut self,
        start: u32,
        params: Vec<Param>,
        is_async: bool,
        no_in: bool,
    ) -> Result<Expr> {
        self.expect(TokKind::FatArrow)?;
        let body = if self.at(&TokKind::LBrace) {
            FnBody::Block(self.parse_fn_body(false)?)
        } else {
            FnBody::Expr(Box::new(self.parse_assign(no_in)?))
        };
        let func = Function {
            id: self.node_id(),
            name: None,
            kind: FunctionKind::Arrow,
            params,
            body: Some(body),
            is_async,
            is_generator: false,
            span: self.span_from(start),
        };
        Ok(self.expr(ExprKind::Function(Box::new(func)), start))
    }

    fn parse_conditional(&mut self, no_in: bool) -> Result<Expr> {
        let start = self.cur.span.start;
        let test = self.parse_binary(0, no_in)?;
        if !self.eat(&TokKind::Question) {
            return Ok(test);
        }
        let cons = self.parse_assign(false)?;
        self.expect(TokKind::Colon)?;
        let alt = self.parse_assign(no_in)?;
        Ok(self.expr(
            ExprKind::Cond {
                test: Box::new(test),
                cons: Box::new(cons),
                alt: Box::new(alt),
            },
            start,
        ))
    }

    // Precedence (low -> high):
    //   1: ??   2: ||   3: &&   4: |   5: ^   6: &
    //   7: == != === !==
    //   8: < <= > >= in instanceof as satisfies
    //   9: << >> >>>   10: + -   11: * / %   12: ** (right-assoc)
    fn binary_op(&self, no_in: bool) -> Option<(BinaryOp, u8)> {
        let op = match &self.cur.kind {
            TokKind::QuestionQuestion => (BinaryOp::Nullish, 1),
            TokKind::PipePipe => (BinaryOp::Or, 2),
            TokKind::AmpAmp => (BinaryOp::And, 3),
            TokKind::Pipe => (BinaryOp::BitOr, 4),
            TokKind::Caret => (BinaryOp::BitXor, 5),
            TokKind::Amp => (BinaryOp::BitAnd, 6),
            TokKind::EqEq => (BinaryOp::EqEq, 7),
            TokKind::BangEq => (BinaryOp::NotEq, 7),
            TokKind::EqEqEq => (BinaryOp::EqEqEq, 7),
            TokKind::BangEqEq => (BinaryOp::NotEqEq, 7),
            TokKind::Lt => (BinaryOp::Lt, 8),
            TokKind::Le => (BinaryOp::Le, 8),
            TokKind::Gt => (BinaryOp::Gt, 8),
            TokKind::Ge => (BinaryOp::Ge, 8),
            TokKind::Ident(w) if w == "instanceof" => (BinaryOp::InstanceOf, 8),
            TokKind::Ident(w) if w == "in" && !no_in => (BinaryOp::In, 8),
            TokKind::Shl => (BinaryOp::Shl, 9),
            TokKind::Shr => (BinaryOp::Shr, 9),
            TokKind::UShr => (BinaryOp::UShr, 9),
            TokKind::Plus => (BinaryOp::Add, 10),
            TokKind::Minus => (BinaryOp::Sub, 10),
            TokKind::Star => (BinaryOp::Mul, 11),
            TokKind::Slash => (BinaryOp::Div, 11),
            TokKind::Percent => (BinaryOp::Mod, 11),
            TokKind::StarStar => (BinaryOp::Exp, 12),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_bp: u8, no_in: bool) -> Result<Expr> {
        const RELATIONAL_BP: u8 = 16;

        let start = self.cur.span.start;
        let mut lhs = self.parse_unary()?;
        loop {
            if (self.at_kw("as") || self.at_kw("satisfies")) && !self.cur.nl_before {
                if RELATIONAL_BP < min_bp {
                    break;
                }
                let satisfies = self.at_kw("satisfies");
                self.bump();
                let ty_start = self.cur.span.start;
                if !self.eat_kw("const") {
                    self.skip_type()?;
                }
                let ty = self.src[ty_start as usize..self.prev_end as usize].to_string();
                let expr = Box::new(lhs);
                let kind = if satisfies {
                    ExprKind::Satisfies { expr, ty }
                } else {
                    ExprKind::As { expr, ty }
                };
                lhs = self.expr(kind, start);
                continue;
            }

            let Some((op, prec)) = self.binary_op(no_in) else {
                break;
            };
            let lbp = prec * 2;
            if lbp < min_bp {
                break;
            }
            let rbp = if op == BinaryOp::Exp { lbp } else { lbp + 1 };
            self.bump();
            let rhs = self.parse_binary(rbp, no_in)?;
            lhs = self.expr(
                ExprKind::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.nested(|p| p.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        let op = match self.cur.kind {
            TokKind::Bang => Some(UnaryOp::Not),
            TokKind::Minus => Some(UnaryOp::Minus),
            TokKind::Plus => Some(UnaryOp::Plus),
            TokKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let arg = Box::new(self.parse_unary()?);
            return Ok(self.expr(ExprKind::Unary { op, arg }, start));
        }

        let update = match self.cur.kind {
            TokKind::PlusPlus => Some(UpdateOp::Inc),
            TokKind::MinusMinus => Some(UpdateOp::Dec),
            _ => None,
        };
        if let Some(op) = update {
            self.bump();
            let arg = Box::new(self.parse_unary()?);
            return Ok(self.expr(
                ExprKind::Update {
                    op,
                    prefix: true,
                    arg,
                },
                start,
            ));
        }

        // `<T>expr` type assertion
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
            return self.parse_unary();
        }

        let word = match &self.cur.kind {
            TokKind::Ident(w) if matches!(w.as_str(), "typeof" | "void" | "delete" | "await") => {
                Some(w.clone())
            }
            _ => None,
        };
        if let Some(word) = word {
            self.bump();
            let arg = Box::new(self.parse_unary()?);
            let kind = match word.as_str() {
                "typeof" => ExprKind::TypeOf(arg),
                "void" => ExprKind::Void(arg),
                "delete" => ExprKind::Delete(arg),
                _ => ExprKind::Await(arg),
            };
            return Ok(self.expr(kind, start));
        }

        let expr = self.parse_call_member()?;
        let update = match self.cur.kind {
            TokKind::PlusPlus if !self.cur.nl_before => Some(UpdateOp::Inc),
            TokKind::MinusMinus if !self.cur.nl_before => Some(UpdateOp::Dec),
            _ => None,
        };
        match update {
            Some(op) => {
                self.bump();
                Ok(self.expr(
                    ExprKind::Update {
                        op,
                        prefix: false,
                        arg: Box::new(expr),
                    },
                    start,
                ))
            }
            None => Ok(expr),
        }
    }

    /// Primary expression followed by member access, calls and tagged templates.
    fn parse_call_member(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        let mut expr = if self.at_kw("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            let kind = match self.cur.kind {
                TokKind::Dot => {
                    self.bump();
                    let prop = self.member_name()?;
                    ExprKind::Member {
                        obj: Box::new(expr),
                        prop,
                        optional: false,
                    }
                }
                TokKind::QuestionDot => {
                    self.bump();
                    if self.at(&TokKind::LParen) {
                        let args = self.parse_args()?;
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            optional: true,
                        }
                    } else if self.eat(&TokKind::LBracket) {
                        let index = self.parse_expr()?;
                        self.expect(TokKind::RBracket)?;
                        ExprKind::Index {
                            obj: Box::new(expr),
                            index: Box::new(index),
                            optional: true,
                        }
                    } else {
                        let prop = self.member_name()?;
                        ExprKind::Member {
                            obj: Box::new(expr),
                            prop,
                            optional: true,
                        }
                    }
                }
                TokKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokKind::RBracket)?;
                    ExprKind::Index {
                        obj: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    }
                }
                TokKind::LParen => {
                    let args = self.parse_args()?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    }
                }
                TokKind::Template(_) | TokKind::TemplateHead(_) => {
                    let tpl = self.parse_template()?;
                    ExprKind::TaggedTemplate {
                        tag: Box::new(expr),
                        tpl,
                    }
                }
                TokKind::Bang if !self.cur.nl_before => {
                    self.bump();
                    ExprKind::NonNull(Box::new(expr))
                }
                TokKind::Lt => {
                    // explicit type arguments on a call: `f<T>(x)`
                    let saved = self.save();
                    if self.skip_angles().is_ok() && self.at(&TokKind::LParen) {
                        continue;
                    }
                    self.restore(saved);
                    break;
                }
                _ => break,
            };
            expr = self.expr(kind, start);
        }
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        self.bump();
        if self.eat(&TokKind::Dot) {
            // new.target
            let obj = self.expr(ExprKind::Ident("new".to_string()), start);
            let prop = self.member_name()?;
            return Ok(self.expr(
                ExprKind::Member {
                    obj: Box::new(obj),
                    prop,
                    optional: false,
                },
                start,
            ));
        }

        let callee_start = self.cur.span.start;
        let mut callee = if self.at_kw("new") {
            self.nested(|p| p.parse_new())?
        } else {
            self.nested(|p| p.parse_primary())?
        };
        loop {
            let kind = match self.cur.kind {
                TokKind::Dot => {
                    self.bump();
                    let prop = self.member_name()?;
                    ExprKind::Member {
                        obj: Box::new(callee),
                        prop,
                        optional: false,
                    }
                }
                TokKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokKind::RBracket)?;
                    ExprKind::Index {
                        obj: Box::new(callee),
                        index: Box::new(index),
                        optional: false,
                    }
                }
                _ => break,
            };
            callee = self.expr(kind, callee_start);
        }
        if self.at(&TokKind::Lt) {
            self.skip_angles()?;
        }
        let args = if self.at(&TokKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(self.expr(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            start,
        ))
    }

    fn parse_args(&mut self) -> Result<Vec<ExprOrSpread>> {
        self.expect(TokKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(&TokKind::RParen) {
            let spread = self.eat(&TokKind::Ellipsis);
            let expr = self.parse_assign(false)?;
            args.push(ExprOrSpread { spread, expr });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.cur.span.start;
        let kind = match self.cur.kind.clone() {
            TokKind::Num(raw) => {
                self.bump();
                ExprKind::Num(raw)
            }
            TokKind::Str(s) => {
                self.bump();
                ExprKind::Str(s)
            }
            TokKind::Regex(raw) => {
                self.bump();
                ExprKind::Regex(raw)
            }
            TokKind::Template(_) | TokKind::TemplateHead(_) => {
                ExprKind::Template(self.parse_template()?)
            }
            TokKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                if self.at(&TokKind::Comma) {
                    return Err(self.error("comma expressions are not supported"));
                }
                self.expect(TokKind::RParen)?;
                ExprKind::Paren(Box::new(inner))
            }
            TokKind::LBracket => self.parse_array_lit()?,
            TokKind::LBrace => self.parse_object_lit()?,
            TokKind::At => {
                self.skip_decorators()?;
                return self.parse_primary();
            }
            TokKind::Error(msg) => return Err(self.error(msg)),
            TokKind::Ident(word) => match word.as_str() {
                "function" => ExprKind::Function(Box::new(
                    self.parse_function_decl(FunctionKind::Expression)?,
                )),
                "async" if self.nxt.is_ident("function") && !self.nxt.nl_before => {
                    ExprKind::Function(Box::new(
                        self.parse_function_decl(FunctionKind::Expression)?,
                    ))
                }
                "class" => ExprKind::Class(Box::new(self.parse_class(false)?)),
                "this" => {
                    self.bump();
                    ExprKind::This
                }
                "super" => {
                    self.bump();
                    ExprKind::Super
                }
                "null" => {
                    self.bump();
                    ExprKind::Null
                }
                "true" | "false" => {
                    self.bump();
                    ExprKind::Bool(word == "true")
                }
                w if RESERVED.contains(&w) => return Err(self.unexpected("expression")),
                name => {
                    let name = name.to_string();
                    self.bump();
                    ExprKind::Ident(name)
                }
            },
            _ => return Err(self.unexpected("expression")),
        };
        Ok(self.expr(kind, start))
    }

    fn parse_template(&mut self) -> Result<Template> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        match self.cur.kind.clone() {
            TokKind::Template(s) => {
                self.bump();
                quasis.push(s);
                return Ok(Template { quasis, exprs });
            }
            TokKind::TemplateHead(s) => {
                self.bump();
                quasis.push(s);
            }
            _ => return Err(self.unexpected("template literal")),
        }
        loop {
            exprs.push(self.parse_expr()?);
            match self.cur.kind.clone() {
                TokKind::TemplateMiddle(s) => {
                    self.bump();
                    quasis.push(s);
                }
                TokKind::TemplateTail(s) => {
                    self.bump();
                    quasis.push(s);
                    break;
                }
                _ => return Err(self.unexpected("'}' closing template substitution")),
            }
        }
        Ok(Template { quasis, exprs })
    }

    fn parse_array_lit(&mut self) -> Result<ExprKind> {
        self.expect(TokKind::LBracket)?;
        let mut elems = Vec::new();
        while !self.at(&TokKind::RBracket) {
            if self.eat(&TokKind::Comma) {
                elems.push(None);
                continue;
            }
            let spread = self.eat(&TokKind::Ellipsis);
            let expr = self.parse_assign(false)?;
            elems.push(Some(ExprOrSpread { spread, expr }));
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RBracket)?;
        Ok(ExprKind::Array(elems))
    }

    fn parse_object_lit(&mut self) -> Result<ExprKind> {
        self.expect(TokKind::LBrace)?;
        let mut props = Vec::new();
        while !self.at(&TokKind::RBrace) {
            props.push(self.parse_prop()?);
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(TokKind::RBrace)?;
        Ok(ExprKind::Object(props))
    }

    fn parse_prop(&mut self) -> Result<Prop> {
        let start = self.cur.span.start;
        if self.eat(&TokKind::Ellipsis) {
            return Ok(Prop::Spread(self.parse_assign(false)?));
        }

        let accessor = if (self.at_kw("get") || self.at_kw("set")) && self.nxt_starts_key() {
            let getter = self.at_kw("get");
            self.bump();
            Some(getter)
        } else {
            None
        };
        let is_async = accessor.is_none()
            && self.at_kw("async")
            && !self.nxt.nl_before
            && (self.nxt_starts_key() || matches!(self.nxt.kind, TokKind::Star));
        if is_async {
            self.bump();
        }
        let is_generator = self.eat(&TokKind::Star);

        let key_start = self.cur.span.start;
        let key = self.parse_prop_key()?;

        if let Some(getter) = accessor {
            let kind = if getter {
                FunctionKind::Getter
            } else {
                FunctionKind::Setter
            };
            let func = self.parse_function_rest(start, kind, None, false, false)?;
            return Ok(if getter {
                Prop::Getter { key, func }
            } else {
                Prop::Setter { key, func }
            });
        }
        if is_async || is_generator || self.at(&TokKind::LParen) || self.at(&TokKind::Lt) {
            let func =
                self.parse_function_rest(start, FunctionKind::Method, None, is_async, is_generator)?;
            return Ok(Prop::Method { key, func });
        }
        if self.eat(&TokKind::Colon) {
            let value = self.parse_assign(false)?;
            return Ok(Prop::KeyValue { key, value });
        }

        let PropKey::Ident(name) = key else {
            return Err(self.unexpected("':'"));
        };
        let ident = self.expr(ExprKind::Ident(name.clone()), key_start);
        // `{ a = 1 } = obj` default, only meaningful once reinterpreted as a pattern
        if self.eat(&TokKind::Eq) {
            let value = self.parse_assign(false)?;
            let assign = self.expr(
                ExprKind::Assign {
                    op: AssignOp::Assign,
                    target: Box::new(AssignTarget::Simple(ident)),
                    value: Box::new(value),
                },
                key_start,
            );
            return Ok(Prop::KeyValue {
                key: PropKey::Ident(name),
                value: assign,
            });
        }
        Ok(Prop::Shorthand(ident))
    }

    fn parse_prop_key(&mut self) -> Result<PropKey> {
        let key = match self.cur.kind.clone() {
            TokKind::Ident(s) | TokKind::PrivateName(s) => PropKey::Ident(s),
            TokKind::Str(s) => PropKey::Str(s),
            TokKind::Num(s) => PropKey::Num(s),
            TokKind::LBracket => {
                self.bump();
                let expr = self.parse_assign(false)?;
                self.expect(TokKind::RBracket)?;
                return Ok(PropKey::Computed(Box::new(expr)));
            }
            _ => return Err(self.unexpected("property name")),
        };
        self.bump();
        Ok(key)
    }

    // ======= type annotations (skipped) =======

    fn skip_type(&mut self) -> Result<()> {
        self.nested(|p| p.skip_type_inner())
    }

    fn skip_type_inner(&mut self) -> Result<()> {
        if matches!(self.cur.kind, TokKind::Pipe | TokKind::Amp) {
            self.bump();
        }
        self.skip_type_operand()?;
        while matches!(self.cur.kind, TokKind::Pipe | TokKind::Amp) {
            self.bump();
            self.skip_type_operand()?;
        }
        // conditional type
        if self.at_kw("extends") && !self.cur.nl_before {
            self.bump();
            self.skip_type()?;
            self.expect(TokKind::Question)?;
            self.skip_type()?;
            self.expect(TokKind::Colon)?;
            self.skip_type()?;
        }
        Ok(())
    }

    fn skip_type_operand(&mut self) -> Result<()> {
        const TYPE_PREFIXES: &[&str] = &[
            "keyof", "unique", "readonly", "infer", "asserts", "typeof", "new", "abstract",
        ];
        while TYPE_PREFIXES.iter().any(|w| self.at_kw(w))
            && matches!(
                self.nxt.kind,
                TokKind::Ident(_) | TokKind::LParen | TokKind::LBracket | TokKind::LBrace | TokKind::Lt
            )
        {
            self.bump();
        }

        match self.cur.kind {
            TokKind::LParen => {
                self.skip_balanced()?;
                if self.eat(&TokKind::FatArrow) {
                    self.skip_type()?;
                }
            }
            TokKind::Lt => {
                self.skip_angles()?;
                self.skip_balanced()?;
                self.expect(TokKind::FatArrow)?;
                self.skip_type()?;
            }
            TokKind::LBracket | TokKind::LBrace => self.skip_balanced()?,
            TokKind::Ident(_) => {
                self.bump();
                while self.eat(&TokKind::Dot) {
                    self.member_name()?;
                }
                if self.at(&TokKind::Lt) && !self.cur.nl_before {
                    self.skip_angles()?;
                }
                // type predicate: `x is T`
                if self.at_kw("is") && !self.cur.nl_before {
                    self.bump();
                    self.skip_type()?;
                }
            }
            TokKind::Str(_) | TokKind::Num(_) | TokKind::Template(_) => self.bump(),
            TokKind::Minus => {
                self.bump();
                self.bump();
            }
            TokKind::TemplateHead(_) => {
                self.bump();
                loop {
                    self.skip_type()?;
                    match self.cur.kind {
                        TokKind::TemplateMiddle(_) => self.bump(),
                        TokKind::TemplateTail(_) => {
                            self.bump();
                            break;
                        }
                        _ => return Err(self.unexpected("end of template type")),
                    }
                }
            }
            _ => return Err(self.unexpected("type")),
        }

        // array and indexed access types
        while self.at(&TokKind::LBracket) && !self.cur.nl_before {
            self.skip_balanced()?;
        }
        Ok(())
    }

    /// Skips from an opening bracket through its matching close.
    fn skip_balanced(&mut self) -> Result<()> {
        let mut depth = 0u32;
        loop {
            match self.cur.kind {
                TokKind::LParen | TokKind::LBracket | TokKind::LBrace => depth += 1,
                TokKind::RParen | TokKind::RBracket | TokKind::RBrace => {
                    if depth == 0 {
                        return Err(self.unexpected("opening bracket"));
                    }
                    depth -= 1;
                }
                TokKind::Eof => return Err(self.unexpected("closing bracket")),
                _ => {}
            }
            self.bump();
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Skips a `<...>` type argument/parameter list, splitting `>>` and `>>>`.
    fn skip_angles(&mut self) -> Result<()> {
        let mut angles: i32 = 0;
        let mut brackets = 0u32;
        loop {
            match self.cur.kind {
                TokKind::Lt => angles += 1,
                TokKind::Gt => angles -= 1,
                TokKind::Shr => angles -= 2,
                TokKind::UShr => angles -= 3,
                TokKind::LParen | TokKind::LBracket | TokKind::LBrace => brackets += 1,
                TokKind::RParen | TokKind::RBracket | TokKind::RBrace => {
                    if brackets == 0 {
                        return Err(self.unexpected("'>'"));
                    }
                    brackets -= 1;
                }
                TokKind::Semicolon | TokKind::Eof | TokKind::AmpAmp | TokKind::PipePipe => {
                    return Err(self.unexpected("'>'"));
                }
                _ => {}
            }
            self.bump();
            if angles <= 0 && brackets == 0 {
                return Ok(());
            }
        }
    }
}

fn is_simple_target(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. } => true,
        ExprKind::Paren(inner)
        | ExprKind::NonNull(inner)
        | ExprKind::As { expr: inner, .. }
        | ExprKind::Satisfies { expr: inner, .. } => is_simple_target(inner),
        _ => false,
    }
}

fn token_text(k: &TokKind) -> &'static str {
    match k {
        TokKind::LParen => "'('",
        TokKind::RParen => "')'",
        TokKind::LBrace => "'{'",
        TokKind::RBrace => "'}'",
        TokKind::LBracket => "'['",
        TokKind::RBracket => "']'",
        TokKind::Comma => "','",
        TokKind::Colon => "':'",
        TokKind::Semicolon => "';'",
        TokKind::Question => "'?'",
        TokKind::FatArrow => "'=>'",
        TokKind::Eq => "'='",
        _ => "token",
    }
}

/// 1-based line and byte column of `offset`.
fn line_col(src: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(src.len());
    let before = &src.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let col = match before.iter().rposition(|b| *b == b'\n') {
        Some(nl) => offset - nl,
        None => offset + 1,
    };
    (line, col)
}
