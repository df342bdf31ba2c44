//! Syntax tree for the script-language subset consumed by the solver.
//!
//! Nodes are immutable once parsed. Every statement, expression, function,
//! class and binding pattern carries a [`NodeId`] so that callers can use
//! node identity as a map key.

use serde::Serialize;

use crate::ids::NodeId;
use crate::source::Comment;
use crate::span::Span;

#[derive(Debug, Clone, Serialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

// ======= statements =======

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    /// Set on `export` declarations (`export const x = ...`).
    pub exported: bool,
    /// Comments between the previous token and this statement.
    pub leading_comments: Vec<Comment>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Var(VarDecl),
    Function(Box<Function>),
    Class(Box<Class>),
    Expr(Expr),
    Return(Option<Expr>),
    If {
        test: Expr,
        cons: Box<Stmt>,
        alt: Option<Box<Stmt>>,
    },
    Block(Block),
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        head: ForHead,
        right: Expr,
        body: Box<Stmt>,
        is_await: bool,
    },
    ForIn {
        head: ForHead,
        right: Expr,
        body: Box<Stmt>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        block: Block,
        handler: Option<CatchClause>,
        finalizer: Option<Block>,
    },
    Throw(Expr),
    Break,
    Continue,
    Import(ImportDecl),
    ExportNamed {
        specifiers: Vec<ExportSpecifier>,
        /// `export { a } from "mod"` re-exports carry the module name.
        source: Option<String>,
    },
    ExportDefault(Expr),
    /// `type`, `interface`, `declare` and other erased declarations.
    TypeDecl {
        name: Option<Ident>,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
    Using,
    AwaitUsing,
}

impl VarKind {
    pub fn is_using(self) -> bool {
        matches!(self, VarKind::Using | VarKind::AwaitUsing)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub decls: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarDeclarator {
    pub id: NodeId,
    pub name: Pat,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

/// Left-hand side of `for (... of ...)` / `for (... in ...)`.
#[derive(Debug, Clone, Serialize)]
pub struct ForHead {
    /// `None` when the head assigns to existing bindings.
    pub kind: Option<VarKind>,
    pub pat: Pat,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchCase {
    pub id: NodeId,
    /// `None` for the `default:` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatchClause {
    pub id: NodeId,
    pub param: Option<Pat>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSpecifier {
    pub kind: ImportKind,
    pub local: Ident,
    /// Name in the exporting module for `Named` imports.
    pub imported: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSpecifier {
    pub local: Ident,
    pub exported: String,
}

// ======= functions and classes =======

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionKind {
    Declaration,
    Expression,
    Arrow,
    Method,
    Constructor,
    Getter,
    Setter,
}

#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub kind: FunctionKind,
    pub params: Vec<Param>,
    /// `None` for overload signatures and `declare`d functions.
    pub body: Option<FnBody>,
    pub is_async: bool,
    pub is_generator: bool,
    pub span: Span,
}

impl Function {
    pub fn is_arrow(&self) -> bool {
        self.kind == FunctionKind::Arrow
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum FnBody {
    Block(Block),
    /// Concise arrow body: `x => x + 1`.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub id: NodeId,
    pub pat: Pat,
    pub default: Option<Expr>,
    pub rest: bool,
    /// Constructor parameter property: `constructor(public x: number)`.
    pub property: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Class {
    pub id: NodeId,
    pub name: Option<Ident>,
    pub super_class: Option<Box<Expr>>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

impl Class {
    pub fn constructor(&self) -> Option<&Function> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Constructor(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum ClassMember {
    Constructor(Function),
    Method {
        key: PropKey,
        func: Function,
        is_static: bool,
    },
    Field {
        key: PropKey,
        value: Option<Expr>,
        is_static: bool,
        span: Span,
    },
}

// ======= binding patterns =======

#[derive(Debug, Clone, Serialize)]
pub enum Pat {
    Ident(Ident),
    Object(ObjectPat),
    Array(ArrayPat),
}

impl Pat {
    pub fn span(&self) -> Span {
        match self {
            Pat::Ident(id) => id.span,
            Pat::Object(p) => p.span,
            Pat::Array(p) => p.span,
        }
    }

    /// Every name bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<&Ident> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pat::Ident(id) => out.push(id),
            Pat::Object(p) => {
                for prop in &p.props {
                    prop.value.collect_names(out);
                }
                if let Some(rest) = &p.rest {
                    out.push(rest);
                }
            }
            Pat::Array(p) => {
                for elem in p.elems.iter().flatten() {
                    elem.pat.collect_names(out);
                }
                if let Some(rest) = &p.rest {
                    rest.collect_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectPat {
    pub id: NodeId,
    pub props: Vec<ObjectPatProp>,
    pub rest: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectPatProp {
    pub key: PropKey,
    pub value: Pat,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrayPat {
    pub id: NodeId,
    /// `None` entries are holes: `[, b] = xs`.
    pub elems: Vec<Option<ArrayPatElem>>,
    pub rest: Option<Box<Pat>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrayPatElem {
    pub pat: Pat,
    pub default: Option<Expr>,
}

// ======= expressions =======

#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum ExprKind {
    Null,
    Bool(bool),
    /// Numeric literal; the raw source text is kept for conversion.
    Num(String),
    Str(String),
    /// Regular expression literal, raw text including slashes and flags.
    Regex(String),
    Template(Template),
    TaggedTemplate {
        tag: Box<Expr>,
        tpl: Template,
    },
    Ident(String),
    This,
    Super,
    Array(Vec<Option<ExprOrSpread>>),
    Object(Vec<Prop>),
    Member {
        obj: Box<Expr>,
        prop: String,
        optional: bool,
    },
    Index {
        obj: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<AssignTarget>,
        value: Box<Expr>,
    },
    Cond {
        test: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Function(Box<Function>),
    Class(Box<Class>),
    TypeOf(Box<Expr>),
    Void(Box<Expr>),
    Delete(Box<Expr>),
    Await(Box<Expr>),
    Yield {
        arg: Option<Box<Expr>>,
        delegate: bool,
    },
    As {
        expr: Box<Expr>,
        ty: String,
    },
    Satisfies {
        expr: Box<Expr>,
        ty: String,
    },
    NonNull(Box<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, ExprKind::Ident(_))
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_this(&self) -> bool {
        matches!(self.kind, ExprKind::This)
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, ExprKind::Function(_) | ExprKind::Class(_))
    }
}

impl ExprKind {
    /// Human-readable node kind, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Null => "null literal",
            ExprKind::Bool(_) => "boolean literal",
            ExprKind::Num(_) => "numeric literal",
            ExprKind::Str(_) => "string literal",
            ExprKind::Regex(_) => "regular expression literal",
            ExprKind::Template(_) => "template expression",
            ExprKind::TaggedTemplate { .. } => "tagged template expression",
            ExprKind::Ident(_) => "identifier",
            ExprKind::This => "this keyword",
            ExprKind::Super => "super keyword",
            ExprKind::Array(_) => "array literal",
            ExprKind::Object(_) => "object literal",
            ExprKind::Member { .. } => "property access",
            ExprKind::Index { .. } => "element access",
            ExprKind::Call { .. } => "call expression",
            ExprKind::New { .. } => "new expression",
            ExprKind::Unary { .. } => "prefix unary expression",
            ExprKind::Update { .. } => "update expression",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::Cond { .. } => "conditional expression",
            ExprKind::Function(_) => "function expression",
            ExprKind::Class(_) => "class expression",
            ExprKind::TypeOf(_) => "typeof expression",
            ExprKind::Void(_) => "void expression",
            ExprKind::Delete(_) => "delete expression",
            ExprKind::Await(_) => "await expression",
            ExprKind::Yield { .. } => "yield expression",
            ExprKind::As { .. } => "as expression",
            ExprKind::Satisfies { .. } => "satisfies expression",
            ExprKind::NonNull(_) => "non-null expression",
            ExprKind::Paren(_) => "parenthesized expression",
        }
    }
}

impl StmtKind {
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Var(_) => "variable statement",
            StmtKind::Function(_) => "function declaration",
            StmtKind::Class(_) => "class declaration",
            StmtKind::Expr(_) => "expression statement",
            StmtKind::Return(_) => "return statement",
            StmtKind::If { .. } => "if statement",
            StmtKind::Block(_) => "block",
            StmtKind::While { .. } => "while statement",
            StmtKind::DoWhile { .. } => "do statement",
            StmtKind::For { .. } => "for statement",
            StmtKind::ForOf { .. } => "for-of statement",
            StmtKind::ForIn { .. } => "for-in statement",
            StmtKind::Switch { .. } => "switch statement",
            StmtKind::Try { .. } => "try statement",
            StmtKind::Throw(_) => "throw statement",
            StmtKind::Break => "break statement",
            StmtKind::Continue => "continue statement",
            StmtKind::Import(_) => "import declaration",
            StmtKind::ExportNamed { .. } => "export declaration",
            StmtKind::ExportDefault(_) => "export assignment",
            StmtKind::TypeDecl { .. } => "type declaration",
            StmtKind::Empty => "empty statement",
        }
    }
}

impl Stmt {
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Var(_) | StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::TypeDecl { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    /// Literal text segments; always one more than `exprs`.
    pub quasis: Vec<String>,
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExprOrSpread {
    pub spread: bool,
    pub expr: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub enum Prop {
    KeyValue { key: PropKey, value: Expr },
    /// `{ a }`; the expression is the identifier reference.
    Shorthand(Expr),
    Spread(Expr),
    Method { key: PropKey, func: Function },
    Getter { key: PropKey, func: Function },
    Setter { key: PropKey, func: Function },
}

#[derive(Debug, Clone, Serialize)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Num(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Serialize)]
pub enum AssignTarget {
    /// Identifier, property access or element access.
    Simple(Expr),
    Pattern(Pat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    /// `a op= b`, including `??=`, `||=` and `&&=`.
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    // logical
    Or,
    And,
    Nullish,
    // equality
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    In,
    InstanceOf,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    // bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}
