//! The node dispatcher: maps every expression to a [`Value`].

use std::cell::RefCell;
use std::rc::Rc;

use cirrus_ast::ast::{Expr, ExprKind, ExprOrSpread, Prop, PropKey, Template};
use cirrus_ast::{NodeId, SourceFile, Span};

use crate::builtins;
use crate::env::{Env, FnRecord};
use crate::error::{Diagnostic, DiagnosticKind, Result};
use crate::ops;
use crate::value::{format_number, parse_number_literal, Object, Value};

/// Active call frames beyond which calls evaluate to `Unknown`.
pub const MAX_CALL_DEPTH: usize = 50;

const RED_ZONE: usize = 64 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Grows the native stack before recursing into a subtree.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub max_call_depth: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

/// Node a call or diagnostic is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub node: NodeId,
    pub span: Span,
}

impl Site {
    pub fn of(expr: &Expr) -> Self {
        Site {
            node: expr.id,
            span: expr.span,
        }
    }
}

/// Answer of a substitution hook for an identifier or `this` node.
pub enum Substitution<'a> {
    Value(Value<'a>),
    /// Solve this node in place of the original.
    Node(&'a Expr),
    /// Fall back to the scope chain.
    PassThrough,
}

/// Caller-supplied resolution for identifiers and `this`, consulted before
/// the scope chain. Receives the node and the current scope chain.
pub type SubstitutionHook<'a> = Rc<dyn Fn(&'a Expr, &[NodeId]) -> Substitution<'a> + 'a>;

pub(crate) struct Frame<'a> {
    pub site: NodeId,
    pub args: Vec<Value<'a>>,
}

pub(crate) struct Shared<'a> {
    pub file: &'a SourceFile,
    pub options: SolverOptions,
    pub call_stack: RefCell<Vec<Frame<'a>>>,
    pub globals: Env<'a>,
}

impl<'a> Shared<'a> {
    pub fn new(file: &'a SourceFile, options: SolverOptions) -> Self {
        let globals = Env::root();
        builtins::install(&globals);
        Shared {
            file,
            options,
            call_stack: RefCell::new(Vec::new()),
            globals,
        }
    }
}

/// An evaluator bound to a lexical context. Cloning is cheap; clones share
/// the environment.
#[derive(Clone)]
pub struct Solver<'a> {
    pub(crate) shared: Rc<Shared<'a>>,
    pub(crate) env: Env<'a>,
    scopes: Rc<Vec<NodeId>>,
    hook: Option<SubstitutionHook<'a>>,
    pub(crate) exports: Object<'a>,
}

impl<'a> Solver<'a> {
    /// Fresh top-level context: a module environment below the globals with
    /// its own `exports` record.
    pub(crate) fn top_level(
        shared: Rc<Shared<'a>>,
        scopes: Vec<NodeId>,
        hook: Option<SubstitutionHook<'a>>,
    ) -> Self {
        let env = shared.globals.function_child(Rc::new(FnRecord::new()));
        let exports = Object::new();
        env.declare("exports", Value::Object(exports.clone()));
        Solver {
            shared,
            env,
            scopes: Rc::new(scopes),
            hook,
            exports,
        }
    }

    pub fn file(&self) -> &'a SourceFile {
        self.shared.file
    }

    pub fn env(&self) -> &Env<'a> {
        &self.env
    }

    /// Ancestor scope nodes, outermost first.
    pub fn scopes(&self) -> &[NodeId] {
        &self.scopes
    }

    pub fn exports(&self) -> &Object<'a> {
        &self.exports
    }

    /// Forced lookup through the scope chain.
    pub fn get(&self, name: &str) -> Result<Option<Value<'a>>> {
        self.env.get(name).map(|v| v.force()).transpose()
    }

    /// Child context for the construct `node`.
    pub(crate) fn enter(&self, node: NodeId) -> Solver<'a> {
        let mut scopes = (*self.scopes).clone();
        scopes.push(node);
        Solver {
            env: self.env.child(),
            scopes: Rc::new(scopes),
            ..self.clone()
        }
    }

    /// Child context for a function body owning `record`.
    pub(crate) fn enter_function(&self, node: NodeId, record: Rc<FnRecord<'a>>) -> Solver<'a> {
        let mut scopes = (*self.scopes).clone();
        scopes.push(node);
        Solver {
            env: self.env.function_child(record),
            scopes: Rc::new(scopes),
            ..self.clone()
        }
    }

    pub(crate) fn with_env(&self, env: Env<'a>) -> Solver<'a> {
        Solver { env, ..self.clone() }
    }

    /// Child environment without a new scope node.
    pub(crate) fn nested(&self) -> Solver<'a> {
        Solver {
            env: self.env.child(),
            ..self.clone()
        }
    }

    pub(crate) fn diag(&self, kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(self.file(), kind, span, message)
    }

    /// Binds `name` to a memoized initializer, mirroring it into `exports`
    /// when `exported`. Returns the bound thunk.
    pub fn set_lazy(
        &self,
        name: &str,
        exported: bool,
        init: impl FnOnce() -> Result<Value<'a>> + 'a,
    ) -> Value<'a> {
        self.set_value(name, exported, Value::lazy(init))
    }

    /// Declares `name` bound to an already solved value.
    pub fn set_value(&self, name: &str, exported: bool, value: Value<'a>) -> Value<'a> {
        self.env.declare(name, value.clone());
        if exported {
            self.exports.insert(name, value.clone());
        }
        value
    }

    pub(crate) fn possible_return(&self, value: Value<'a>) {
        if let Some(record) = self.env.record() {
            record.possible_return(value);
        }
    }

    /// Solves `expr` to a settled value.
    pub fn solve(&self, expr: &'a Expr) -> Result<Value<'a>> {
        ensure_sufficient_stack(|| self.solve_expr(expr))?.force()
    }

    fn solve_expr(&self, expr: &'a Expr) -> Result<Value<'a>> {
        let value = match &expr.kind {
            ExprKind::Null => Value::Null,
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Num(raw) => Value::Num(parse_number_literal(raw)),
            ExprKind::Str(s) => Value::Str(s.clone()),
            ExprKind::Regex(raw) => Value::Str(raw.clone()),
            ExprKind::Template(tpl) => self.template(tpl)?,
            ExprKind::TaggedTemplate { tag, tpl } => {
                self.solve(tag)?;
                for e in &tpl.exprs {
                    self.solve(e)?;
                }
                Value::Unknown
            }
            ExprKind::Ident(name) => self.identifier(expr, name)?,
            ExprKind::This => self.this_value(expr)?,
            ExprKind::Super => Value::Unknown,
            ExprKind::Array(elems) => self.array_literal(elems)?,
            ExprKind::Object(props) => self.object_literal(props)?,
            ExprKind::Member { obj, prop, .. } => {
                if matches!(obj.kind, ExprKind::Super) {
                    self.super_member(prop)?
                } else {
                    let target = self.solve(obj)?;
                    self.member(Site::of(expr), &target, prop)?
                }
            }
            ExprKind::Index { obj, index, .. } => {
                let target = self.solve(obj)?;
                let key = self.solve(index)?;
                self.index(Site::of(expr), &target, &key)?
            }
            ExprKind::Call { callee, args, .. } => self.call_expr(expr, callee, args)?,
            ExprKind::New { callee, args } => self.new_expr(expr, callee, args)?,
            ExprKind::Unary { op, arg } => {
                let value = self.solve(arg)?;
                self.unary(expr, *op, &value)?
            }
            ExprKind::Update { arg, .. } => {
                let place = self.place(arg)?;
                self.read_place(&place)?;
                self.write_place(place, Value::Unknown)?;
                Value::Unknown
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.solve(left)?;
                let right = self.solve(right)?;
                ops::binary(*op, &left, &right)
            }
            ExprKind::Assign { op, target, value } => self.assign(*op, target, value)?,
            ExprKind::Cond { test, cons, alt } => {
                self.solve(test)?;
                let cons = self.solve(cons)?;
                let alt = self.solve(alt)?;
                Value::union(vec![cons, alt])
            }
            ExprKind::Function(func) => self.function_value(func),
            ExprKind::Class(class) => self.class_value(class)?,
            ExprKind::TypeOf(arg) => self.type_of(arg)?,
            ExprKind::Void(arg) => {
                self.solve(arg)?;
                Value::Undefined
            }
            ExprKind::Delete(arg) => self.delete(arg)?,
            ExprKind::Await(arg) => self.solve(arg)?,
            ExprKind::Yield { arg, delegate } => self.yield_value(arg.as_deref(), *delegate)?,
            ExprKind::As { expr: inner, .. }
            | ExprKind::Satisfies { expr: inner, .. }
            | ExprKind::NonNull(inner)
            | ExprKind::Paren(inner) => self.solve(inner)?,
        };
        Ok(value)
    }

    fn substitute(&self, expr: &'a Expr) -> Result<Option<Value<'a>>> {
        let Some(hook) = &self.hook else {
            return Ok(None);
        };
        match hook(expr, &self.scopes[..]) {
            Substitution::PassThrough => Ok(None),
            Substitution::Value(value) => value.force().map(Some),
            Substitution::Node(node) if std::ptr::eq(node, expr) => Err(self.diag(
                DiagnosticKind::RecursiveSubstitution,
                expr.span,
                format!("substitution of {} resolved to itself", expr.kind.name()),
            )),
            Substitution::Node(node) => self.solve(node).map(Some),
        }
    }

    fn identifier(&self, expr: &'a Expr, name: &str) -> Result<Value<'a>> {
        if name == "undefined" {
            return Ok(Value::Undefined);
        }
        if let Some(value) = self.substitute(expr)? {
            return Ok(value);
        }
        match self.env.get(name) {
            Some(Value::Uninitialized) => {
                let (line, col) = self.file().line_col(expr.span.start);
                tracing::debug!(name, line, col, "read of uninitialized binding");
                Ok(Value::Uninitialized)
            }
            Some(value) => value.force(),
            None => Err(self.diag(
                DiagnosticKind::UndeclaredIdentifier,
                expr.span,
                format!("identifier `{name}` has not been declared"),
            )),
        }
    }

    pub(crate) fn this_value(&self, expr: &'a Expr) -> Result<Value<'a>> {
        if let Some(value) = self.substitute(expr)? {
            return Ok(value);
        }
        self.current_this()
    }

    pub(crate) fn current_this(&self) -> Result<Value<'a>> {
        match self.env.get("this") {
            Some(value) => value.force(),
            None => Ok(Value::Undefined),
        }
    }

    /// Assigns to the nearest binding of `name`. Names only the hook knows
    /// about absorb the write.
    pub(crate) fn assign_name(
        &self,
        target: Option<&'a Expr>,
        name: &str,
        span: Span,
        value: Value<'a>,
    ) -> Result<()> {
        // A pending initializer still runs before it is overwritten.
        if let Some(current @ Value::Lazy(_)) = self.env.get(name) {
            current.force()?;
        }
        if self.env.assign(name, value) {
            return Ok(());
        }
        if let Some(target) = target {
            if self.substitute(target)?.is_some() {
                return Ok(());
            }
        }
        Err(self.diag(
            DiagnosticKind::UndeclaredIdentifier,
            span,
            format!("identifier `{name}` has not been declared"),
        ))
    }

    /// Property name of a literal, identifier or computed key. `None` when a
    /// computed key is not statically known.
    pub(crate) fn prop_key(&self, key: &'a PropKey) -> Result<Option<String>> {
        Ok(match key {
            PropKey::Ident(name) | PropKey::Str(name) => Some(name.clone()),
            PropKey::Num(raw) => Some(format_number(parse_number_literal(raw))),
            PropKey::Computed(expr) => match self.solve(expr)? {
                Value::Unknown | Value::Union(_) | Value::Uninitialized => {
                    tracing::debug!("computed property key is not statically known");
                    None
                }
                key => Some(ops::property_key(&key)),
            },
        })
    }

    fn template(&self, tpl: &'a Template) -> Result<Value<'a>> {
        let mut parts = Vec::with_capacity(tpl.quasis.len() + tpl.exprs.len());
        for (i, quasi) in tpl.quasis.iter().enumerate() {
            parts.push(Value::Str(quasi.clone()));
            if let Some(expr) = tpl.exprs.get(i) {
                parts.push(self.solve(expr)?);
            }
        }
        if parts.iter().any(|p| p.is_unknown() || p.is_uninitialized()) {
            return Ok(Value::Unknown);
        }
        Ok(ops::concat_parts(&parts))
    }

    fn array_literal(&self, elems: &'a [Option<ExprOrSpread>]) -> Result<Value<'a>> {
        let mut items = Vec::with_capacity(elems.len());
        for elem in elems {
            let Some(elem) = elem else {
                items.push(Value::Undefined);
                continue;
            };
            let value = self.solve(&elem.expr)?;
            if !elem.spread {
                items.push(value);
                continue;
            }
            match value {
                Value::Unknown => return Ok(Value::Unknown),
                // Alternatives are flattened into one sequence rather than
                // producing a union of sequences.
                Value::Union(alts) => {
                    for alt in alts.iter() {
                        items.extend(ops::spread_items(alt));
                    }
                }
                other => items.extend(ops::spread_items(&other)),
            }
        }
        Ok(Value::array(items))
    }

    fn object_literal(&self, props: &'a [Prop]) -> Result<Value<'a>> {
        let obj = Object::new();
        let this = Value::Object(obj.clone());
        for prop in props {
            match prop {
                Prop::KeyValue { key, value } => {
                    let key = self.prop_key(key)?;
                    let value = self.solve(value)?;
                    if let Some(key) = key {
                        obj.insert(key, value);
                    }
                }
                Prop::Shorthand(expr) => {
                    let value = self.solve(expr)?;
                    if let Some(name) = expr.as_ident() {
                        obj.insert(name, value);
                    }
                }
                Prop::Spread(expr) => match self.solve(expr)? {
                    Value::Unknown | Value::Union(_) => return Ok(Value::Unknown),
                    Value::Object(src) => {
                        for (k, v) in src.entries() {
                            obj.insert(k, v);
                        }
                    }
                    Value::Array(src) => {
                        for (i, v) in src.to_vec().into_iter().enumerate() {
                            obj.insert(i.to_string(), v);
                        }
                    }
                    Value::Str(s) => {
                        for (i, c) in s.chars().enumerate() {
                            obj.insert(i.to_string(), Value::Str(c.to_string()));
                        }
                    }
                    _ => {}
                },
                Prop::Method { key, func } => {
                    if let Some(key) = self.prop_key(key)? {
                        let method = self.method_value(func, &key);
                        obj.insert(key, method);
                    }
                }
                Prop::Getter { key, func } => {
                    if let Some(key) = self.prop_key(key)? {
                        obj.insert(key, self.getter_value(func, this.clone()));
                    }
                }
                Prop::Setter { .. } => {}
            }
        }
        Ok(this)
    }

    /// Evaluates call arguments, expanding spreads.
    pub(crate) fn solve_args(&self, args: &'a [ExprOrSpread]) -> Result<Vec<Value<'a>>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.solve(&arg.expr)?;
            if !arg.spread {
                out.push(value);
                continue;
            }
            for alt in value.alternatives() {
                out.extend(ops::spread_items(&alt));
            }
        }
        Ok(out)
    }

    fn type_of(&self, arg: &'a Expr) -> Result<Value<'a>> {
        // `typeof` tolerates names nobody declared.
        if let ExprKind::Ident(name) = &arg.kind {
            if self.hook.is_none() && name != "undefined" && self.env.get(name).is_none() {
                return Ok(Value::str("undefined"));
            }
        }
        let value = self.solve(arg)?;
        Ok(ops::map_alternatives(&value, |v| Value::str(v.type_of())))
    }

    fn yield_value(&self, arg: Option<&'a Expr>, delegate: bool) -> Result<Value<'a>> {
        let value = match arg {
            Some(expr) => self.solve(expr)?,
            None => Value::Undefined,
        };
        if let Some(record) = self.env.record() {
            match (delegate, &value) {
                (true, Value::Array(items)) => {
                    for item in items.to_vec() {
                        record.push_yield(item);
                    }
                }
                (true, _) => record.push_yield(Value::Unknown),
                (false, _) => record.push_yield(value),
            }
        }
        // The value sent back into a generator is never known.
        Ok(Value::Unknown)
    }
}
