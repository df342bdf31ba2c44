//! Statement execution.
//!
//! Control flow is not decided: both arms of an `if` run, loop bodies run
//! once, and every `catch` clause runs. A `return` that is reached on only
//! some paths is recorded on the function's [`FnRecord`](crate::FnRecord)
//! and joins the final result as a union alternative.

use cirrus_ast::ast::{
    Block, CatchClause, ExportSpecifier, Expr, ExprKind, ForHead, ForInit, Pat, Stmt, StmtKind, VarDecl,
    VarKind,
};

use crate::error::{DiagnosticKind, Result};
use crate::ops::{element_union, key_union};
use crate::pattern::Binding;
use crate::solver::{ensure_sufficient_stack, Site, Solver};
use crate::value::Value;

/// How a statement list finished.
#[derive(Debug, Clone)]
pub enum Completion<'a> {
    Normal,
    /// A `return` reached on every path through the list.
    Return(Value<'a>),
}

/// Hidden binding that keeps an anonymous default export reachable for
/// scope completion.
const DEFAULT_EXPORT: &str = "*default*";

impl<'a> Solver<'a> {
    pub fn exec(&self, stmt: &'a Stmt) -> Result<Completion<'a>> {
        ensure_sufficient_stack(|| self.exec_stmt(stmt))
    }

    /// Runs a statement list in the current scope, then completes the scope:
    /// every binding is forced and registered resources are disposed in
    /// reverse order.
    pub fn exec_stmts(&self, stmts: &'a [Stmt]) -> Result<Completion<'a>> {
        self.hoist(stmts);
        let completion = self.run_stmts(stmts).and_then(|completion| {
            self.env.force_all()?;
            Ok(completion)
        });
        let disposed = self.dispose();
        // The statement's error wins over one raised while disposing.
        let completion = completion?;
        disposed?;
        Ok(completion)
    }

    fn run_stmts(&self, stmts: &'a [Stmt]) -> Result<Completion<'a>> {
        for stmt in stmts {
            if let Completion::Return(value) = self.exec(stmt)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&self, block: &'a Block) -> Result<Completion<'a>> {
        self.enter(block.id).exec_stmts(&block.stmts)
    }

    /// Runs a branch or loop body in its own scope.
    fn branch(&self, stmt: &'a Stmt) -> Result<Completion<'a>> {
        match &stmt.kind {
            StmtKind::Block(block) => self.exec_block(block),
            _ => self.enter(stmt.id).exec_stmts(std::slice::from_ref(stmt)),
        }
    }

    fn hoist(&self, stmts: &'a [Stmt]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Function(func) => {
                    let Some(name) = &func.name else { continue };
                    let solver = self.clone();
                    self.set_lazy(&name.name, stmt.exported, move || Ok(solver.function_value(func)));
                }
                StmtKind::Class(class) => {
                    let Some(name) = &class.name else { continue };
                    let solver = self.clone();
                    self.set_lazy(&name.name, stmt.exported, move || solver.class_value(class));
                }
                _ => {}
            }
        }
    }

    fn exec_stmt(&self, stmt: &'a Stmt) -> Result<Completion<'a>> {
        match &stmt.kind {
            StmtKind::Var(decl) => self.var_decl(decl, stmt.exported)?,
            StmtKind::Function(_) | StmtKind::Class(_) => {}
            StmtKind::Expr(expr) => {
                self.solve(expr)?;
            }
            StmtKind::Return(arg) => {
                let value = match arg {
                    Some(expr) => self.solve(expr)?,
                    None => Value::Undefined,
                };
                return Ok(Completion::Return(value));
            }
            StmtKind::If { test, cons, alt } => return self.if_stmt(test, cons, alt.as_deref()),
            StmtKind::Block(block) => return self.exec_block(block),
            StmtKind::While { test, body } => {
                self.solve(test)?;
                self.loop_body(body)?;
            }
            StmtKind::DoWhile { body, test } => {
                self.loop_body(body)?;
                self.solve(test)?;
            }
            StmtKind::For { init, test, body, .. } => {
                // The update clause is not evaluated.
                let scope = self.enter(stmt.id);
                match init {
                    Some(ForInit::Var(decl)) => scope.var_decl(decl, false)?,
                    Some(ForInit::Expr(expr)) => {
                        scope.solve(expr)?;
                    }
                    None => {}
                }
                if let Some(test) = test {
                    scope.solve(test)?;
                }
                scope.loop_body(body)?;
                scope.env.force_all()?;
            }
            StmtKind::ForOf { head, right, body, .. } => {
                let iterable = self.solve(right)?;
                self.for_each(stmt, head, element_union(&iterable), body)?;
            }
            StmtKind::ForIn { head, right, body } => {
                let target = self.solve(right)?;
                self.for_each(stmt, head, key_union(&target), body)?;
            }
            StmtKind::Switch { discriminant, cases } => {
                self.solve(discriminant)?;
                for case in cases {
                    let scope = self.enter(case.id);
                    if let Some(test) = &case.test {
                        scope.solve(test)?;
                    }
                    if let Completion::Return(value) = scope.exec_stmts(&case.body)? {
                        scope.possible_return(value);
                    }
                }
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => return self.try_stmt(block, handler.as_ref(), finalizer.as_ref()),
            StmtKind::Throw(expr) => {
                self.solve(expr)?;
            }
            StmtKind::ExportNamed { specifiers, source } => self.export_named(specifiers, source.is_some()),
            StmtKind::ExportDefault(expr) => self.export_default(expr),
            StmtKind::Import(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::TypeDecl { .. }
            | StmtKind::Empty => {}
        }
        Ok(Completion::Normal)
    }

    fn if_stmt(&self, test: &'a Expr, cons: &'a Stmt, alt: Option<&'a Stmt>) -> Result<Completion<'a>> {
        self.solve(test)?;
        let then = self.branch(cons)?;
        let otherwise = match alt {
            Some(alt) => Some(self.branch(alt)?),
            None => None,
        };
        Ok(match (then, otherwise) {
            (Completion::Return(a), Some(Completion::Return(b))) => Completion::Return(Value::union(vec![a, b])),
            (Completion::Return(value), _) | (Completion::Normal, Some(Completion::Return(value))) => {
                self.possible_return(value);
                Completion::Normal
            }
            _ => Completion::Normal,
        })
    }

    fn loop_body(&self, body: &'a Stmt) -> Result<()> {
        if let Completion::Return(value) = self.branch(body)? {
            self.possible_return(value);
        }
        Ok(())
    }

    fn for_each(&self, stmt: &'a Stmt, head: &'a ForHead, item: Value<'a>, body: &'a Stmt) -> Result<()> {
        let scope = self.enter(stmt.id);
        let mode = if head.kind.is_some() {
            Binding::Declare
        } else {
            Binding::Assign
        };
        scope.bind_pattern(&head.pat, item, mode)?;
        scope.loop_body(body)?;
        scope.env.force_all()
    }

    fn try_stmt(
        &self,
        block: &'a Block,
        handler: Option<&'a CatchClause>,
        finalizer: Option<&'a Block>,
    ) -> Result<Completion<'a>> {
        let completion = self.exec_block(block)?;
        if let Some(handler) = handler {
            let scope = self.enter(handler.id);
            if let Some(param) = &handler.param {
                scope.bind_pattern(param, Value::Unknown, Binding::Declare)?;
            }
            if let Completion::Return(value) = scope.exec_block(&handler.body)? {
                scope.possible_return(value);
            }
        }
        if let Some(finalizer) = finalizer {
            if let Completion::Return(value) = self.exec_block(finalizer)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(completion)
    }

    /// Identifier declarations bind lazily; destructuring patterns are bound
    /// on the spot. `var` names land in the enclosing function's scope.
    pub(crate) fn var_decl(&self, decl: &'a VarDecl, exported: bool) -> Result<()> {
        for declarator in &decl.decls {
            match (&declarator.name, &declarator.init) {
                (Pat::Ident(id), Some(init)) => {
                    let target = self.var_target(decl.kind);
                    let value = if self.env.record().is_some_and(|r| r.is_generator()) {
                        let value = self.solve(init)?;
                        target.set_value(&id.name, exported, value)
                    } else {
                        let solver = self.clone();
                        target.set_lazy(&id.name, exported, move || solver.solve(init))
                    };
                    if decl.kind.is_using() {
                        self.env.register_disposable(
                            value,
                            Site {
                                node: declarator.id,
                                span: declarator.span,
                            },
                        );
                    }
                }
                (Pat::Ident(id), None) => {
                    let target = self.var_target(decl.kind);
                    // `var a;` does not reset an existing binding.
                    if decl.kind == VarKind::Var && target.env.has_own(&id.name) {
                        continue;
                    }
                    target.env.declare_uninitialized(id.name.as_str());
                    if exported {
                        self.export_binding(&id.name, &id.name);
                    }
                }
                (pat, Some(init)) => {
                    let value = self.solve(init)?;
                    let mode = if exported { Binding::Export } else { Binding::Declare };
                    self.bind_pattern(pat, value, mode)?;
                }
                (pat, None) => {
                    return Err(self.diag(
                        DiagnosticKind::MalformedPattern,
                        pat.span(),
                        "destructuring declaration requires an initializer",
                    ))
                }
            }
        }
        Ok(())
    }

    fn var_target(&self, kind: VarKind) -> Solver<'a> {
        match kind {
            VarKind::Var => self.with_env(self.env.function_scope()),
            _ => self.clone(),
        }
    }

    fn export_named(&self, specifiers: &'a [ExportSpecifier], reexport: bool) {
        for spec in specifiers {
            if reexport {
                // Other modules are not solved.
                self.exports.insert(spec.exported.as_str(), Value::Unknown);
            } else {
                self.export_binding(&spec.local.name, &spec.exported);
            }
        }
    }

    /// Exports `local` under `exported`, read when the export is forced.
    fn export_binding(&self, local: &'a str, exported: &str) {
        let solver = self.clone();
        let value = Value::lazy(move || match solver.env.get(local) {
            Some(value) => value.force(),
            None => Ok(Value::Unknown),
        });
        self.exports.insert(exported, value);
    }

    fn export_default(&self, expr: &'a Expr) {
        let solver = self.clone();
        let value = Value::lazy(move || solver.solve(expr));
        let name = match &expr.kind {
            ExprKind::Function(func) => func.name.as_ref().map(|n| n.name.as_str()),
            ExprKind::Class(class) => class.name.as_ref().map(|n| n.name.as_str()),
            _ => None,
        };
        self.env.declare(name.unwrap_or(DEFAULT_EXPORT), value.clone());
        self.exports.insert("default", value);
    }

    /// Disposes resources registered by `using` declarations of this scope.
    fn dispose(&self) -> Result<()> {
        for (resource, site) in self.env.take_disposables().into_iter().rev() {
            for resource in resource.force()?.alternatives() {
                if matches!(
                    resource,
                    Value::Unknown | Value::Undefined | Value::Null | Value::Uninitialized
                ) {
                    continue;
                }
                let mut dispose = self.member(site, &resource, "@@dispose")?;
                if dispose.is_nullish() {
                    dispose = self.member(site, &resource, "@@asyncDispose")?;
                }
                if dispose.is_nullish() {
                    return Err(self.diag(
                        DiagnosticKind::MissingDispose,
                        site.span,
                        "Missing dispose method in resource",
                    ));
                }
                self.call(site, &dispose, resource, Vec::new())?;
            }
        }
        Ok(())
    }
}
