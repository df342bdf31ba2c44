//! Calls, construction and the lowering of classes.
//!
//! Every call goes through [`Solver::guarded`], which keeps the shared call
//! stack and turns runaway recursion into `Unknown` instead of an error.

use std::rc::Rc;

use cirrus_ast::ast::{Class, ClassMember, Expr, ExprKind, ExprOrSpread, FnBody, Function, FunctionKind, Pat, PropKey};

use crate::env::FnRecord;
use crate::error::{DiagnosticKind, Result};
use crate::solver::{ensure_sufficient_stack, Frame, Site, Solver};
use crate::stmt::Completion;
use crate::value::{Callable, EvalFunction, FnDef, Object, Value};

/// Binding of the evaluated `extends` clause inside a class scope.
pub(crate) const SUPER: &str = "%super";

impl<'a> Solver<'a> {
    pub(crate) fn call_expr(
        &self,
        expr: &'a Expr,
        callee: &'a Expr,
        args: &'a [ExprOrSpread],
    ) -> Result<Value<'a>> {
        if matches!(callee.kind, ExprKind::Super) {
            // Parent initialization already ran with the constructor's arguments.
            self.solve_args(args)?;
            return Ok(Value::Undefined);
        }
        let site = Site::of(callee);
        let targets = match &callee.kind {
            ExprKind::Member { obj, prop, .. } if matches!(obj.kind, ExprKind::Super) => {
                vec![(self.super_member(prop)?, self.current_this()?)]
            }
            ExprKind::Member { obj, prop, .. } => {
                let receiver = self.solve(obj)?;
                self.methods(&receiver, |alt| self.member(site, alt, prop))?
            }
            ExprKind::Index { obj, index, .. } => {
                let receiver = self.solve(obj)?;
                let key = self.solve(index)?;
                self.methods(&receiver, |alt| self.index(site, alt, &key))?
            }
            _ => vec![(self.solve(callee)?, Value::Undefined)],
        };
        let args = self.solve_args(args)?;
        let mut out = Vec::with_capacity(targets.len());
        for (func, this) in targets {
            if func.is_unknown() || this.is_unknown() {
                out.push(Value::Unknown);
                continue;
            }
            out.push(self.call(Site::of(expr), &func, this, args.clone())?);
        }
        Ok(Value::union(out))
    }

    /// Pairs every alternative of a receiver with the method it resolves to,
    /// so each call sees its own alternative as `this`.
    fn methods(
        &self,
        receiver: &Value<'a>,
        lookup: impl Fn(&Value<'a>) -> Result<Value<'a>>,
    ) -> Result<Vec<(Value<'a>, Value<'a>)>> {
        let mut pairs = Vec::new();
        for alt in receiver.alternatives() {
            let method = if alt.is_unknown() { Value::Unknown } else { lookup(&alt)? };
            pairs.push((method, alt));
        }
        Ok(pairs)
    }

    pub(crate) fn new_expr(&self, expr: &'a Expr, callee: &'a Expr, args: &'a [ExprOrSpread]) -> Result<Value<'a>> {
        let func = self.solve(callee)?;
        let args = self.solve_args(args)?;
        self.construct(Site::of(expr), &func, args)
    }

    /// Calls `callee` with an explicit receiver.
    pub fn call(&self, site: Site, callee: &Value<'a>, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        match callee.force()? {
            Value::Unknown | Value::Uninitialized => Ok(Value::Unknown),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.call(site, alt, this.clone(), args.clone())?);
                }
                Ok(Value::union(out))
            }
            Value::Callable(callable) => {
                self.guarded(site, args, |args| self.call_callable(site, &callable, this, args))
            }
            other if !other.truthy() => {
                tracing::debug!(callee = %other, "call of a falsy value");
                Ok(Value::Unknown)
            }
            other => Err(self.diag(
                DiagnosticKind::NotCallable,
                site.span,
                format!("not a function: {other}"),
            )),
        }
    }

    fn call_callable(&self, site: Site, callable: &Callable<'a>, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        match callable {
            Callable::Host(host) => (host.call)(self, site, this, args),
            Callable::Function(func) => match &func.def {
                FnDef::Function(def) => func.solver.run_function(def, this, args),
                FnDef::Class { .. } => Err(self.diag(
                    DiagnosticKind::NotCallable,
                    site.span,
                    format!("class constructor {} cannot be invoked without 'new'", func.name),
                )),
            },
        }
    }

    /// `new callee(...args)`.
    pub fn construct(&self, site: Site, callee: &Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        match callee.force()? {
            Value::Unknown | Value::Uninitialized => Ok(Value::Unknown),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.construct(site, alt, args.clone())?);
                }
                Ok(Value::union(out))
            }
            Value::Callable(callable) => {
                self.guarded(site, args, |args| self.construct_callable(site, &callable, args))
            }
            other => Err(self.diag(
                DiagnosticKind::NotAConstructor,
                site.span,
                format!("{other} is not a constructor"),
            )),
        }
    }

    fn construct_callable(&self, site: Site, callable: &Callable<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        let func = match callable {
            Callable::Host(host) => {
                return match &host.construct {
                    Some(construct) => construct(self, site, Value::Undefined, args),
                    None => Err(self.diag(
                        DiagnosticKind::NotAConstructor,
                        site.span,
                        format!("{} is not a constructor", host.name),
                    )),
                }
            }
            Callable::Function(func) => func,
        };
        let this = Value::Object(Object::new());
        match &func.def {
            FnDef::Class { .. } => {
                self.init_instance(site, func, &this, &args)?;
                Ok(this)
            }
            FnDef::Function(def) if def.is_arrow() || def.kind == FunctionKind::Method => Err(self.diag(
                DiagnosticKind::NotAConstructor,
                site.span,
                format!("{} is not a constructor", callable_label(&func.name)),
            )),
            FnDef::Function(def) => {
                let result = func.solver.run_function(def, this.clone(), args)?;
                match result {
                    Value::Object(_) | Value::Array(_) | Value::Callable(_) => Ok(result),
                    _ => Ok(this),
                }
            }
        }
    }

    /// Runs `f` as a new frame unless the stack is too deep or an identical
    /// frame is already active.
    fn guarded(
        &self,
        site: Site,
        args: Vec<Value<'a>>,
        f: impl FnOnce(Vec<Value<'a>>) -> Result<Value<'a>>,
    ) -> Result<Value<'a>> {
        {
            let stack = self.shared.call_stack.borrow();
            if stack.len() > self.shared.options.max_call_depth {
                tracing::debug!(depth = stack.len(), "call depth limit reached");
                return Ok(Value::Unknown);
            }
            let repeated = stack.iter().any(|frame| {
                frame.site == site.node
                    && frame.args.len() == args.len()
                    && frame.args.iter().zip(&args).all(|(a, b)| a.same(b))
            });
            if repeated {
                let (line, col) = self.file().line_col(site.span.start);
                tracing::debug!(line, col, "recursive call with identical arguments");
                return Ok(Value::Unknown);
            }
        }
        self.shared.call_stack.borrow_mut().push(Frame {
            site: site.node,
            args: args.clone(),
        });
        let result = ensure_sufficient_stack(|| f(args));
        self.shared.call_stack.borrow_mut().pop();
        result
    }

    /// Evaluates a function body in a fresh scope below its defining context.
    pub(crate) fn run_function(&self, func: &'a Function, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        let name = func.name.as_ref().map_or("<anonymous>", |n| n.name.as_str());
        let (line, _) = self.file().line_col(func.span.start);
        let _span = tracing::trace_span!("call", name, line).entered();

        let Some(body) = &func.body else {
            return Ok(Value::Unknown);
        };
        let record = Rc::new(if func.is_generator {
            FnRecord::generator()
        } else {
            FnRecord::new()
        });
        let scope = self.enter_function(func.id, record.clone());
        if !func.is_arrow() {
            scope.env.declare("this", this);
            scope.env.declare("arguments", Value::array(args.clone()));
        }
        scope.bind_params(&func.params, &args)?;
        let last = match body {
            FnBody::Expr(expr) => scope.solve(expr)?,
            FnBody::Block(block) => match scope.exec_stmts(&block.stmts)? {
                Completion::Return(value) => value,
                Completion::Normal => Value::Undefined,
            },
        };
        if func.is_generator {
            return Ok(Value::array(record.take_yields()));
        }
        Ok(record.finish(last))
    }

    fn closure(&self, def: FnDef<'a>, name: String) -> Value<'a> {
        Value::Callable(Callable::Function(Rc::new(EvalFunction {
            def,
            name,
            solver: self.clone(),
            statics: Object::new(),
        })))
    }

    pub(crate) fn function_value(&self, func: &'a Function) -> Value<'a> {
        let name = func.name.as_ref().map(|n| n.name.clone()).unwrap_or_default();
        if func.kind == FunctionKind::Expression && !name.is_empty() {
            // A named function expression sees its own name.
            let scope = self.nested();
            let value = scope.closure(FnDef::Function(func), name.clone());
            scope.env.declare(name, value.clone());
            return value;
        }
        self.closure(FnDef::Function(func), name)
    }

    pub(crate) fn method_value(&self, func: &'a Function, name: &str) -> Value<'a> {
        self.closure(FnDef::Function(func), name.to_string())
    }

    /// An accessor property: the getter body run once, on first read.
    pub(crate) fn getter_value(&self, func: &'a Function, this: Value<'a>) -> Value<'a> {
        let solver = self.clone();
        Value::lazy(move || solver.run_function(func, this, Vec::new()))
    }

    /// Lowers a class to a constructor function carrying its static members.
    pub(crate) fn class_value(&self, class: &'a Class) -> Result<Value<'a>> {
        let parent = match &class.super_class {
            Some(expr) => Some(self.solve(expr)?),
            None => None,
        };
        let scope = self.enter(class.id);
        scope.env.declare(SUPER, parent.clone().unwrap_or(Value::Undefined));
        let name = class.name.as_ref().map(|n| n.name.clone()).unwrap_or_default();
        let func = Rc::new(EvalFunction {
            def: FnDef::Class { class, parent },
            name: name.clone(),
            solver: scope.clone(),
            statics: Object::new(),
        });
        let value = Value::Callable(Callable::Function(func.clone()));
        if !name.is_empty() {
            scope.env.declare(name, value.clone());
        }

        let statics = scope.nested();
        statics.env.declare("this", value.clone());
        for member in &class.members {
            match member {
                ClassMember::Method {
                    key,
                    func: method,
                    is_static: true,
                } => {
                    let Some(key) = statics.prop_key(key)? else { continue };
                    match method.kind {
                        FunctionKind::Getter => func.statics.insert(key, scope.getter_value(method, value.clone())),
                        FunctionKind::Setter => {}
                        _ => {
                            let method = scope.method_value(method, &key);
                            func.statics.insert(key, method);
                        }
                    }
                }
                ClassMember::Field {
                    key,
                    value: init,
                    is_static: true,
                    ..
                } => {
                    let Some(key) = statics.prop_key(key)? else { continue };
                    let field = match init {
                        Some(init) => statics.solve(init)?,
                        None => Value::Undefined,
                    };
                    func.statics.insert(key, field);
                }
                _ => {}
            }
        }
        Ok(value)
    }

    /// Populates a fresh instance: parent first, then methods, fields,
    /// parameter properties and finally the constructor body.
    pub(crate) fn init_instance(
        &self,
        site: Site,
        func: &EvalFunction<'a>,
        this: &Value<'a>,
        args: &[Value<'a>],
    ) -> Result<()> {
        let FnDef::Class { class, parent } = &func.def else {
            return Ok(());
        };
        let Value::Object(instance) = this else {
            return Ok(());
        };
        if let Some(parent) = parent {
            self.init_parent(site, parent, this, args)?;
        }

        let scope = func.solver.nested();
        scope.env.declare("this", this.clone());
        for member in &class.members {
            if let ClassMember::Method {
                key,
                func: method,
                is_static: false,
            } = member
            {
                let Some(key) = scope.prop_key(key)? else { continue };
                match method.kind {
                    FunctionKind::Getter => instance.insert(key, func.solver.getter_value(method, this.clone())),
                    FunctionKind::Setter => {}
                    _ => {
                        let method = func.solver.method_value(method, &key);
                        instance.insert(key, method);
                    }
                }
            }
        }
        for member in &class.members {
            if let ClassMember::Field {
                key,
                value,
                is_static: false,
                ..
            } = member
            {
                let Some(key) = scope.prop_key(key)? else { continue };
                let field = match value {
                    Some(init) => scope.solve(init)?,
                    None => Value::Undefined,
                };
                instance.insert(key, field);
            }
        }

        let Some(ctor) = class.constructor() else {
            return Ok(());
        };
        for (i, param) in ctor.params.iter().enumerate() {
            if let (true, Pat::Ident(id)) = (param.property, &param.pat) {
                let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
                instance.insert(id.name.as_str(), arg);
            }
        }
        func.solver.run_function(ctor, this.clone(), args.to_vec())?;
        Ok(())
    }

    fn init_parent(&self, site: Site, parent: &Value<'a>, this: &Value<'a>, args: &[Value<'a>]) -> Result<()> {
        match parent.force()? {
            Value::Callable(Callable::Function(base)) => match &base.def {
                FnDef::Class { .. } => self.init_instance(site, &base, this, args),
                FnDef::Function(def) => base.solver.run_function(def, this.clone(), args.to_vec()).map(drop),
            },
            Value::Callable(Callable::Host(host)) => {
                let Some(construct) = &host.construct else {
                    return Ok(());
                };
                if let (Value::Object(base), Value::Object(instance)) =
                    (construct(self, site, Value::Undefined, args.to_vec())?, this)
                {
                    for (k, v) in base.entries() {
                        instance.insert(k, v);
                    }
                }
                Ok(())
            }
            Value::Unknown | Value::Union(_) | Value::Uninitialized => {
                tracing::debug!("base class is not statically known");
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(self.diag(
                DiagnosticKind::NotAConstructor,
                site.span,
                format!("class extends value {other} is not a constructor"),
            )),
        }
    }

    /// `super.name` inside a class body: the nearest ancestor's method.
    pub(crate) fn super_member(&self, name: &str) -> Result<Value<'a>> {
        let parent = match self.env.get(SUPER) {
            Some(parent) => parent.force()?,
            None => return Ok(Value::Unknown),
        };
        let Value::Callable(Callable::Function(base)) = &parent else {
            return Ok(if parent.is_nullish() { Value::Undefined } else { Value::Unknown });
        };
        let FnDef::Class { class, .. } = &base.def else {
            return Ok(Value::Unknown);
        };
        for member in &class.members {
            if let ClassMember::Method {
                key: PropKey::Ident(key) | PropKey::Str(key),
                func,
                is_static: false,
            } = member
            {
                if key == name && !matches!(func.kind, FunctionKind::Getter | FunctionKind::Setter) {
                    return Ok(base.solver.method_value(func, name));
                }
            }
        }
        base.solver.super_member(name)
    }
}

fn callable_label(name: &str) -> &str {
    if name.is_empty() {
        "anonymous function"
    } else {
        name
    }
}
