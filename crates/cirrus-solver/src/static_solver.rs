//! Entry points for tools: solve a file's top level, instantiate one of its
//! classes, or invoke one of its functions.

use std::cell::RefCell;
use std::rc::Rc;

use cirrus_ast::ast::{Class, Expr, Function};
use cirrus_ast::{NodeId, SourceFile};
use indexmap::IndexMap;

use crate::error::Result;
use crate::solver::{Shared, Site, Solver, SolverOptions, SubstitutionHook};
use crate::value::{Callable, FnDef, Object, Value};

/// Solver for one source file. The module's top level is solved at most
/// once and shared by every later query.
pub struct StaticSolver<'a> {
    shared: Rc<Shared<'a>>,
    hook: Option<SubstitutionHook<'a>>,
    module: RefCell<Option<ModuleScope<'a>>>,
}

impl<'a> StaticSolver<'a> {
    pub fn new(file: &'a SourceFile) -> Self {
        Self::with_options(file, SolverOptions::default())
    }

    pub fn with_options(file: &'a SourceFile, options: SolverOptions) -> Self {
        StaticSolver {
            shared: Rc::new(Shared::new(file, options)),
            hook: None,
            module: RefCell::new(None),
        }
    }

    /// Installs the hook used by every solver this instance creates.
    pub fn with_hook(mut self, hook: SubstitutionHook<'a>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn file(&self) -> &'a SourceFile {
        self.shared.file
    }

    /// Solves a single expression in an empty top-level scope.
    pub fn solve(&self, expr: &'a Expr) -> Result<Value<'a>> {
        Solver::top_level(self.shared.clone(), Vec::new(), self.hook.clone()).solve(expr)
    }

    /// A solver positioned inside `scopes` with `bindings` pre-declared.
    /// `hook` replaces this instance's hook when given.
    pub fn create_solver(
        &self,
        scopes: Vec<NodeId>,
        bindings: IndexMap<String, Value<'a>>,
        hook: Option<SubstitutionHook<'a>>,
    ) -> Solver<'a> {
        let solver = Solver::top_level(self.shared.clone(), scopes, hook.or_else(|| self.hook.clone()));
        for (name, value) in bindings {
            solver.env.declare(name, value);
        }
        solver
    }

    /// Runs the file's top level to completion.
    pub fn solve_module(&self) -> Result<ModuleScope<'a>> {
        if let Some(module) = &*self.module.borrow() {
            return Ok(module.clone());
        }
        let solver = Solver::top_level(self.shared.clone(), Vec::new(), self.hook.clone());
        let _span = tracing::debug_span!("solve_module", file = %self.file().name).entered();
        solver.exec_stmts(&self.file().stmts)?;
        let module = ModuleScope { solver };
        *self.module.borrow_mut() = Some(module.clone());
        Ok(module)
    }

    /// Constructs `class` after solving the module it lives in.
    pub fn create_instance(&self, class: &'a Class, args: Vec<Value<'a>>) -> Result<Instance<'a>> {
        let module = self.solve_module()?;
        let site = Site {
            node: class.id,
            span: class.span,
        };
        let ctor = match module.own_class(class)? {
            Some(ctor) => ctor,
            None => module.solver.class_value(class)?,
        };
        let value = module.solver.construct(site, &ctor, args)?;
        Ok(Instance {
            solver: module.solver.clone(),
            value,
            site,
        })
    }

    /// Calls `func` after solving the module it lives in. A top-level
    /// declaration is called through its module binding, so it sees the
    /// same statics and closures as the rest of the module.
    pub fn invoke(&self, func: &'a Function, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        let module = self.solve_module()?;
        let site = Site {
            node: func.id,
            span: func.span,
        };
        let callee = match module.own_function(func)? {
            Some(callee) => callee,
            None => module.solver.function_value(func),
        };
        module.solver.call(site, &callee, this, args)
    }
}

/// The solved top level of a file.
#[derive(Clone)]
pub struct ModuleScope<'a> {
    solver: Solver<'a>,
}

impl std::fmt::Debug for ModuleScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleScope").finish_non_exhaustive()
    }
}

impl<'a> ModuleScope<'a> {
    pub fn solver(&self) -> &Solver<'a> {
        &self.solver
    }

    pub fn exports(&self) -> &Object<'a> {
        self.solver.exports()
    }

    /// Forced value of an exported name.
    pub fn export(&self, name: &str) -> Result<Option<Value<'a>>> {
        self.exports().get(name).map(|v| v.force()).transpose()
    }

    /// Every export, forced, in declaration order.
    pub fn exported(&self) -> Result<Vec<(String, Value<'a>)>> {
        let mut out = Vec::new();
        for (name, value) in self.exports().entries() {
            out.push((name, value.force()?));
        }
        Ok(out)
    }

    /// Forced value of a top-level binding.
    pub fn get(&self, name: &str) -> Result<Option<Value<'a>>> {
        self.solver.get(name)
    }

    fn binding(&self, name: Option<&str>) -> Result<Option<Rc<crate::value::EvalFunction<'a>>>> {
        let Some(name) = name else { return Ok(None) };
        match self.solver.get(name)? {
            Some(Value::Callable(Callable::Function(func))) => Ok(Some(func)),
            _ => Ok(None),
        }
    }

    fn own_function(&self, func: &'a Function) -> Result<Option<Value<'a>>> {
        let bound = self.binding(func.name.as_ref().map(|n| n.name.as_str()))?;
        Ok(bound
            .filter(|f| matches!(f.def, FnDef::Function(def) if std::ptr::eq(def, func)))
            .map(|f| Value::Callable(Callable::Function(f))))
    }

    fn own_class(&self, class: &'a Class) -> Result<Option<Value<'a>>> {
        let bound = self.binding(class.name.as_ref().map(|n| n.name.as_str()))?;
        Ok(bound
            .filter(|f| matches!(f.def, FnDef::Class { class: def, .. } if std::ptr::eq(def, class)))
            .map(|f| Value::Callable(Callable::Function(f))))
    }
}

/// A constructed instance whose methods stay bound to it.
pub struct Instance<'a> {
    solver: Solver<'a>,
    value: Value<'a>,
    site: Site,
}

impl<'a> Instance<'a> {
    pub fn value(&self) -> &Value<'a> {
        &self.value
    }

    /// Reads a property of the instance, forcing accessors.
    pub fn get(&self, name: &str) -> Result<Value<'a>> {
        self.solver.member(self.site, &self.value, name)
    }

    /// Calls a method with the instance as receiver.
    pub fn call_method(&self, name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>> {
        let method = self.get(name)?;
        self.solver.call(self.site, &method, self.value.clone(), args)
    }
}
