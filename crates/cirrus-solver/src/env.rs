//! Scope chain.
//!
//! Each block, function body, loop body, case clause and branch arm gets its
//! own [`Env`] linked to the enclosing one. Names are bound at most once per
//! scope; rebinding replaces the entry.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::solver::Site;
use crate::value::Value;

/// Per-invocation bookkeeping shared by every scope of one function body.
#[derive(Default)]
pub struct FnRecord<'a> {
    possible_returns: RefCell<Vec<Value<'a>>>,
    yields: RefCell<Vec<Value<'a>>>,
    generator: bool,
}

impl<'a> FnRecord<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a generator body. Declarations in it bind eagerly so
    /// yields are collected in source order.
    pub fn generator() -> Self {
        FnRecord {
            generator: true,
            ..Self::default()
        }
    }

    pub fn is_generator(&self) -> bool {
        self.generator
    }

    /// A `return` reached on some, but not necessarily every, path.
    pub fn possible_return(&self, value: Value<'a>) {
        self.possible_returns.borrow_mut().push(value);
    }

    pub fn push_yield(&self, value: Value<'a>) {
        self.yields.borrow_mut().push(value);
    }

    pub fn take_yields(&self) -> Vec<Value<'a>> {
        std::mem::take(&mut *self.yields.borrow_mut())
    }

    /// Result of the invocation given the value its body completed with.
    pub fn finish(&self, last: Value<'a>) -> Value<'a> {
        let mut returns = std::mem::take(&mut *self.possible_returns.borrow_mut());
        if returns.is_empty() {
            return last;
        }
        returns.push(last);
        Value::union(returns)
    }
}

struct Scope<'a> {
    vars: RefCell<IndexMap<String, Value<'a>>>,
    disposables: RefCell<Vec<(Value<'a>, Site)>>,
    record: Option<Rc<FnRecord<'a>>>,
    parent: Option<Env<'a>>,
}

#[derive(Clone)]
pub struct Env<'a>(Rc<Scope<'a>>);

impl<'a> Env<'a> {
    pub fn root() -> Self {
        Env::with_parent(None, Some(Rc::new(FnRecord::new())))
    }

    fn with_parent(parent: Option<Env<'a>>, record: Option<Rc<FnRecord<'a>>>) -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(IndexMap::new()),
            disposables: RefCell::new(Vec::new()),
            record,
            parent,
        }))
    }

    pub fn child(&self) -> Self {
        Env::with_parent(Some(self.clone()), None)
    }

    /// Scope of a function body, owning a fresh invocation record.
    pub fn function_child(&self, record: Rc<FnRecord<'a>>) -> Self {
        Env::with_parent(Some(self.clone()), Some(record))
    }

    /// Looks `name` up through the chain without forcing it.
    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        let mut env = Some(self);
        while let Some(Env(scope)) = env {
            if let Some(value) = scope.vars.borrow().get(name) {
                return Some(value.clone());
            }
            env = scope.parent.as_ref();
        }
        None
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    /// Binds `name` in this scope, replacing any earlier binding here.
    pub fn declare(&self, name: impl Into<String>, value: Value<'a>) {
        self.0.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn declare_uninitialized(&self, name: impl Into<String>) {
        self.declare(name, Value::Uninitialized);
    }

    /// Overwrites the nearest existing binding. Returns false when no scope
    /// in the chain binds `name`.
    pub fn assign(&self, name: &str, value: Value<'a>) -> bool {
        let mut env = Some(self);
        while let Some(Env(scope)) = env {
            if let Some(slot) = scope.vars.borrow_mut().get_mut(name) {
                *slot = value;
                return true;
            }
            env = scope.parent.as_ref();
        }
        false
    }

    pub fn register_disposable(&self, resource: Value<'a>, site: Site) {
        self.0.disposables.borrow_mut().push((resource, site));
    }

    /// Registered resources, in registration order.
    pub fn take_disposables(&self) -> Vec<(Value<'a>, Site)> {
        std::mem::take(&mut *self.0.disposables.borrow_mut())
    }

    /// Invocation record of the innermost enclosing function (or module).
    pub fn record(&self) -> Option<Rc<FnRecord<'a>>> {
        let mut env = Some(self);
        while let Some(Env(scope)) = env {
            if let Some(record) = &scope.record {
                return Some(record.clone());
            }
            env = scope.parent.as_ref();
        }
        None
    }

    /// Nearest scope owning an invocation record: where `var` names live.
    pub fn function_scope(&self) -> Env<'a> {
        let mut env = self;
        while env.0.record.is_none() {
            match &env.0.parent {
                Some(parent) => env = parent,
                None => break,
            }
        }
        env.clone()
    }

    /// Forces every binding of this scope, so initializers nobody read still
    /// run their side effects.
    pub fn force_all(&self) -> Result<()> {
        let values: Vec<Value<'a>> = self.0.vars.borrow().values().cloned().collect();
        for value in values {
            value.force()?;
        }
        Ok(())
    }

    /// Own bindings of this scope, in declaration order.
    pub fn bindings(&self) -> Vec<(String, Value<'a>)> {
        self.0
            .vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_chain() {
        let root = Env::root();
        root.declare("a", Value::Num(1.0));
        let child = root.child();
        child.declare("b", Value::Num(2.0));
        assert!(matches!(child.get("a"), Some(Value::Num(n)) if n == 1.0));
        assert!(matches!(child.get("b"), Some(Value::Num(n)) if n == 2.0));
        assert!(root.get("b").is_none());
    }

    #[test]
    fn redeclaring_replaces() {
        let env = Env::root();
        env.declare("a", Value::Num(1.0));
        env.declare("a", Value::Num(2.0));
        assert_eq!(env.bindings().len(), 1);
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let root = Env::root();
        root.declare("a", Value::Num(1.0));
        let inner = root.child().child();
        assert!(inner.assign("a", Value::Num(5.0)));
        assert!(matches!(root.get("a"), Some(Value::Num(n)) if n == 5.0));
        assert!(!inner.assign("missing", Value::Null));
    }

    #[test]
    fn possible_returns_form_a_union() {
        let record = FnRecord::new();
        assert!(matches!(record.finish(Value::Num(1.0)), Value::Num(_)));
        record.possible_return(Value::Num(1.0));
        assert_eq!(record.finish(Value::Undefined).to_string(), "union(1 | undefined)");
    }

    #[test]
    fn record_is_found_from_nested_scopes() {
        let root = Env::root();
        let record = Rc::new(FnRecord::new());
        let body = root.function_child(record.clone()).child();
        let found = body.record().unwrap();
        assert!(Rc::ptr_eq(&found, &record));
    }
}
