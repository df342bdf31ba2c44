//! Ready-made substitution hooks.

use std::collections::HashSet;
use std::rc::Rc;

use cirrus_ast::ast::Expr;
use cirrus_ast::{NodeId, SourceFile};

use crate::solver::{Substitution, SubstitutionHook};
use crate::value::Value;

/// Resolves every name the file imports to `Unknown`. Without it, reading
/// an imported binding is an undeclared-identifier error.
pub fn unknown_imports<'a>(file: &'a SourceFile) -> SubstitutionHook<'a> {
    let names: HashSet<&'a str> = file.imported_names().into_iter().collect();
    Rc::new(move |expr: &'a Expr, _: &[NodeId]| match expr.as_ident() {
        Some(name) if names.contains(name) => Substitution::Value(Value::Unknown),
        _ => Substitution::PassThrough,
    })
}

/// Resolves the listed names to fixed values.
pub fn bindings<'a>(values: Vec<(String, Value<'a>)>) -> SubstitutionHook<'a> {
    Rc::new(move |expr: &'a Expr, _: &[NodeId]| {
        let found = expr
            .as_ident()
            .and_then(|name| values.iter().find(|(k, _)| k == name));
        match found {
            Some((_, value)) => Substitution::Value(value.clone()),
            None => Substitution::PassThrough,
        }
    })
}
