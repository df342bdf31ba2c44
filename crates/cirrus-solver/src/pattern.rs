//! Destructuring and parameter binding.

use cirrus_ast::ast::{Expr, Ident, Param, Pat, PropKey};
use cirrus_ast::Span;

use crate::error::{DiagnosticKind, Result};
use crate::ops::property_key;
use crate::solver::{Site, Solver};
use crate::value::{Props, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// New bindings in the current scope.
    Declare,
    /// New bindings mirrored into the module's exports.
    Export,
    /// Writes to existing bindings.
    Assign,
}

impl<'a> Solver<'a> {
    pub(crate) fn bind_pattern(&self, pat: &'a Pat, value: Value<'a>, mode: Binding) -> Result<()> {
        match pat {
            Pat::Ident(id) => self.bind_name(id, value, mode),
            Pat::Object(obj) => {
                let source = value.force()?;
                let site = Site {
                    node: obj.id,
                    span: obj.span,
                };
                let mut used = Vec::with_capacity(obj.props.len());
                for prop in &obj.props {
                    let key = self.pattern_key(&prop.key, prop.span)?;
                    let item = match key {
                        Some(key) if !source.is_unknown() => {
                            let item = self.member(site, &source, &key)?;
                            used.push(key);
                            item
                        }
                        _ => Value::Unknown,
                    };
                    let item = self.with_default(item, prop.default.as_ref())?;
                    self.bind_pattern(&prop.value, item, mode)?;
                }
                if let Some(rest) = &obj.rest {
                    let remaining = match &source {
                        Value::Object(src) => Value::object(
                            src.entries()
                                .into_iter()
                                .filter(|(k, _)| !used.contains(k))
                                .collect(),
                        ),
                        Value::Unknown | Value::Union(_) | Value::Uninitialized => Value::Unknown,
                        _ => Value::object(Props::new()),
                    };
                    self.bind_name(rest, remaining, mode)?;
                }
                Ok(())
            }
            Pat::Array(arr) => {
                let source = value.force()?;
                for (i, elem) in arr.elems.iter().enumerate() {
                    let Some(elem) = elem else { continue };
                    let item = self.with_default(element_at(&source, i), elem.default.as_ref())?;
                    self.bind_pattern(&elem.pat, item, mode)?;
                }
                if let Some(rest) = &arr.rest {
                    let skip = arr.elems.len();
                    let tail = match &source {
                        Value::Array(items) => Value::array(items.to_vec().into_iter().skip(skip).collect()),
                        Value::Str(s) => Value::array(
                            s.chars().skip(skip).map(|c| Value::Str(c.to_string())).collect(),
                        ),
                        _ => Value::Unknown,
                    };
                    self.bind_pattern(rest, tail, mode)?;
                }
                Ok(())
            }
        }
    }

    fn bind_name(&self, id: &'a Ident, value: Value<'a>, mode: Binding) -> Result<()> {
        match mode {
            Binding::Declare => {
                self.env.declare(id.name.as_str(), value);
                Ok(())
            }
            Binding::Export => {
                self.env.declare(id.name.as_str(), value.clone());
                self.exports.insert(id.name.as_str(), value);
                Ok(())
            }
            Binding::Assign => self.assign_name(None, &id.name, id.span, value),
        }
    }

    fn pattern_key(&self, key: &'a PropKey, span: Span) -> Result<Option<String>> {
        let PropKey::Computed(expr) = key else {
            return self.prop_key(key);
        };
        match self.solve(expr)? {
            Value::Unknown | Value::Union(_) | Value::Uninitialized => Ok(None),
            Value::Object(_) | Value::Array(_) | Value::Callable(_) => Err(self.diag(
                DiagnosticKind::MalformedPattern,
                span,
                "computed key in a binding pattern must be a string or number",
            )),
            key => Ok(Some(property_key(&key))),
        }
    }

    /// Falls back to the declared default when the item is `undefined`.
    fn with_default(&self, item: Value<'a>, default: Option<&'a Expr>) -> Result<Value<'a>> {
        match (item.force()?, default) {
            (Value::Undefined, Some(default)) => self.solve(default),
            (item, _) => Ok(item),
        }
    }

    /// Binds call arguments to parameters. Defaults are evaluated lazily, in
    /// the function's own scope.
    pub(crate) fn bind_params(&self, params: &'a [Param], args: &[Value<'a>]) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            let value = if param.rest {
                Value::array(args.iter().skip(i).cloned().collect())
            } else {
                match (args.get(i), &param.default) {
                    (Some(arg), _) if !matches!(arg, Value::Undefined) => arg.clone(),
                    (_, Some(default)) => {
                        let solver = self.clone();
                        Value::lazy(move || solver.solve(default))
                    }
                    _ => Value::Undefined,
                }
            };
            self.bind_pattern(&param.pat, value, Binding::Declare)?;
        }
        Ok(())
    }
}

fn element_at<'a>(source: &Value<'a>, index: usize) -> Value<'a> {
    match source {
        Value::Union(alts) => Value::union(alts.iter().map(|alt| element_at(alt, index)).collect()),
        Value::Array(items) => items.get(index).unwrap_or(Value::Undefined),
        Value::Str(s) => s
            .chars()
            .nth(index)
            .map_or(Value::Undefined, |c| Value::Str(c.to_string())),
        _ => Value::Unknown,
    }
}
