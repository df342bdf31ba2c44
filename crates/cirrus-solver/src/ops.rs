//! Operator algebra, property access and assignment targets.
//!
//! `Unknown` absorbs before unions distribute: an operation touching an
//! unknown operand is unknown even when the other side is a union.

use cirrus_ast::ast::{AssignOp, AssignTarget, BinaryOp, Expr, ExprKind, UnaryOp};

use crate::builtins;
use crate::error::{DiagnosticKind, Result};
use crate::pattern::Binding;
use crate::solver::{Site, Solver};
use crate::value::{format_number, Callable, Value};

/// An assignment target with its object and key already evaluated.
pub(crate) enum Place<'a> {
    Name(&'a Expr, &'a str),
    Property { site: Site, object: Value<'a>, key: Value<'a> },
}

/// Applies `f` to every alternative, keeping `Unknown` alternatives as is.
pub(crate) fn map_alternatives<'a>(value: &Value<'a>, f: impl Fn(&Value<'a>) -> Value<'a>) -> Value<'a> {
    match value {
        Value::Unknown => Value::Unknown,
        Value::Union(alts) => Value::union(
            alts.iter()
                .map(|alt| if alt.is_unknown() { Value::Unknown } else { f(alt) })
                .collect(),
        ),
        other => f(other),
    }
}

pub(crate) fn binary<'a>(op: BinaryOp, left: &Value<'a>, right: &Value<'a>) -> Value<'a> {
    if left.is_unknown() || right.is_unknown() {
        return Value::Unknown;
    }
    if left.is_union() || right.is_union() {
        let mut out = Vec::new();
        for l in left.alternatives() {
            for r in right.alternatives() {
                out.push(binary(op, &l, &r));
            }
        }
        return Value::union(out);
    }
    if left.is_uninitialized() || right.is_uninitialized() {
        return Value::Unknown;
    }
    match op {
        BinaryOp::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        BinaryOp::Nullish => {
            if left.is_nullish() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Add => add(left, right),
        BinaryOp::Lt => less_than(left, right),
        BinaryOp::Sub => Value::Num(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Num(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Num(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Num(left.to_number() % right.to_number()),
        BinaryOp::Exp => Value::Num(left.to_number().powf(right.to_number())),
        _ => Value::Unknown,
    }
}

fn is_stringy(value: &Value<'_>) -> bool {
    matches!(
        value,
        Value::Str(_) | Value::Array(_) | Value::Object(_) | Value::Callable(_)
    )
}

fn add<'a>(left: &Value<'a>, right: &Value<'a>) -> Value<'a> {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => Value::Num(a + b),
        _ if is_stringy(left) || is_stringy(right) => {
            Value::Str(left.to_js_string() + &right.to_js_string())
        }
        _ => Value::Num(left.to_number() + right.to_number()),
    }
}

fn less_than<'a>(left: &Value<'a>, right: &Value<'a>) -> Value<'a> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Value::Bool(a < b),
        _ => Value::Bool(left.to_number() < right.to_number()),
    }
}

/// Concatenates settled parts, expanding union parts into every combination.
pub(crate) fn concat_parts<'a>(parts: &[Value<'a>]) -> Value<'a> {
    let Some(pos) = parts.iter().position(Value::is_union) else {
        return Value::Str(parts.iter().map(Value::to_js_string).collect());
    };
    let mut out = Vec::new();
    for alt in parts[pos].alternatives() {
        if alt.is_unknown() {
            out.push(Value::Unknown);
            continue;
        }
        let mut next = parts.to_vec();
        next[pos] = alt;
        out.push(concat_parts(&next));
    }
    Value::union(out)
}

/// Items produced by spreading a settled value.
pub(crate) fn spread_items<'a>(value: &Value<'a>) -> Vec<Value<'a>> {
    match value {
        Value::Array(items) => items.to_vec(),
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        Value::Undefined | Value::Null => Vec::new(),
        _ => vec![Value::Unknown],
    }
}

/// Union of everything a `for...of` loop could see.
pub(crate) fn element_union<'a>(iterable: &Value<'a>) -> Value<'a> {
    match iterable {
        Value::Union(alts) => Value::union(alts.iter().map(element_union).collect()),
        Value::Array(items) => Value::union(items.to_vec()),
        Value::Str(s) => Value::union(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => Value::Unknown,
    }
}

/// Union of every key a `for...in` loop could see.
pub(crate) fn key_union<'a>(target: &Value<'a>) -> Value<'a> {
    match target {
        Value::Union(alts) => Value::union(alts.iter().map(key_union).collect()),
        Value::Object(obj) => Value::union(obj.keys().into_iter().map(Value::Str).collect()),
        Value::Array(items) => {
            Value::union((0..items.len()).map(|i| Value::Str(i.to_string())).collect())
        }
        _ => Value::Unknown,
    }
}

/// Property name for a settled key value.
pub(crate) fn property_key(key: &Value<'_>) -> String {
    match key {
        Value::Num(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

impl<'a> Solver<'a> {
    pub(crate) fn unary(&self, expr: &'a Expr, op: UnaryOp, value: &Value<'a>) -> Result<Value<'a>> {
        match value {
            Value::Unknown | Value::Uninitialized => Ok(Value::Unknown),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.unary(expr, op, alt)?);
                }
                Ok(Value::union(out))
            }
            value => Ok(match op {
                UnaryOp::Plus => Value::Num(value.to_number()),
                UnaryOp::Minus => Value::Num(-value.to_number()),
                UnaryOp::Not => Value::Bool(!value.truthy()),
                UnaryOp::BitNot => {
                    return Err(self.diag(
                        DiagnosticKind::NotImplemented,
                        expr.span,
                        "bitwise not is not supported",
                    ))
                }
            }),
        }
    }

    /// `target.key`, with union distribution and builtin members.
    pub(crate) fn member(&self, site: Site, target: &Value<'a>, key: &str) -> Result<Value<'a>> {
        match target.force()? {
            Value::Unknown | Value::Uninitialized => Ok(Value::Unknown),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.member(site, alt, key)?);
                }
                Ok(Value::union(out))
            }
            Value::Undefined | Value::Null => Ok(Value::Undefined),
            Value::Object(obj) => match obj.get(key) {
                Some(value) => value.force(),
                None => Ok(builtins::object_member(key)),
            },
            Value::Callable(callable) => builtins::callable_member(&callable, key).force(),
            other => builtins::primitive_member(&other, key).force(),
        }
    }

    /// `target[key]`. An unknown key reads as any of the target's values.
    pub(crate) fn index(&self, site: Site, target: &Value<'a>, key: &Value<'a>) -> Result<Value<'a>> {
        match key.force()? {
            Value::Unknown | Value::Uninitialized => self.all_values(target),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.index(site, target, alt)?);
                }
                Ok(Value::union(out))
            }
            key => self.member(site, target, &property_key(&key)),
        }
    }

    fn all_values(&self, target: &Value<'a>) -> Result<Value<'a>> {
        Ok(match target.force()? {
            Value::Object(obj) => {
                let mut out = Vec::new();
                for value in obj.values() {
                    out.push(value.force()?);
                }
                Value::union(out)
            }
            Value::Array(items) => Value::union(items.to_vec()),
            Value::Union(alts) => {
                let mut out = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    out.push(self.all_values(alt)?);
                }
                Value::union(out)
            }
            _ => Value::Unknown,
        })
    }

    /// Property write. Writes through unknown or union targets are dropped.
    pub(crate) fn set_member(&self, site: Site, target: &Value<'a>, key: String, value: Value<'a>) -> Result<()> {
        match target.force()? {
            Value::Unknown | Value::Union(_) | Value::Uninitialized => {
                tracing::debug!(key = %key, "property write on an indeterminate target ignored");
                Ok(())
            }
            Value::Object(obj) => {
                obj.insert(key, value);
                Ok(())
            }
            Value::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    if !items.set(index, value) {
                        tracing::debug!(index, "array write past the length limit ignored");
                    }
                }
                Ok(())
            }
            Value::Callable(Callable::Function(func)) => {
                func.statics.insert(key, value);
                Ok(())
            }
            Value::Callable(Callable::Host(_)) => Ok(()),
            other => Err(self.diag(
                DiagnosticKind::NotAnObject,
                site.span,
                format!("Not an object: cannot set `{key}` on {}", other.kind_name()),
            )),
        }
    }

    /// Resolves an assignment target once, so reads and writes through it
    /// share a single evaluation of the object and key expressions.
    pub(crate) fn place(&self, target: &'a Expr) -> Result<Place<'a>> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Place::Name(target, name)),
            ExprKind::Member { obj, prop, .. } => Ok(Place::Property {
                site: Site::of(target),
                object: self.solve(obj)?,
                key: Value::Str(prop.clone()),
            }),
            ExprKind::Index { obj, index, .. } => {
                let object = self.solve(obj)?;
                let key = self.solve(index)?;
                Ok(Place::Property { site: Site::of(target), object, key })
            }
            ExprKind::Paren(inner)
            | ExprKind::NonNull(inner)
            | ExprKind::As { expr: inner, .. }
            | ExprKind::Satisfies { expr: inner, .. } => self.place(inner),
            other => Err(self.diag(
                DiagnosticKind::NotImplemented,
                target.span,
                format!("cannot assign to {}", other.name()),
            )),
        }
    }

    pub(crate) fn read_place(&self, place: &Place<'a>) -> Result<Value<'a>> {
        match place {
            Place::Name(target, _) => self.solve(target),
            Place::Property { site, object, key } => self.index(*site, object, key),
        }
    }

    pub(crate) fn write_place(&self, place: Place<'a>, value: Value<'a>) -> Result<()> {
        match place {
            Place::Name(target, name) => self.assign_name(Some(target), name, target.span, value),
            Place::Property { site, object, key } => match key {
                Value::Unknown | Value::Union(_) | Value::Uninitialized => {
                    tracing::debug!("write through an indeterminate key ignored");
                    Ok(())
                }
                key => self.set_member(site, &object, property_key(&key), value),
            },
        }
    }

    pub(crate) fn assign(&self, op: AssignOp, target: &'a AssignTarget, rhs: &'a Expr) -> Result<Value<'a>> {
        match target {
            AssignTarget::Pattern(pat) => {
                let value = self.solve(rhs)?;
                self.bind_pattern(pat, value.clone(), Binding::Assign)?;
                Ok(value)
            }
            AssignTarget::Simple(target) => {
                let place = self.place(target)?;
                let value = match op {
                    AssignOp::Assign => self.solve(rhs)?,
                    AssignOp::Compound(op) => {
                        let current = self.read_place(&place)?;
                        let rhs = self.solve(rhs)?;
                        binary(op, &current, &rhs)
                    }
                };
                self.write_place(place, value.clone())?;
                Ok(value)
            }
        }
    }

    pub(crate) fn delete(&self, arg: &'a Expr) -> Result<Value<'a>> {
        let (object, key) = match &arg.kind {
            ExprKind::Member { obj, prop, .. } => (self.solve(obj)?, Value::Str(prop.clone())),
            ExprKind::Index { obj, index, .. } => (self.solve(obj)?, self.solve(index)?),
            _ => {
                self.solve(arg)?;
                return Ok(Value::Bool(true));
            }
        };
        if matches!(key, Value::Unknown | Value::Union(_) | Value::Uninitialized) {
            return Ok(Value::Unknown);
        }
        let key = property_key(&key);
        Ok(match object {
            Value::Object(obj) => {
                obj.remove(&key);
                Value::Bool(true)
            }
            Value::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    if index < items.len() {
                        items.set(index, Value::Undefined);
                    }
                }
                Value::Bool(true)
            }
            Value::Unknown | Value::Union(_) => Value::Unknown,
            _ => Value::Bool(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num<'a>(n: f64) -> Value<'a> {
        Value::Num(n)
    }

    #[test]
    fn unknown_absorbs_before_unions_distribute() {
        let union = Value::union(vec![num(1.0), num(2.0)]);
        assert!(binary(BinaryOp::Add, &union, &Value::Unknown).is_unknown());
        for op in [BinaryOp::Lt, BinaryOp::Nullish, BinaryOp::Or] {
            assert!(binary(op, &Value::Unknown, &union).is_unknown(), "{op:?}");
            assert!(binary(op, &union, &Value::Unknown).is_unknown(), "{op:?}");
            assert!(binary(op, &Value::Null, &Value::Unknown).is_unknown(), "{op:?}");
        }
    }

    #[test]
    fn unions_take_the_cross_product() {
        let left = Value::union(vec![num(1.0), num(2.0)]);
        let right = Value::union(vec![num(10.0), num(20.0)]);
        assert_eq!(
            binary(BinaryOp::Add, &left, &right).to_string(),
            "union(11 | 21 | 12 | 22)"
        );
    }

    #[test]
    fn addition_follows_string_rules() {
        assert_eq!(binary(BinaryOp::Add, &Value::str("a"), &num(1.0)).to_string(), "'a1'");
        assert_eq!(binary(BinaryOp::Add, &Value::Bool(true), &num(1.0)).to_string(), "2");
    }

    #[test]
    fn logical_or_and_nullish() {
        assert_eq!(binary(BinaryOp::Or, &Value::str(""), &num(3.0)).to_string(), "3");
        assert_eq!(binary(BinaryOp::Nullish, &num(0.0), &num(3.0)).to_string(), "0");
        assert_eq!(binary(BinaryOp::Nullish, &Value::Null, &num(3.0)).to_string(), "3");
    }

    #[test]
    fn unmodelled_operators_are_unknown() {
        assert!(binary(BinaryOp::EqEqEq, &num(1.0), &num(1.0)).is_unknown());
        assert!(binary(BinaryOp::And, &num(1.0), &num(1.0)).is_unknown());
        assert!(binary(BinaryOp::Add, &Value::Uninitialized, &num(1.0)).is_unknown());
    }

    #[test]
    fn concat_expands_union_parts() {
        let parts = vec![
            Value::str("x-"),
            Value::union(vec![Value::str("a"), Value::str("b")]),
        ];
        assert_eq!(concat_parts(&parts).to_string(), "union('x-a' | 'x-b')");
    }
}
