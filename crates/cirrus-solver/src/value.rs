//! The solver's value space.
//!
//! Besides the concrete values of the script language there are three
//! analysis-only tags: `Unknown` (statically indeterminate, absorbing),
//! `Uninitialized` (declared but never assigned) and `Union` (one of several
//! alternatives). `Lazy` wraps a memoized initializer; every consumer calls
//! [`Value::force`] before matching on a concrete tag.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cirrus_ast::ast::{Class, Function, Param};
use indexmap::IndexMap;

use crate::error::Result;
use crate::solver::{Site, Solver};

pub type Props<'a> = IndexMap<String, Value<'a>>;

/// Shared, mutable record. Cloning shares the same storage.
#[derive(Clone, Default)]
pub struct Object<'a>(Rc<RefCell<Props<'a>>>);

impl<'a> Object<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_props(props: Props<'a>) -> Self {
        Object(Rc::new(RefCell::new(props)))
    }

    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        self.0.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value<'a>) {
        self.0.borrow_mut().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.0.borrow_mut().shift_remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value<'a>> {
        self.0.borrow().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value<'a>)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Object<'a>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

/// Largest length an array may be padded to by an indexed write.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

/// Shared, mutable sequence.
#[derive(Clone, Default)]
pub struct Array<'a>(Rc<RefCell<Vec<Value<'a>>>>);

impl<'a> Array<'a> {
    pub fn new(items: Vec<Value<'a>>) -> Self {
        Array(Rc::new(RefCell::new(items)))
    }

    pub fn get(&self, index: usize) -> Option<Value<'a>> {
        self.0.borrow().get(index).cloned()
    }

    /// Writes `index`, padding with `undefined` when it lies past the end.
    /// Returns `false`, leaving the array untouched, when the write would
    /// grow it beyond [`MAX_ARRAY_LEN`].
    pub fn set(&self, index: usize, value: Value<'a>) -> bool {
        let mut items = self.0.borrow_mut();
        if index >= MAX_ARRAY_LEN {
            return false;
        }
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        true
    }

    pub fn push(&self, value: Value<'a>) -> usize {
        let mut items = self.0.borrow_mut();
        items.push(value);
        items.len()
    }

    pub fn pop(&self) -> Option<Value<'a>> {
        self.0.borrow_mut().pop()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value<'a>> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &Array<'a>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

type Init<'a> = Box<dyn FnOnce() -> Result<Value<'a>> + 'a>;

enum ThunkState<'a> {
    Pending(Init<'a>),
    Forcing,
    Done(Value<'a>),
}

/// Deferred initializer, run at most once.
#[derive(Clone)]
pub struct Thunk<'a>(Rc<RefCell<ThunkState<'a>>>);

impl<'a> Thunk<'a> {
    pub fn new(init: impl FnOnce() -> Result<Value<'a>> + 'a) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Pending(Box::new(init)))))
    }

    pub fn force(&self) -> Result<Value<'a>> {
        let state = std::mem::replace(&mut *self.0.borrow_mut(), ThunkState::Forcing);
        match state {
            ThunkState::Done(value) => {
                *self.0.borrow_mut() = ThunkState::Done(value.clone());
                Ok(value)
            }
            ThunkState::Forcing => {
                tracing::debug!("lazy binding re-entered while it was being forced");
                Ok(Value::Unknown)
            }
            ThunkState::Pending(init) => {
                let value = init()?.force()?;
                *self.0.borrow_mut() = ThunkState::Done(value.clone());
                Ok(value)
            }
        }
    }

    /// The memoized value, if the initializer already ran.
    pub fn peek(&self) -> Option<Value<'a>> {
        match &*self.0.borrow() {
            ThunkState::Done(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn ptr_eq(&self, other: &Thunk<'a>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Signature shared by every host primitive: solver, call site, receiver, arguments.
pub type HostFn<'a> = dyn Fn(&Solver<'a>, Site, Value<'a>, Vec<Value<'a>>) -> Result<Value<'a>> + 'a;

pub struct HostFunction<'a> {
    pub name: String,
    pub arity: usize,
    pub(crate) call: Box<HostFn<'a>>,
    pub(crate) construct: Option<Box<HostFn<'a>>>,
}

/// Syntax behind an evaluator function.
pub enum FnDef<'a> {
    Function(&'a Function),
    /// A class lowered to a single constructor; `parent` is the evaluated
    /// `extends` clause.
    Class {
        class: &'a Class,
        parent: Option<Value<'a>>,
    },
}

pub struct EvalFunction<'a> {
    pub def: FnDef<'a>,
    pub name: String,
    /// Defining context: scope chain, environment and substitution hook.
    pub(crate) solver: Solver<'a>,
    /// Static members and properties assigned onto the function.
    pub(crate) statics: Object<'a>,
}

impl<'a> EvalFunction<'a> {
    pub fn arity(&self) -> usize {
        match &self.def {
            FnDef::Function(func) => params_arity(&func.params),
            FnDef::Class { class, parent } => match (class.constructor(), parent) {
                (Some(ctor), _) => params_arity(&ctor.params),
                (None, Some(Value::Callable(parent))) => parent.arity(),
                (None, _) => 0,
            },
        }
    }

    /// Literal source text of the function or class.
    pub fn source(&self) -> &'a str {
        let span = match &self.def {
            FnDef::Function(func) => func.span,
            FnDef::Class { class, .. } => class.span,
        };
        self.solver.file().slice(span)
    }
}

fn params_arity(params: &[Param]) -> usize {
    params
        .iter()
        .take_while(|p| !p.rest && p.default.is_none())
        .count()
}

#[derive(Clone)]
pub enum Callable<'a> {
    Function(Rc<EvalFunction<'a>>),
    Host(Rc<HostFunction<'a>>),
}

impl<'a> Callable<'a> {
    pub fn name(&self) -> &str {
        match self {
            Callable::Function(f) => &f.name,
            Callable::Host(h) => &h.name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.arity(),
            Callable::Host(h) => h.arity,
        }
    }

    pub fn ptr_eq(&self, other: &Callable<'a>) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Host(a), Callable::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub enum Value<'a> {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Array<'a>),
    Object(Object<'a>),
    Callable(Callable<'a>),
    /// Not statically knowable.
    Unknown,
    /// Declared without an initializer and not yet assigned.
    Uninitialized,
    /// One of several alternatives, in discovery order.
    Union(Rc<Vec<Value<'a>>>),
    Lazy(Thunk<'a>),
}

impl<'a> Value<'a> {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value<'a>>) -> Self {
        Value::Array(Array::new(items))
    }

    pub fn object(props: Props<'a>) -> Self {
        Value::Object(Object::from_props(props))
    }

    pub fn lazy(init: impl FnOnce() -> Result<Value<'a>> + 'a) -> Self {
        Value::Lazy(Thunk::new(init))
    }

    pub fn host(
        name: &str,
        arity: usize,
        call: impl Fn(&Solver<'a>, Site, Value<'a>, Vec<Value<'a>>) -> Result<Value<'a>> + 'a,
    ) -> Self {
        Value::Callable(Callable::Host(Rc::new(HostFunction {
            name: name.to_string(),
            arity,
            call: Box::new(call),
            construct: None,
        })))
    }

    /// Host primitive that may also be used with `new`.
    pub fn host_class(
        name: &str,
        arity: usize,
        call: impl Fn(&Solver<'a>, Site, Value<'a>, Vec<Value<'a>>) -> Result<Value<'a>> + 'a,
        construct: impl Fn(&Solver<'a>, Site, Value<'a>, Vec<Value<'a>>) -> Result<Value<'a>> + 'a,
    ) -> Self {
        Value::Callable(Callable::Host(Rc::new(HostFunction {
            name: name.to_string(),
            arity,
            call: Box::new(call),
            construct: Some(Box::new(construct)),
        })))
    }

    /// Builds a union, flattening nested unions. A single alternative is
    /// returned as is; no alternatives at all is `Unknown`.
    pub fn union(alts: Vec<Value<'a>>) -> Self {
        let mut flat = Vec::with_capacity(alts.len());
        for alt in alts {
            match alt {
                Value::Union(inner) => flat.extend(inner.iter().cloned()),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Value::Unknown,
            1 => flat.pop().unwrap_or(Value::Unknown),
            _ => Value::Union(Rc::new(flat)),
        }
    }

    /// Collapses thunks, including thunks inside a union, into settled values.
    pub fn force(&self) -> Result<Value<'a>> {
        match self {
            Value::Lazy(thunk) => thunk.force(),
            Value::Union(alts)
                if alts
                    .iter()
                    .any(|a| matches!(a, Value::Lazy(_) | Value::Union(_))) =>
            {
                let mut forced = Vec::with_capacity(alts.len());
                for alt in alts.iter() {
                    forced.push(alt.force()?);
                }
                Ok(Value::union(forced))
            }
            other => Ok(other.clone()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Value::Union(_))
    }

    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Value::Uninitialized)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Alternatives of a union, or the value itself.
    pub fn alternatives(&self) -> Vec<Value<'a>> {
        match self {
            Value::Union(alts) => alts.to_vec(),
            other => vec![other.clone()],
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Uninitialized => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Identity comparison used by the recursion guard: primitives by value,
    /// shared structures by pointer.
    pub fn same(&self, other: &Value<'a>) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined)
            | (Value::Null, Value::Null)
            | (Value::Unknown, Value::Unknown)
            | (Value::Uninitialized, Value::Uninitialized) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            (Value::Union(a), Value::Union(b)) => Rc::ptr_eq(a, b),
            (Value::Lazy(a), Value::Lazy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Result of the `typeof` operator for a settled value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Uninitialized => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Callable(_) => "function",
            Value::Unknown | Value::Union(_) | Value::Lazy(_) => "unknown",
        }
    }

    /// Short description for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Callable(_) => "function",
            Value::Unknown => "unknown value",
            Value::Uninitialized => "uninitialized binding",
            Value::Union(_) => "union",
            Value::Lazy(_) => "lazy binding",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Num(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(a) => string_to_number(&Value::Array(a.clone()).to_js_string()),
            _ => f64::NAN,
        }
    }

    /// String conversion as performed by `+` and template literals.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(a) => a
                .to_vec()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    Value::Array(inner) if inner.ptr_eq(a) => String::new(),
                    v => v.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".into(),
            Value::Callable(Callable::Function(f)) => f.source().to_string(),
            Value::Callable(Callable::Host(h)) => format!("function {}() {{ [native code] }}", h.name),
            other => other.to_string(),
        }
    }

    /// JSON rendering for tooling output. Analysis tags become marker objects.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, seen: &mut Vec<*const ()>) -> serde_json::Value {
        use serde_json::{json, Map};
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Num(n) => number_to_json(*n),
            Value::Str(s) => json!(s),
            Value::Array(a) => {
                if seen.contains(&a.addr()) {
                    return json!({ "$circular": true });
                }
                seen.push(a.addr());
                let items = a.to_vec().iter().map(|v| v.to_json_inner(seen)).collect();
                seen.pop();
                serde_json::Value::Array(items)
            }
            Value::Object(o) => {
                if seen.contains(&o.addr()) {
                    return json!({ "$circular": true });
                }
                seen.push(o.addr());
                let mut map = Map::new();
                for (k, v) in o.entries() {
                    map.insert(k, v.to_json_inner(seen));
                }
                seen.pop();
                serde_json::Value::Object(map)
            }
            Value::Callable(c) => json!({ "$function": c.name(), "arity": c.arity() }),
            Value::Unknown => json!({ "$unknown": true }),
            Value::Uninitialized => json!({ "$uninitialized": true }),
            Value::Union(alts) => {
                let alts: Vec<_> = alts.iter().map(|v| v.to_json_inner(seen)).collect();
                json!({ "$union": alts })
            }
            Value::Lazy(t) => match t.peek() {
                Some(v) => v.to_json_inner(seen),
                None => json!({ "$lazy": true }),
            },
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value<'a> {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Num(n) => write!(f, "{}", format_number(*n)),
        Value::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(a) => {
            if seen.contains(&a.addr()) {
                return write!(f, "[Circular]");
            }
            seen.push(a.addr());
            write!(f, "[")?;
            for (i, item) in a.to_vec().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, item, seen)?;
            }
            seen.pop();
            write!(f, "]")
        }
        Value::Object(o) => {
            if seen.contains(&o.addr()) {
                return write!(f, "[Circular]");
            }
            if o.is_empty() {
                return write!(f, "{{}}");
            }
            seen.push(o.addr());
            write!(f, "{{ ")?;
            for (i, (key, item)) in o.entries().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if is_plain_key(key) {
                    write!(f, "{key}: ")?;
                } else {
                    write!(f, "'{key}': ")?;
                }
                write_value(f, item, seen)?;
            }
            seen.pop();
            write!(f, " }}")
        }
        Value::Callable(c) => {
            let name = if c.name().is_empty() { "anonymous" } else { c.name() };
            write!(f, "<fn {}/{}>", name, c.arity())
        }
        Value::Unknown => write!(f, "<unknown>"),
        Value::Uninitialized => write!(f, "<uninitialized>"),
        Value::Union(alts) => {
            write!(f, "union(")?;
            for (i, alt) in alts.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write_value(f, alt, seen)?;
            }
            write!(f, ")")
        }
        Value::Lazy(t) => match t.peek() {
            Some(v) => write_value(f, &v, seen),
            None => write!(f, "<lazy>"),
        },
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Number-to-string conversion following the script language's formatting
/// for the common cases (integers print without a fraction).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Converts a numeric literal's raw source text.
pub fn parse_number_literal(raw: &str) -> f64 {
    let text: String = raw.chars().filter(|&c| c != '_').collect();
    let text = text.strip_suffix('n').unwrap_or(&text);
    let radix = match text.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => 10,
    };
    if radix == 10 {
        return text.parse().unwrap_or(f64::NAN);
    }
    text[2..].chars().try_fold(0f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
    .unwrap_or(f64::NAN)
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    match s {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.starts_with("0x") || s.starts_with("0o") || s.starts_with("0b") => {
            parse_number_literal(s)
        }
        _ if s.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => {
            s.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}
