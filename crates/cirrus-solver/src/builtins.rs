//! Host primitives visible to solved code.
//!
//! Globals live in a root [`Env`] below every module scope. Methods of
//! arrays, strings and numbers are host functions that read their receiver
//! from the `this` argument.

use std::f64::consts::PI;

use crate::env::Env;
use crate::error::{DiagnosticKind, Result};
use crate::ops::property_key;
use crate::solver::{Site, Solver};
use crate::value::{format_number, number_to_json, Array, Callable, Object, Props, Value, MAX_ARRAY_LEN};

type HostImpl = for<'a> fn(&Solver<'a>, Site, Value<'a>, Vec<Value<'a>>) -> Result<Value<'a>>;

const OBJECT_FNS: &[(&str, usize, HostImpl)] = &[
    ("keys", 1, object_keys),
    ("values", 1, object_values),
    ("entries", 1, object_entries),
    ("assign", 2, object_assign),
    ("freeze", 1, object_freeze),
    ("fromEntries", 1, object_from_entries),
];

const ARRAY_FNS: &[(&str, usize, HostImpl)] = &[("isArray", 1, array_is_array), ("from", 1, array_from)];

const JSON_FNS: &[(&str, usize, HostImpl)] = &[("stringify", 3, json_stringify), ("parse", 2, json_parse)];

const MATH_FNS: &[(&str, usize, HostImpl)] = &[
    ("max", 2, math_max),
    ("min", 2, math_min),
    ("floor", 1, math_floor),
    ("ceil", 1, math_ceil),
    ("round", 1, math_round),
    ("abs", 1, math_abs),
];

const PROMISE_FNS: &[(&str, usize, HostImpl)] = &[
    ("resolve", 1, pass_through),
    ("all", 1, pass_through),
    ("reject", 1, promise_reject),
];

const CONSOLE_FNS: &[(&str, usize, HostImpl)] = &[
    ("log", 0, console_info),
    ("info", 0, console_info),
    ("warn", 0, console_warn),
    ("error", 0, console_error),
    ("debug", 0, console_debug),
];

const ARRAY_METHODS: &[(&str, usize, HostImpl)] = &[
    ("push", 1, array_push),
    ("pop", 0, array_pop),
    ("join", 1, array_join),
    ("map", 1, array_map),
    ("filter", 1, array_filter),
    ("forEach", 1, array_for_each),
    ("concat", 1, array_concat),
    ("slice", 2, array_slice),
    ("includes", 1, array_includes),
    ("indexOf", 1, array_index_of),
    ("flat", 0, array_flat),
];

const STRING_METHODS: &[(&str, usize, HostImpl)] = &[
    ("toUpperCase", 0, string_to_upper),
    ("toLowerCase", 0, string_to_lower),
    ("trim", 0, string_trim),
    ("split", 2, string_split),
    ("startsWith", 1, string_starts_with),
    ("endsWith", 1, string_ends_with),
    ("includes", 1, string_includes),
    ("slice", 2, string_slice),
    ("replace", 2, string_replace),
    ("padStart", 2, string_pad_start),
];

const NUMBER_METHODS: &[(&str, usize, HostImpl)] = &[("toString", 1, number_to_string), ("toFixed", 1, number_to_fixed)];

const FUNCTION_METHODS: &[(&str, usize, HostImpl)] = &[("call", 1, function_call), ("apply", 2, function_apply)];

/// Binds every global into `env`.
pub(crate) fn install<'a>(env: &Env<'a>) {
    env.declare("Object", namespace(OBJECT_FNS));
    env.declare("Array", namespace(ARRAY_FNS));
    env.declare("JSON", namespace(JSON_FNS));
    let math = Object::new();
    add_fns(&math, MATH_FNS);
    math.insert("PI", Value::Num(PI));
    env.declare("Math", Value::Object(math));
    env.declare("String", Value::host("String", 1, string_ctor));
    env.declare("Number", Value::host("Number", 1, number_ctor));
    env.declare("Boolean", Value::host("Boolean", 1, boolean_ctor));
    env.declare("Error", Value::host_class("Error", 1, error_ctor, error_ctor));
    env.declare("TypeError", Value::host_class("TypeError", 1, type_error_ctor, type_error_ctor));
    env.declare("Promise", namespace(PROMISE_FNS));
    let symbol = Object::new();
    symbol.insert("dispose", Value::str("@@dispose"));
    symbol.insert("asyncDispose", Value::str("@@asyncDispose"));
    symbol.insert("iterator", Value::str("@@iterator"));
    env.declare("Symbol", Value::Object(symbol));
    env.declare("console", namespace(CONSOLE_FNS));
    env.declare("NaN", Value::Num(f64::NAN));
    env.declare("Infinity", Value::Num(f64::INFINITY));
    // The deployment environment is not statically knowable.
    env.declare("process", Value::Unknown);
}

fn namespace<'a>(fns: &[(&str, usize, HostImpl)]) -> Value<'a> {
    let obj = Object::new();
    add_fns(&obj, fns);
    Value::Object(obj)
}

fn add_fns<'a>(obj: &Object<'a>, fns: &[(&str, usize, HostImpl)]) {
    for &(name, arity, f) in fns {
        obj.insert(name, Value::host(name, arity, f));
    }
}

fn lookup<'a>(fns: &[(&str, usize, HostImpl)], key: &str) -> Value<'a> {
    fns.iter()
        .find(|(name, _, _)| *name == key)
        .map_or(Value::Undefined, |&(name, arity, f)| Value::host(name, arity, f))
}

/// Builtin members of records that do not define `key` themselves.
pub(crate) fn object_member<'a>(key: &str) -> Value<'a> {
    match key {
        "hasOwnProperty" => Value::host("hasOwnProperty", 1, object_has_own),
        _ => Value::Undefined,
    }
}

/// Members of a callable: static properties first, then `name` and `length`.
pub(crate) fn callable_member<'a>(callable: &Callable<'a>, key: &str) -> Value<'a> {
    if let Callable::Function(func) = callable {
        if let Some(value) = func.statics.get(key) {
            return value;
        }
    }
    match key {
        "name" => Value::str(callable.name()),
        "length" => Value::Num(callable.arity() as f64),
        _ => lookup(FUNCTION_METHODS, key),
    }
}

/// Members of arrays, strings and numbers.
pub(crate) fn primitive_member<'a>(target: &Value<'a>, key: &str) -> Value<'a> {
    match target {
        Value::Array(items) => {
            if let Ok(index) = key.parse::<usize>() {
                return items.get(index).unwrap_or(Value::Undefined);
            }
            match key {
                "length" => Value::Num(items.len() as f64),
                _ => lookup(ARRAY_METHODS, key),
            }
        }
        Value::Str(s) => {
            if let Ok(index) = key.parse::<usize>() {
                return s.chars().nth(index).map_or(Value::Undefined, |c| Value::Str(c.to_string()));
            }
            match key {
                "length" => Value::Num(s.chars().count() as f64),
                _ => lookup(STRING_METHODS, key),
            }
        }
        Value::Num(_) => lookup(NUMBER_METHODS, key),
        _ => Value::Undefined,
    }
}

fn arg<'a>(args: &[Value<'a>], index: usize) -> Value<'a> {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Not statically settled: the host cannot compute anything from it.
fn opaque(value: &Value<'_>) -> bool {
    matches!(value, Value::Unknown | Value::Union(_) | Value::Uninitialized)
}

// ======= Object =======

fn object_keys<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match arg(&args, 0) {
        Value::Object(obj) => Value::array(obj.keys().into_iter().map(Value::Str).collect()),
        Value::Array(items) => Value::array((0..items.len()).map(|i| Value::Str(i.to_string())).collect()),
        v if opaque(&v) => Value::Unknown,
        _ => Value::array(Vec::new()),
    })
}

fn object_values<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match arg(&args, 0) {
        Value::Object(obj) => {
            let mut values = Vec::with_capacity(obj.len());
            for value in obj.values() {
                values.push(value.force()?);
            }
            Value::array(values)
        }
        Value::Array(items) => Value::array(items.to_vec()),
        v if opaque(&v) => Value::Unknown,
        _ => Value::array(Vec::new()),
    })
}

fn object_entries<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match arg(&args, 0) {
        Value::Object(obj) => {
            let mut entries = Vec::with_capacity(obj.len());
            for (key, value) in obj.entries() {
                entries.push(Value::array(vec![Value::Str(key), value.force()?]));
            }
            Value::array(entries)
        }
        Value::Array(items) => Value::array(
            items
                .to_vec()
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::array(vec![Value::Str(i.to_string()), v]))
                .collect(),
        ),
        v if opaque(&v) => Value::Unknown,
        _ => Value::array(Vec::new()),
    })
}

fn object_assign<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    if args.iter().any(opaque) {
        return Ok(Value::Unknown);
    }
    let target = arg(&args, 0);
    let Value::Object(obj) = &target else {
        return Ok(target);
    };
    for source in args.iter().skip(1) {
        if let Value::Object(source) = source {
            for (key, value) in source.entries() {
                obj.insert(key, value);
            }
        }
    }
    Ok(target)
}

fn object_freeze<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(arg(&args, 0))
}

fn object_from_entries<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Value::Array(entries) = arg(&args, 0) else {
        return Ok(Value::Unknown);
    };
    let mut props = Props::new();
    for entry in entries.to_vec() {
        let Value::Array(pair) = entry else {
            return Ok(Value::Unknown);
        };
        let key = pair.get(0).unwrap_or(Value::Undefined);
        if opaque(&key) {
            return Ok(Value::Unknown);
        }
        props.insert(property_key(&key), pair.get(1).unwrap_or(Value::Undefined));
    }
    Ok(Value::object(props))
}

fn object_has_own<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let key = arg(&args, 0);
    Ok(match this {
        _ if opaque(&key) => Value::Unknown,
        Value::Object(obj) => Value::Bool(obj.contains_key(&property_key(&key))),
        _ => Value::Unknown,
    })
}

// ======= Array =======

fn array_is_array<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match arg(&args, 0) {
        v if opaque(&v) => Value::Unknown,
        v => Value::Bool(matches!(v, Value::Array(_))),
    })
}

fn array_from<'a>(solver: &Solver<'a>, site: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let items = match arg(&args, 0) {
        Value::Array(items) => items.to_vec(),
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        v if opaque(&v) => return Ok(Value::Unknown),
        _ => Vec::new(),
    };
    let Some(map) = args.get(1) else {
        return Ok(Value::array(items));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(solver.call(site, map, Value::Undefined, vec![item, Value::Num(i as f64)])?);
    }
    Ok(Value::array(out))
}

fn receiver_array<'a>(this: &Value<'a>) -> Option<Array<'a>> {
    match this {
        Value::Array(items) => Some(items.clone()),
        _ => None,
    }
}

fn array_push<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let mut len = items.len();
    for value in args {
        len = items.push(value);
    }
    Ok(Value::Num(len as f64))
}

fn array_pop<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(receiver_array(&this).map_or(Value::Unknown, |items| items.pop().unwrap_or(Value::Undefined)))
}

fn array_join<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let items = items.to_vec();
    let sep = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(sep) if opaque(sep) => return Ok(Value::Unknown),
        Some(sep) => sep.to_js_string(),
    };
    if items.iter().any(opaque) {
        return Ok(Value::Unknown);
    }
    let parts: Vec<String> = items
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
        .collect();
    Ok(Value::Str(parts.join(&sep)))
}

/// Calls `callback(item, index, array)` for every element.
fn each<'a>(
    solver: &Solver<'a>,
    site: Site,
    items: &Array<'a>,
    callback: &Value<'a>,
) -> Result<Vec<(Value<'a>, Value<'a>)>> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.to_vec().into_iter().enumerate() {
        let args = vec![item.clone(), Value::Num(i as f64), Value::Array(items.clone())];
        out.push((item, solver.call(site, callback, Value::Undefined, args)?));
    }
    Ok(out)
}

fn array_map<'a>(solver: &Solver<'a>, site: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let results = each(solver, site, &items, &arg(&args, 0))?;
    Ok(Value::array(results.into_iter().map(|(_, r)| r).collect()))
}

fn array_filter<'a>(solver: &Solver<'a>, site: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let results = each(solver, site, &items, &arg(&args, 0))?;
    Ok(Value::array(
        results
            .into_iter()
            .filter(|(_, keep)| opaque(keep) || keep.truthy())
            .map(|(item, _)| item)
            .collect(),
    ))
}

fn array_for_each<'a>(solver: &Solver<'a>, site: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    each(solver, site, &items, &arg(&args, 0))?;
    Ok(Value::Undefined)
}

fn array_concat<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let mut out = items.to_vec();
    for value in args {
        match value {
            Value::Array(more) => out.extend(more.to_vec()),
            other => out.push(other),
        }
    }
    Ok(Value::array(out))
}

/// Resolves `slice(start, end)` arguments against a length.
fn slice_bounds(len: usize, args: &[Value<'_>]) -> Option<(usize, usize)> {
    let resolve = |value: Option<&Value<'_>>, default: usize| match value {
        None | Some(Value::Undefined) => Some(default),
        Some(v) if opaque(v) => None,
        Some(v) => {
            let n = v.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            Some(if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            })
        }
    };
    let start = resolve(args.first(), 0)?;
    let end = resolve(args.get(1), len)?;
    Some((start, end.max(start)))
}

fn array_slice<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let items = items.to_vec();
    Ok(match slice_bounds(items.len(), &args) {
        Some((start, end)) => Value::array(items[start..end].to_vec()),
        None => Value::Unknown,
    })
}

fn position<'a>(this: &Value<'a>, needle: &Value<'a>) -> Option<Option<usize>> {
    let items = receiver_array(this)?.to_vec();
    if opaque(needle) || items.iter().any(opaque) {
        return None;
    }
    Some(items.iter().position(|item| item.same(needle)))
}

fn array_includes<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(position(&this, &arg(&args, 0)).map_or(Value::Unknown, |found| Value::Bool(found.is_some())))
}

fn array_index_of<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(position(&this, &arg(&args, 0)).map_or(Value::Unknown, |found| {
        Value::Num(found.map_or(-1.0, |i| i as f64))
    }))
}

fn array_flat<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(items) = receiver_array(&this) else {
        return Ok(Value::Unknown);
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items.to_vec() {
        match item {
            Value::Array(inner) => out.extend(inner.to_vec()),
            other => out.push(other),
        }
    }
    Ok(Value::array(out))
}

// ======= strings and numbers =======

fn receiver_str(this: &Value<'_>) -> Option<String> {
    match this {
        Value::Str(s) => Some(s.clone()),
        _ => None,
    }
}

fn string_to_upper<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(receiver_str(&this).map_or(Value::Unknown, |s| Value::Str(s.to_uppercase())))
}

fn string_to_lower<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(receiver_str(&this).map_or(Value::Unknown, |s| Value::Str(s.to_lowercase())))
}

fn string_trim<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(receiver_str(&this).map_or(Value::Unknown, |s| Value::str(s.trim())))
}

fn string_split<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(s) = receiver_str(&this) else {
        return Ok(Value::Unknown);
    };
    Ok(match arg(&args, 0) {
        Value::Undefined => Value::array(vec![Value::Str(s)]),
        Value::Str(sep) if sep.is_empty() => Value::array(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Str(sep) => Value::array(s.split(sep.as_str()).map(Value::str).collect()),
        _ => Value::Unknown,
    })
}

/// Applies a string predicate to the receiver and a string argument.
fn string_test<'a>(this: &Value<'a>, args: &[Value<'a>], test: impl Fn(&str, &str) -> bool) -> Value<'a> {
    let needle = arg(args, 0);
    match receiver_str(this) {
        Some(_) if opaque(&needle) => Value::Unknown,
        Some(s) => Value::Bool(test(&s, &needle.to_js_string())),
        None => Value::Unknown,
    }
}

fn string_starts_with<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(string_test(&this, &args, |s, p| s.starts_with(p)))
}

fn string_ends_with<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(string_test(&this, &args, |s, p| s.ends_with(p)))
}

fn string_includes<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(string_test(&this, &args, |s, p| s.contains(p)))
}

fn string_slice<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(s) = receiver_str(&this) else {
        return Ok(Value::Unknown);
    };
    let chars: Vec<char> = s.chars().collect();
    Ok(match slice_bounds(chars.len(), &args) {
        Some((start, end)) => Value::Str(chars[start..end].iter().collect()),
        None => Value::Unknown,
    })
}

/// First-occurrence replacement of a literal pattern. Regular expressions
/// only exist as raw text and are matched literally.
fn string_replace<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(s) = receiver_str(&this) else {
        return Ok(Value::Unknown);
    };
    Ok(match (arg(&args, 0), arg(&args, 1)) {
        (Value::Str(pattern), Value::Str(replacement)) => Value::Str(s.replacen(&pattern, &replacement, 1)),
        _ => Value::Unknown,
    })
}

fn string_pad_start<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let Some(s) = receiver_str(&this) else {
        return Ok(Value::Unknown);
    };
    let (target, fill) = (arg(&args, 0), arg(&args, 1));
    if opaque(&target) || opaque(&fill) {
        return Ok(Value::Unknown);
    }
    let fill = match fill {
        Value::Undefined => " ".to_string(),
        other => other.to_js_string(),
    };
    let len = s.chars().count();
    let target = target.to_number();
    if fill.is_empty() || target.is_nan() || target <= len as f64 {
        return Ok(Value::Str(s));
    }
    if target > MAX_ARRAY_LEN as f64 {
        return Ok(Value::Unknown);
    }
    let pad: String = fill.chars().cycle().take(target as usize - len).collect();
    Ok(Value::Str(pad + &s))
}

fn number_to_string<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match (this, arg(&args, 0)) {
        (Value::Num(n), Value::Undefined) => Value::Str(format_number(n)),
        (Value::Num(n), Value::Num(radix)) if radix == 10.0 => Value::Str(format_number(n)),
        _ => Value::Unknown,
    })
}

fn number_to_fixed<'a>(_: &Solver<'a>, _: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let digits = match arg(&args, 0) {
        Value::Undefined => 0.0,
        Value::Num(d) => d,
        _ => return Ok(Value::Unknown),
    };
    Ok(match this {
        Value::Num(n) if (0.0..=100.0).contains(&digits) => Value::Str(format!("{:.*}", digits as usize, n)),
        _ => Value::Unknown,
    })
}

fn function_call<'a>(solver: &Solver<'a>, site: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let receiver = arg(&args, 0);
    solver.call(site, &this, receiver, args.into_iter().skip(1).collect())
}

fn function_apply<'a>(solver: &Solver<'a>, site: Site, this: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let call_args = match arg(&args, 1) {
        Value::Array(items) => items.to_vec(),
        Value::Undefined | Value::Null => Vec::new(),
        _ => return Ok(Value::Unknown),
    };
    solver.call(site, &this, arg(&args, 0), call_args)
}

// ======= conversions and errors =======

fn string_ctor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match args.first() {
        None => Value::str(""),
        Some(v) if opaque(v) => Value::Unknown,
        Some(v) => Value::Str(v.to_js_string()),
    })
}

fn number_ctor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match args.first() {
        None => Value::Num(0.0),
        Some(v) if opaque(v) => Value::Unknown,
        Some(v) => Value::Num(v.to_number()),
    })
}

fn boolean_ctor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(match arg(&args, 0) {
        v if opaque(&v) => Value::Unknown,
        v => Value::Bool(v.truthy()),
    })
}

fn error_record<'a>(name: &str, args: &[Value<'a>]) -> Value<'a> {
    let message = match arg(args, 0) {
        Value::Undefined => Value::str(""),
        v if opaque(&v) => Value::Unknown,
        v => Value::Str(v.to_js_string()),
    };
    let obj = Object::new();
    obj.insert("name", Value::str(name));
    obj.insert("message", message);
    Value::Object(obj)
}

fn error_ctor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(error_record("Error", &args))
}

fn type_error_ctor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(error_record("TypeError", &args))
}

fn pass_through<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(arg(&args, 0))
}

fn promise_reject<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, _: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(Value::Unknown)
}

// ======= Math =======

fn math_fold<'a>(args: &[Value<'a>], init: f64, f: fn(f64, f64) -> f64) -> Value<'a> {
    if args.iter().any(opaque) {
        return Value::Unknown;
    }
    Value::Num(args.iter().fold(init, |acc, v| {
        let n = v.to_number();
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            f(acc, n)
        }
    }))
}

fn math_unary<'a>(args: &[Value<'a>], f: fn(f64) -> f64) -> Value<'a> {
    match arg(args, 0) {
        v if opaque(&v) => Value::Unknown,
        v => Value::Num(f(v.to_number())),
    }
}

fn math_max<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(math_fold(&args, f64::NEG_INFINITY, f64::max))
}

fn math_min<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(math_fold(&args, f64::INFINITY, f64::min))
}

fn math_floor<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(math_unary(&args, f64::floor))
}

fn math_ceil<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(math_unary(&args, f64::ceil))
}

fn math_round<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    // Halves round towards positive infinity.
    Ok(math_unary(&args, |n| (n + 0.5).floor()))
}

fn math_abs<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    Ok(math_unary(&args, f64::abs))
}

// ======= JSON =======

enum Plain {
    Json(serde_json::Value),
    /// Omitted from records, `null` inside sequences.
    Skip,
    Opaque,
}

fn to_plain(value: &Value<'_>, depth: usize) -> Plain {
    if depth > 64 {
        return Plain::Opaque;
    }
    match value {
        Value::Undefined | Value::Callable(_) => Plain::Skip,
        Value::Null => Plain::Json(serde_json::Value::Null),
        Value::Bool(b) => Plain::Json(serde_json::Value::Bool(*b)),
        Value::Num(n) if n.is_finite() => Plain::Json(number_to_json(*n)),
        Value::Num(_) => Plain::Json(serde_json::Value::Null),
        Value::Str(s) => Plain::Json(serde_json::Value::String(s.clone())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.to_vec() {
                match to_plain(&item, depth + 1) {
                    Plain::Json(json) => out.push(json),
                    Plain::Skip => out.push(serde_json::Value::Null),
                    Plain::Opaque => return Plain::Opaque,
                }
            }
            Plain::Json(serde_json::Value::Array(out))
        }
        Value::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (key, item) in obj.entries() {
                match to_plain(&item, depth + 1) {
                    Plain::Json(json) => {
                        map.insert(key, json);
                    }
                    Plain::Skip => {}
                    Plain::Opaque => return Plain::Opaque,
                }
            }
            Plain::Json(serde_json::Value::Object(map))
        }
        Value::Lazy(thunk) => match thunk.peek() {
            Some(value) => to_plain(&value, depth),
            None => Plain::Opaque,
        },
        Value::Unknown | Value::Uninitialized | Value::Union(_) => Plain::Opaque,
    }
}

fn json_stringify<'a>(solver: &Solver<'a>, site: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    let indent = arg(&args, 2);
    let json = match to_plain(&arg(&args, 0), 0) {
        Plain::Json(json) => json,
        Plain::Skip => return Ok(Value::Undefined),
        Plain::Opaque => return Ok(Value::Unknown),
    };
    if !matches!(arg(&args, 1), Value::Undefined | Value::Null) {
        // Replacer functions are not modelled.
        return Ok(Value::Unknown);
    }
    if !indent.truthy() {
        return Ok(Value::Str(json.to_string()));
    }
    serde_json::to_string_pretty(&json)
        .map(Value::Str)
        .map_err(|e| solver.diag(DiagnosticKind::Host, site.span, format!("JSON.stringify: {e}")))
}

fn json_parse<'a>(solver: &Solver<'a>, site: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    match arg(&args, 0) {
        Value::Str(text) => serde_json::from_str::<serde_json::Value>(&text)
            .map(|json| Value::from_json(&json))
            .map_err(|e| solver.diag(DiagnosticKind::Host, site.span, format!("JSON.parse: {e}"))),
        _ => Ok(Value::Unknown),
    }
}

// ======= console =======

fn render(args: &[Value<'_>]) -> String {
    args.iter()
        .map(|v| match v {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_info<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    tracing::info!(target: "cirrus::console", "{}", render(&args));
    Ok(Value::Undefined)
}

fn console_warn<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    tracing::warn!(target: "cirrus::console", "{}", render(&args));
    Ok(Value::Undefined)
}

fn console_error<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    tracing::error!(target: "cirrus::console", "{}", render(&args));
    Ok(Value::Undefined)
}

fn console_debug<'a>(_: &Solver<'a>, _: Site, _: Value<'a>, args: Vec<Value<'a>>) -> Result<Value<'a>> {
    tracing::debug!(target: "cirrus::console", "{}", render(&args));
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_bounds_follow_negative_indices() {
        let args = [Value::Num(-2.0)];
        assert_eq!(slice_bounds(5, &args), Some((3, 5)));
        let args = [Value::Num(1.0), Value::Num(10.0)];
        assert_eq!(slice_bounds(3, &args), Some((1, 3)));
        assert_eq!(slice_bounds(3, &[Value::Unknown]), None);
    }

    #[test]
    fn json_skips_undefined_fields() {
        let obj = Object::new();
        obj.insert("a", Value::Num(1.0));
        obj.insert("b", Value::Undefined);
        let Plain::Json(json) = to_plain(&Value::Object(obj), 0) else {
            panic!("expected plain json");
        };
        assert_eq!(json.to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn json_of_unknown_is_opaque() {
        let value = Value::array(vec![Value::Num(1.0), Value::Unknown]);
        assert!(matches!(to_plain(&value, 0), Plain::Opaque));
    }

    #[test]
    fn primitive_members() {
        let items = Value::array(vec![Value::str("a"), Value::str("b")]);
        assert_eq!(primitive_member(&items, "length").to_string(), "2");
        assert_eq!(primitive_member(&items, "1").to_string(), "'b'");
        assert_eq!(primitive_member(&Value::str("hey"), "length").to_string(), "3");
        assert!(matches!(primitive_member(&items, "nope"), Value::Undefined));
    }
}
