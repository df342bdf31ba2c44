//! Renderers for the solve, invoke, instance and directives commands.
//!
//! Each returns the full text to print so the integration tests can check
//! output without spawning the binary.

use anyhow::{anyhow, Context, Result};
use cirrus_ast::SourceFile;
use cirrus_solver::{DirectiveCache, Directives, Instance, Props, Value};
use clap::ValueEnum;
use serde::Serialize;

use crate::Settings;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Solves the module and lists every export as `name = value`.
pub fn solve(file: &SourceFile, settings: &Settings, output: Output) -> Result<String> {
    let solver = settings.solver(file);
    let module = solver.solve_module()?;
    let exports = module.exported()?;
    match output {
        Output::Text => Ok(exports
            .iter()
            .map(|(name, value)| format!("{name} = {value}\n"))
            .collect()),
        Output::Json => {
            let map: serde_json::Map<String, serde_json::Value> = exports
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();
            Ok(serde_json::to_string_pretty(&map)? + "\n")
        }
    }
}

/// Calls a top-level function with JSON arguments.
pub fn invoke(
    file: &SourceFile,
    settings: &Settings,
    function: &str,
    args: &[String],
    output: Output,
) -> Result<String> {
    let func = file
        .find_function(function)
        .ok_or_else(|| anyhow!("no top-level function `{function}` in {}", file.name))?;
    let args = parse_args(args)?;
    let solver = settings.solver(file);
    let result = solver.invoke(func, Value::Undefined, args)?;
    render(&result, output)
}

/// Constructs a top-level class with JSON arguments and prints the instance.
pub fn instance(
    file: &SourceFile,
    settings: &Settings,
    class: &str,
    args: &[String],
    output: Output,
) -> Result<String> {
    let decl = file
        .find_class(class)
        .ok_or_else(|| anyhow!("no top-level class `{class}` in {}", file.name))?;
    let args = parse_args(args)?;
    let solver = settings.solver(file);
    let instance = solver.create_instance(decl, args)?;
    render(&settled(&instance)?, output)
}

#[derive(Serialize)]
struct DirectiveReport {
    file: Option<Directives>,
    statements: Vec<StatementDirectives>,
}

#[derive(Serialize)]
struct StatementDirectives {
    line: u32,
    kind: &'static str,
    directives: Directives,
}

/// Directives of the file header and of each top-level statement.
pub fn directives(file: &SourceFile, cache: &DirectiveCache, output: Output) -> Result<String> {
    let header = cache.file_directives(file).map(|d| (*d).clone());
    let mut statements = Vec::new();
    for (i, stmt) in file.stmts.iter().enumerate() {
        // The first statement's leading comments are the file header.
        if i == 0 && header.is_some() {
            continue;
        }
        if let Some(found) = cache.directives_for(file, stmt) {
            let (line, _) = file.line_col(stmt.span.start);
            statements.push(StatementDirectives {
                line,
                kind: stmt.kind.name(),
                directives: (*found).clone(),
            });
        }
    }
    let report = DirectiveReport {
        file: header,
        statements,
    };
    match output {
        Output::Json => Ok(serde_json::to_string_pretty(&report)? + "\n"),
        Output::Text => {
            let mut out = String::new();
            if let Some(header) = &report.file {
                out.push_str(&format!("{}: {}\n", file.name, entries(header)));
            }
            for stmt in &report.statements {
                out.push_str(&format!(
                    "{}:{} {}: {}\n",
                    file.name,
                    stmt.line,
                    stmt.kind,
                    entries(&stmt.directives)
                ));
            }
            Ok(out)
        }
    }
}

fn entries(directives: &Directives) -> String {
    directives
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_args<'a>(args: &[String]) -> Result<Vec<Value<'a>>> {
    args.iter()
        .map(|raw| {
            let json: serde_json::Value =
                serde_json::from_str(raw).with_context(|| format!("argument `{raw}` is not valid JSON"))?;
            Ok(Value::from_json(&json))
        })
        .collect()
}

/// The instance record with accessors read through.
fn settled<'a>(instance: &Instance<'a>) -> Result<Value<'a>> {
    let Value::Object(record) = instance.value() else {
        return Ok(instance.value().clone());
    };
    let mut props = Props::new();
    for key in record.keys() {
        let value = instance.get(&key)?;
        props.insert(key, value);
    }
    Ok(Value::object(props))
}

fn render(value: &Value<'_>, output: Output) -> Result<String> {
    match output {
        Output::Text => Ok(format!("{value}\n")),
        Output::Json => Ok(serde_json::to_string_pretty(&value.to_json())? + "\n"),
    }
}
