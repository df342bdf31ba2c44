#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

//! Symbolic evaluation of cirrus programs.
//!
//! [`StaticSolver`] runs a parsed file's top level and answers questions
//! about it without executing anything external: what a binding evaluates
//! to, what an instance of a class looks like, what a function returns.
//! Whatever cannot be known statically becomes [`Value::Unknown`].

mod builtins;
mod call;
pub mod directives;
mod env;
mod error;
pub mod hooks;
mod ops;
mod pattern;
mod solver;
mod static_solver;
mod stmt;
mod value;

pub use directives::{DirectiveCache, Directives};
pub use env::{Env, FnRecord};
pub use error::{Diagnostic, DiagnosticKind, Result};
pub use solver::{Site, Solver, SolverOptions, Substitution, SubstitutionHook, MAX_CALL_DEPTH};
pub use static_solver::{Instance, ModuleScope, StaticSolver};
pub use stmt::Completion;
pub use value::{
    format_number, Array, Callable, EvalFunction, FnDef, HostFunction, Object, Props, Thunk, Value,
};
