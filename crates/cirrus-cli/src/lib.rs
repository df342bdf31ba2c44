//! Library half of the `cirrus` binary: source loading, solver settings and
//! the report renderers behind each subcommand.

pub mod report;

use anyhow::{bail, Context, Result};
use cirrus_ast::SourceFile;
use cirrus_solver::{hooks, SolverOptions, StaticSolver, MAX_CALL_DEPTH};

/// Maximum source file size in bytes (1MB)
pub const MAX_SOURCE_SIZE: usize = 1_000_000;

/// Reads and parses a source file.
pub fn load_source(path: &str) -> Result<SourceFile> {
    let src = std::fs::read_to_string(path).with_context(|| format!("failed to read `{path}`"))?;
    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    cirrus_parse::parse_str(path, &src)
}

/// How solvers are configured for one run.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Leave imported names undeclared instead of resolving them to unknown.
    pub strict_imports: bool,
    pub max_call_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            strict_imports: false,
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

impl Settings {
    pub fn solver<'a>(&self, file: &'a SourceFile) -> StaticSolver<'a> {
        let solver = StaticSolver::with_options(
            file,
            SolverOptions {
                max_call_depth: self.max_call_depth,
            },
        );
        if self.strict_imports {
            solver
        } else {
            solver.with_hook(hooks::unknown_imports(file))
        }
    }
}
