//! Fatal diagnostics raised while solving.
//!
//! Unknown values and the recursion guard are not errors; everything here
//! aborts the enclosing top-level solve and is reported to the user.

use cirrus_ast::{SourceFile, Span};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Syntax the solver has no model for (`~x`, unsupported assignment targets).
    NotImplemented,
    NotCallable,
    NotAConstructor,
    MalformedPattern,
    UndeclaredIdentifier,
    /// The substitution hook handed back the node it was asked about.
    RecursiveSubstitution,
    /// Property write on a primitive.
    NotAnObject,
    MissingDispose,
    /// Raised by a host primitive (`JSON.parse` on bad input, ...).
    Host,
}

#[derive(Debug, Clone, Error)]
#[error("{file}:{line}:{col}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    pub line: u32,
    pub col: u32,
    pub file: String,
}

impl Diagnostic {
    pub fn new(file: &SourceFile, kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        let (line, col) = file.line_col(span.start);
        Diagnostic {
            kind,
            message: message.into(),
            span,
            line,
            col,
            file: file.name.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Diagnostic>;
