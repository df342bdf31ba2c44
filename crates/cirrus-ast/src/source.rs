//! Parsed source files: text, top-level statements, comments and the
//! offset -> line/column table used by diagnostics.

use serde::Serialize;

use crate::ast::{Class, ExprKind, Function, Stmt, StmtKind};
use crate::ids::{FileId, NodeId, NodeKey};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentKind {
    Line,
    Block,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub kind: CommentKind,
    /// Full comment text including the `//` or `/* */` delimiters.
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Serialize)]
pub struct SourceFile {
    pub id: FileId,
    pub name: String,
    #[serde(skip)]
    pub text: String,
    pub stmts: Vec<Stmt>,
    /// Comments before the first token of the file.
    pub header_comments: Vec<Comment>,
    pub span: Span,
    #[serde(skip)]
    line_starts: Vec<u32>,
    #[serde(skip)]
    node_count: u32,
}

impl SourceFile {
    pub fn new(
        id: FileId,
        name: impl Into<String>,
        text: impl Into<String>,
        stmts: Vec<Stmt>,
        header_comments: Vec<Comment>,
        node_count: u32,
    ) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        let span = Span::new(0, text.len() as u32);
        Self {
            id,
            name: name.into(),
            text,
            stmts,
            header_comments,
            span,
            line_starts,
            node_count,
        }
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col + 1)
    }

    pub fn slice(&self, span: Span) -> &str {
        let end = (span.end as usize).min(self.text.len());
        let start = (span.start as usize).min(end);
        &self.text[start..end]
    }

    pub fn key(&self, node: NodeId) -> NodeKey {
        NodeKey {
            file: self.id,
            node,
        }
    }

    /// Number of node ids handed out while parsing this file.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Top-level class declaration (exported or not) with the given name.
    pub fn find_class(&self, name: &str) -> Option<&Class> {
        self.stmts.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Class(c) if c.name.as_ref().is_some_and(|n| n.name == name) => Some(&**c),
            StmtKind::ExportDefault(e) => match &e.kind {
                ExprKind::Class(c) if c.name.as_ref().is_some_and(|n| n.name == name) => {
                    Some(&**c)
                }
                _ => None,
            },
            _ => None,
        })
    }

    /// Top-level function declaration with the given name.
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.stmts.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Function(f) if f.name.as_ref().is_some_and(|n| n.name == name) => {
                Some(&**f)
            }
            StmtKind::ExportDefault(e) => match &e.kind {
                ExprKind::Function(f) if f.name.as_ref().is_some_and(|n| n.name == name) => {
                    Some(&**f)
                }
                _ => None,
            },
            _ => None,
        })
    }

    /// Local names introduced by `import` declarations.
    pub fn imported_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for stmt in &self.stmts {
            if let StmtKind::Import(decl) = &stmt.kind {
                for spec in &decl.specifiers {
                    names.push(spec.local.name.as_str());
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_based() {
        let file = SourceFile::new(FileId(0), "<mem>", "ab\ncd\n", vec![], vec![], 0);
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(1), (1, 2));
        assert_eq!(file.line_col(3), (2, 1));
        assert_eq!(file.line_col(4), (2, 2));
    }

    #[test]
    fn slice_clamps_out_of_range_spans() {
        let file = SourceFile::new(FileId(0), "<mem>", "hello", vec![], vec![], 0);
        assert_eq!(file.slice(Span::new(1, 3)), "el");
        assert_eq!(file.slice(Span::new(3, 99)), "lo");
    }
}
