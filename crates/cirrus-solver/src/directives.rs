//! Compiler directives carried in line comments.
//!
//! A directive is a line comment of the form `//# key = value` or
//! `//@key value`. Statement directives come from the comments directly
//! above a statement; file directives from the comments before the first
//! statement. Block comments never carry directives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use cirrus_ast::ast::Stmt;
use cirrus_ast::{Comment, CommentKind, FileId, NodeKey, SourceFile};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Directives {
    entries: IndexMap<String, String>,
}

impl Directives {
    /// Collects directives from `comments`. `None` when there are none; a
    /// repeated key keeps its last value.
    pub fn parse(comments: &[Comment]) -> Option<Directives> {
        let mut entries = IndexMap::new();
        for comment in comments {
            if comment.kind != CommentKind::Line {
                continue;
            }
            if let Some((key, value)) = parse_line(&comment.text) {
                entries.insert(key, value);
            }
        }
        if entries.is_empty() {
            None
        } else {
            Some(Directives { entries })
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn module_id(&self) -> Option<&str> {
        self.get("moduleId")
    }

    pub fn transform(&self) -> Option<&str> {
        self.get("transform")
    }

    pub fn resource(&self) -> Option<&str> {
        self.get("resource")
    }

    pub fn callable(&self) -> Option<&str> {
        self.get("callable")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(text: &str) -> Option<(String, String)> {
    let body = text.strip_prefix("//")?;
    if let Some(rest) = body.strip_prefix('#') {
        let (key, value) = rest.split_once('=')?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        return Some((key.to_string(), value.trim().to_string()));
    }
    let rest = body.strip_prefix('@')?;
    let (key, value) = match rest.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (rest.trim(), ""),
    };
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    File(FileId),
    Node(NodeKey),
}

/// Memoized directive lookups, safe to share between threads. A miss is
/// cached too.
#[derive(Debug, Default)]
pub struct DirectiveCache {
    entries: Mutex<HashMap<CacheKey, Option<Arc<Directives>>>>,
}

impl DirectiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directives attached to `stmt`, a statement of `file`.
    pub fn directives_for(&self, file: &SourceFile, stmt: &Stmt) -> Option<Arc<Directives>> {
        self.lookup(CacheKey::Node(file.key(stmt.id)), || {
            Directives::parse(&stmt.leading_comments)
        })
    }

    /// Directives in the file's header comments.
    pub fn file_directives(&self, file: &SourceFile) -> Option<Arc<Directives>> {
        self.lookup(CacheKey::File(file.id), || Directives::parse(&file.header_comments))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: CacheKey, parse: impl FnOnce() -> Option<Directives>) -> Option<Arc<Directives>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key)
            .or_insert_with(|| parse().map(Arc::new))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_ast::Span;

    fn line(text: &str) -> Comment {
        Comment {
            kind: CommentKind::Line,
            text: text.to_string(),
            span: Span::new(0, text.len() as u32),
        }
    }

    #[test]
    fn both_syntaxes() {
        let d = Directives::parse(&[line("//# moduleId = api"), line("//@transform  zip ")]).unwrap();
        assert_eq!(d.module_id(), Some("api"));
        assert_eq!(d.transform(), Some("zip"));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn plain_comments_are_not_directives() {
        assert!(Directives::parse(&[line("// moduleId = api"), line("//#")]).is_none());
    }

    #[test]
    fn block_comments_are_ignored() {
        let block = Comment {
            kind: CommentKind::Block,
            text: "/*# resource = bucket */".to_string(),
            span: Span::new(0, 10),
        };
        assert!(Directives::parse(&[block]).is_none());
    }

    #[test]
    fn last_value_wins() {
        let d = Directives::parse(&[line("//# callable = a"), line("//# callable = b")]).unwrap();
        assert_eq!(d.callable(), Some("b"));
    }

    #[test]
    fn flag_without_value() {
        let d = Directives::parse(&[line("//@resource")]).unwrap();
        assert_eq!(d.resource(), Some(""));
    }
}
