pub mod span {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            Self { start, end }
        }

        /// Span covering `self` through the end of `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start,
                end: other.end,
            }
        }
    }
}

pub mod ids {
    use serde::Serialize;

    /// Identity of a node inside one `SourceFile`, assigned in parse order.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct NodeId(pub u32);

    /// Identity of a parsed file, unique for the lifetime of the process.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct FileId(pub u32);

    /// Process-wide node identity, suitable as a cache key across files.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct NodeKey {
        pub file: FileId,
        pub node: NodeId,
    }
}

pub mod ast;
pub mod source;

pub use ids::{FileId, NodeId, NodeKey};
pub use source::{Comment, CommentKind, SourceFile};
pub use span::Span;
