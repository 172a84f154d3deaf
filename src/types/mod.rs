mod tree;

pub use tree::{EntryKind, Tree, TreeEntry};
