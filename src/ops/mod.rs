//! high-level operations on walked trees

mod ls_tree;

pub use ls_tree::{ls_tree, ls_tree_recursive, mode_name, LsTreeEntry};
