//! gitree - git object ids for local directory trees
//!
//! walks a directory the way git would see it and computes the same blob and
//! tree ids git computes, without a repository.
//!
//! # Core concepts
//!
//! - **Tree of nodes**: an arena of named nodes, children listed lazily from
//!   the filesystem the first time they are asked for
//! - **Entry**: the payload of a node; stat data, link target and digest are
//!   read once and cached
//! - **Ignore rules**: `.gitignore` files compiled to regexes and resolved
//!   per directory, plus an implicit rule hiding `.git`
//! - **Symlink policy**: keep links as links, follow them, or keep them but
//!   rewrite in-root targets to relative paths
//!
//! # Hash format
//!
//! blob id = SHA1("blob " | len | NUL | content)
//!
//! tree id = SHA1("tree " | len | NUL | entries...), each entry being
//! `mode " " name NUL raw-id`, sorted by name with '/' appended to directories.
//! empty directories are left out.
//!
//! # Example usage
//!
//! ```no_run
//! use gitree::{open_root, ops, WalkOptions};
//! use std::path::Path;
//!
//! let (mut tree, root) = open_root(Path::new("/path/to/project"), WalkOptions::default()).unwrap();
//! println!("{}", tree.get_hash(root).unwrap());
//!
//! for entry in ops::ls_tree_recursive(&mut tree, root).unwrap() {
//!     println!("{}", entry);
//! }
//! ```

mod config;
mod entry;
mod error;
mod hash;
mod symlink;

pub mod fs;
pub mod ignore;
pub mod node;
pub mod ops;
pub mod types;

pub use config::Config;
pub use entry::{open_root, open_root_with, Entry, LocalSource, LocalTree, WalkOptions};
pub use error::{Error, Result};
pub use hash::{
    compute_blob_hash, compute_object_hash, compute_symlink_hash, Hash, ObjectHasher, EMPTY_TREE,
};
pub use node::NodeId;
pub use symlink::{relative_target, resolve_link, LinkDecision, LinkPolicy, SymlinkPolicy};
pub use types::{EntryKind, Tree, TreeEntry};
