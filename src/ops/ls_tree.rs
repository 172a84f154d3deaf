use std::fmt;

use crate::entry::LocalTree;
use crate::error::{Error, Result};
use crate::fs::Provider;
use crate::hash::Hash;
use crate::node::NodeId;
use crate::types::EntryKind;

/// one walked entry as the upload side sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsTreeEntry {
    /// path relative to the listed directory; empty for the directory itself
    pub path: String,
    pub node: NodeId,
    pub kind: EntryKind,
    pub hash: Hash,
    /// content length, link target length or encoded tree length
    pub size: u64,
}

impl LsTreeEntry {
    fn new<P: Provider>(tree: &mut LocalTree<P>, node: NodeId, path: String) -> Result<Self> {
        let kind = tree.entry_kind(node)?;
        let hash = tree.get_hash(node)?;
        let size = match kind {
            EntryKind::Directory => tree.tree_size(node)?,
            EntryKind::Gitlink => 0,
            _ => tree.size(node)?,
        };
        Ok(Self {
            path,
            node,
            kind,
            hash,
            size,
        })
    }
}

/// list the direct children of `dir`
///
/// special files have no object form and are not listed.
pub fn ls_tree<P: Provider>(tree: &mut LocalTree<P>, dir: NodeId) -> Result<Vec<LsTreeEntry>> {
    let mut entries = Vec::new();
    for child in tree.child_ids(dir)? {
        let path = tree.name(child).to_string();
        if let Some(entry) = listed(tree, child, path)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// list everything below `dir` in pre-order, then `dir` itself
pub fn ls_tree_recursive<P: Provider>(
    tree: &mut LocalTree<P>,
    dir: NodeId,
) -> Result<Vec<LsTreeEntry>> {
    let mut entries = Vec::new();
    for node in tree.descendants(dir)? {
        let path = tree.relative_path(node, dir)?;
        if let Some(entry) = listed(tree, node, path)? {
            entries.push(entry);
        }
    }
    entries.push(LsTreeEntry::new(tree, dir, String::new())?);
    Ok(entries)
}

fn listed<P: Provider>(
    tree: &mut LocalTree<P>,
    node: NodeId,
    path: String,
) -> Result<Option<LsTreeEntry>> {
    match LsTreeEntry::new(tree, node, path) {
        Ok(entry) => Ok(Some(entry)),
        Err(Error::Unsupported { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// four-letter name of a mode for human output
pub fn mode_name(kind: &EntryKind) -> &'static str {
    match kind {
        EntryKind::Regular { executable: false } => "blob",
        EntryKind::Regular { executable: true } => "exec",
        EntryKind::Directory => "tree",
        EntryKind::Symlink => "syml",
        EntryKind::Gitlink => "comm",
    }
}

impl fmt::Display for LsTreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "." } else { &self.path };
        write!(
            f,
            "{} {} {}\t{}",
            self.kind.mode(),
            self.hash,
            self.size,
            path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{open_root, WalkOptions};
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn options() -> WalkOptions {
        WalkOptions {
            ancestor_ignore: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_ls_tree_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file.txt"), "content").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        fs::write(dir.path().join("subdir/nested.txt"), "nested").unwrap();

        let (mut tree, root) = open_root(dir.path(), options()).unwrap();
        let mut entries = ls_tree(&mut tree, root).unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "file.txt");
        assert_eq!(entries[0].size, 7);
        assert_eq!(mode_name(&entries[0].kind), "blob");
        assert_eq!(entries[1].path, "subdir");
        assert_eq!(mode_name(&entries[1].kind), "tree");
        // "100644 nested.txt\0" + 20 id bytes
        assert_eq!(entries[1].size, 38);
    }

    #[test]
    fn test_ls_tree_recursive_root_last() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), "c").unwrap();
        symlink("a/b/c.txt", dir.path().join("l")).unwrap();

        let (mut tree, root) = open_root(dir.path(), options()).unwrap();
        let entries = ls_tree_recursive(&mut tree, root).unwrap();
        let mut paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();

        let last = paths.pop().unwrap();
        assert_eq!(last, "");
        assert_eq!(entries.last().unwrap().hash, tree.get_hash(root).unwrap());

        // parents come before their children
        let pos = |p: &str| paths.iter().position(|x| *x == p).unwrap();
        assert!(pos("a") < pos("a/b"));
        assert!(pos("a/b") < pos("a/b/c.txt"));

        let link = entries.iter().find(|e| e.path == "l").unwrap();
        assert_eq!(mode_name(&link.kind), "syml");
        assert_eq!(link.size, "a/b/c.txt".len() as u64);
    }

    #[test]
    fn test_ls_tree_skips_special_files() {
        let dir = tempdir().unwrap();
        nix::unistd::mkfifo(
            &dir.path().join("pipe"),
            nix::sys::stat::Mode::from_bits_truncate(0o644),
        )
        .unwrap();
        fs::write(dir.path().join("f"), "f").unwrap();

        let (mut tree, root) = open_root(dir.path(), options()).unwrap();
        let entries = ls_tree(&mut tree, root).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "f");
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(mode_name(&EntryKind::Regular { executable: true }), "exec");
        assert_eq!(mode_name(&EntryKind::Gitlink), "comm");
    }
}
