use std::cmp::Ordering;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::{compute_object_hash, Hash};

/// a directory tree - collection of entries in git order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating and sorting entries
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by(|a, b| git_order(a, b));

        // a directory and a file of the same name need not be adjacent
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.name.as_os_str()) {
                return Err(Error::InvalidEntryName(format!(
                    "duplicate name: {}",
                    entry.name.to_string_lossy()
                )));
            }
        }

        Ok(Self { entries })
    }

    /// create an empty tree
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&TreeEntry> {
        let name = name.as_ref();
        self.entries.iter().find(|e| e.name.as_os_str() == name)
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// git tree body: `<mode> <name>\0<20 raw id bytes>` per entry, no header
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 40);
        for entry in &self.entries {
            out.extend_from_slice(entry.kind.mode().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.hash.as_bytes());
        }
        out
    }

    /// object id of the encoded tree
    pub fn hash(&self) -> Hash {
        compute_object_hash("tree", &self.encode())
    }
}

/// git sorts directories as if their name had a trailing '/'
fn git_order(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// validate an entry name
fn validate_entry_name(name: &OsStr) -> Result<()> {
    let bytes = name.as_bytes();
    let shown = name.to_string_lossy();
    if bytes.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if bytes.contains(&b'/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            shown
        )));
    }
    if bytes.contains(&0) {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            shown
        )));
    }
    if bytes == b"." || bytes == b".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", shown)));
    }
    Ok(())
}

/// a single entry in a tree
///
/// the name is kept as the filesystem stored it and encoded byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: OsString,
    pub kind: EntryKind,
    pub hash: Hash,
}

impl TreeEntry {
    pub fn new(name: impl Into<OsString>, kind: EntryKind, hash: Hash) -> Self {
        Self {
            name: name.into(),
            kind,
            hash,
        }
    }

    /// name bytes with '/' appended for directories
    pub fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.kind.is_directory() {
            key.push(b'/');
        }
        key
    }
}

/// kind of tree entry, one per git mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// regular file
    Regular { executable: bool },

    /// symbolic link
    Symlink,

    /// directory
    Directory,

    /// commit of a nested repository
    Gitlink,
}

impl EntryKind {
    /// git mode string as written in tree objects
    pub fn mode(&self) -> &'static str {
        match self {
            EntryKind::Directory => "40000",
            EntryKind::Symlink => "120000",
            EntryKind::Gitlink => "160000",
            EntryKind::Regular { executable: true } => "100755",
            EntryKind::Regular { executable: false } => "100644",
        }
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Regular { .. } => "regular",
            EntryKind::Symlink => "symlink",
            EntryKind::Directory => "directory",
            EntryKind::Gitlink => "gitlink",
        }
    }

    /// is this a directory entry
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// regular file entry from unix permission bits
    pub fn regular(perm: u32) -> Self {
        EntryKind::Regular {
            executable: perm & 0o111 != 0,
        }
    }
}
