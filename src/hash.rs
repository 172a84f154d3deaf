use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;

use crate::Error;

/// SHA-1 object id, as used by git for blobs and trees
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 20]);

/// id of the tree with no entries (`tree 0\0`)
pub const EMPTY_TREE: Hash = Hash([
    0x4b, 0x82, 0x5d, 0xc6, 0x42, 0xcb, 0x6e, 0xb9, 0xa0, 0x60, 0xe5, 0x4b, 0xf8, 0xd6, 0x92, 0x88,
    0xfb, 0xee, 0x49, 0x04,
]);

impl Hash {
    /// zero hash (useful as sentinel)
    pub const ZERO: Hash = Hash([0u8; 20]);

    /// create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// parse from hex string
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(Error::InvalidHashHex(s.to_string()));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// get raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// is this the id of the empty tree
    pub fn is_empty_tree(&self) -> bool {
        *self == EMPTY_TREE
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..12])
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// hash a complete git object: `<kind> <len>\0<content>`
pub fn compute_object_hash(kind: &str, content: &[u8]) -> Hash {
    let mut hasher = ObjectHasher::new(kind, content.len() as u64);
    hasher.update(content);
    hasher.finalize()
}

/// compute blob hash over file content
pub fn compute_blob_hash(content: &[u8]) -> Hash {
    compute_object_hash("blob", content)
}

/// compute hash for symlink (the raw target bytes are the blob content)
pub fn compute_symlink_hash(target: impl AsRef<OsStr>) -> Hash {
    compute_blob_hash(target.as_ref().as_bytes())
}

/// streaming hasher for objects whose length is known up front
///
/// the header is written on construction, so the caller must feed exactly
/// `len` bytes before finalizing or the id will not match git's.
pub struct ObjectHasher {
    hasher: Sha1,
}

impl ObjectHasher {
    /// create new hasher, writing the `<kind> <len>\0` header immediately
    pub fn new(kind: &str, len: u64) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(len.to_string().as_bytes());
        hasher.update(b"\0");
        Self { hasher }
    }

    /// streaming blob hasher for large files
    pub fn blob(len: u64) -> Self {
        Self::new("blob", len)
    }

    /// feed content bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// finalize and return hash
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}
