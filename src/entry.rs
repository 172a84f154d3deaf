//! filesystem-backed tree nodes
//!
//! an [`Entry`] is the payload of one node: a backing path plus attributes
//! that are read from the filesystem on first use and cached forever after.
//! [`LocalSource`] lists directories for the lazy tree, applying the symlink
//! policy and the ignore rules before any child is exposed.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{FileMetadata, FileType, LocalFs, Provider};
use crate::hash::{compute_object_hash, compute_symlink_hash, Hash, ObjectHasher};
use crate::ignore::{is_ignored, Filter, IgnoreContext, Layer, RuleFiles, Subject};
use crate::node::{NodeId, Nodes, Source, Tree};
use crate::symlink::{resolve_link, LinkDecision, SymlinkPolicy};
use crate::types::{self, EntryKind, TreeEntry};

/// raw mode used for directories that exist only in the tree
const SYNTHETIC_DIR_MODE: u32 = 0o040755;
/// raw mode used for sub-repository placeholders
const GITLINK_MODE: u32 = 0o160000;

/// knobs for one walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    pub links: SymlinkPolicy,
    /// honor per-directory rule files and the implicit metadata rule
    pub gitignore: bool,
    /// also honor rule files above the walk root
    pub ancestor_ignore: bool,
    /// exclude regular files larger than this many bytes
    pub max_size: Option<u64>,
    pub rule_files: RuleFiles,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            links: SymlinkPolicy::default(),
            gitignore: true,
            ancestor_ignore: true,
            max_size: None,
            rule_files: RuleFiles::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Disk,
    /// directory with no backing path; children are only ever appended
    Synthetic,
    /// sub-repository whose commit id is known up front
    Gitlink,
}

/// payload of one node
#[derive(Debug)]
pub struct Entry {
    path: PathBuf,
    origin: Origin,
    /// name as listed on disk, byte for byte
    file_name: Option<OsString>,
    meta: OnceCell<FileMetadata>,
    target: OnceCell<OsString>,
    hash: OnceCell<Hash>,
    tree_size: OnceCell<u64>,
    ignore: OnceCell<IgnoreContext>,
}

impl Entry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: Origin::Disk,
            file_name: None,
            meta: OnceCell::new(),
            target: OnceCell::new(),
            hash: OnceCell::new(),
            tree_size: OnceCell::new(),
            ignore: OnceCell::new(),
        }
    }

    /// a symlink recorded with `target` instead of what is on disk
    pub fn with_target(path: impl Into<PathBuf>, target: impl Into<OsString>) -> Self {
        let entry = Self::new(path);
        let _ = entry.target.set(target.into());
        entry
    }

    /// an empty directory that does not exist on disk
    pub fn synthetic_dir(path: impl Into<PathBuf>) -> Self {
        let mut entry = Self::new(path);
        entry.origin = Origin::Synthetic;
        let _ = entry.meta.set(FileMetadata {
            mode: SYNTHETIC_DIR_MODE,
            size: 0,
            mtime: 0,
            mtime_nsec: 0,
        });
        entry
    }

    /// a sub-repository placeholder pinned to `commit`
    pub fn gitlink(path: impl Into<PathBuf>, commit: Hash) -> Self {
        let mut entry = Self::new(path);
        entry.origin = Origin::Gitlink;
        let _ = entry.meta.set(FileMetadata {
            mode: GITLINK_MODE,
            size: 0,
            mtime: 0,
            mtime_nsec: 0,
        });
        let _ = entry.hash.set(commit);
        entry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_gitlink(&self) -> bool {
        self.origin == Origin::Gitlink
    }

    /// the raw name this entry was listed under, if it came from a listing
    pub fn file_name(&self) -> Option<&OsStr> {
        self.file_name.as_deref()
    }

    /// lstat, once
    pub fn metadata(&self, provider: &dyn Provider) -> Result<&FileMetadata> {
        self.meta.get_or_try_init(|| provider.metadata(&self.path))
    }

    pub fn file_type(&self, provider: &dyn Provider) -> Result<FileType> {
        Ok(self.metadata(provider)?.file_type())
    }

    /// link target as it will be hashed
    pub fn target(&self, provider: &dyn Provider) -> Result<&OsStr> {
        self.target
            .get_or_try_init(|| provider.read_link(&self.path))
            .map(OsString::as_os_str)
    }

    /// digest if it has been computed already
    pub fn cached_hash(&self) -> Option<Hash> {
        self.hash.get().copied()
    }
}

/// an entry seen through a provider, for the ignore resolver
struct EntryView<'a> {
    entry: &'a Entry,
    provider: &'a dyn Provider,
}

impl Subject for EntryView<'_> {
    fn is_dir(&self) -> Result<bool> {
        Ok(self.entry.file_type(self.provider)? == FileType::Directory)
    }

    fn file_size(&self) -> Result<Option<u64>> {
        let meta = self.entry.metadata(self.provider)?;
        Ok((meta.file_type() == FileType::Regular).then_some(meta.size))
    }
}

/// lists real directories for the lazy tree
pub struct LocalSource<P = LocalFs> {
    provider: P,
    options: WalkOptions,
    /// canonical walk root
    root: PathBuf,
    /// ancestor-scope rules plus the size limit, matched on absolute paths
    global: IgnoreContext,
}

impl<P: Provider> LocalSource<P> {
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// the ignore context of a directory entry, loaded once
    fn context<'a>(&self, entry: &'a Entry) -> Result<&'a IgnoreContext> {
        entry.ignore.get_or_try_init(|| {
            if self.options.gitignore && entry.origin == Origin::Disk {
                IgnoreContext::load(&self.provider, &entry.path, &self.options.rule_files, None)
            } else {
                Ok(IgnoreContext::default())
            }
        })
    }

    /// entry for a listed child, with the symlink policy applied
    ///
    /// `chain` holds the backing paths of the listed directory and all of
    /// its ancestors, followed targets included.
    fn candidate(&self, path: PathBuf, file_type: FileType, chain: &[&Path]) -> Entry {
        if file_type != FileType::Symlink {
            return Entry::new(path);
        }
        match resolve_link(&self.provider, &path, &self.root, &self.options.links, chain) {
            LinkDecision::Keep => Entry::new(path),
            LinkDecision::Rewrite(target) => Entry::with_target(path, target),
            LinkDecision::Follow(target) => Entry::new(target),
        }
    }
}

impl<P: Provider> Source for LocalSource<P> {
    type Data = Entry;

    fn list(&self, nodes: &Nodes<Entry>, parent: NodeId) -> Result<Vec<(String, Entry)>> {
        let dir = nodes.data(parent);
        if dir.origin != Origin::Disk || dir.file_type(&self.provider)? != FileType::Directory {
            return Ok(Vec::new());
        }

        // every non-empty context from `parent` up, with the prefix that turns
        // a child name into a path relative to that context's directory
        let top = nodes.root(parent);
        let up = if parent == top {
            Vec::new()
        } else {
            nodes.relative_names(parent, top)?
        };
        let mut scopes: Vec<(&IgnoreContext, String)> = Vec::new();
        let mut prefix = String::new();
        for (depth, id) in nodes.self_and_ancestors(parent).enumerate() {
            let ctx = self.context(nodes.data(id))?;
            if !ctx.is_empty() {
                scopes.push((ctx, prefix.clone()));
            }
            if let Some(name) = up.get(depth) {
                prefix = format!("{}/{}", name, prefix);
            }
        }
        let absolute = format!("{}/{}", self.root.to_string_lossy().trim_end_matches('/'), prefix);
        let filtering = !scopes.is_empty() || !self.global.is_empty();
        let chain: Vec<&Path> = nodes
            .self_and_ancestors(parent)
            .map(|id| nodes.data(id).path())
            .collect();

        let mut out = Vec::new();
        for (raw, file_type) in self.provider.read_dir(&dir.path)? {
            let name = raw.to_string_lossy().into_owned();
            let mut entry = self.candidate(dir.path.join(&raw), file_type, &chain);
            entry.file_name = Some(raw);
            if filtering {
                let mut layers: Vec<Layer<'_>> = scopes
                    .iter()
                    .map(|(context, prefix)| Layer {
                        context: *context,
                        path: format!("{}{}", prefix, name),
                    })
                    .collect();
                if !self.global.is_empty() {
                    layers.push(Layer {
                        context: &self.global,
                        path: format!("{}{}", absolute, name),
                    });
                }
                let view = EntryView {
                    entry: &entry,
                    provider: &self.provider,
                };
                if is_ignored(&layers, &view)? {
                    continue;
                }
            }
            out.push((name, entry));
        }
        debug!(dir = %dir.path.display(), children = out.len(), "listed");
        Ok(out)
    }
}

/// a lazily walked directory tree on a filesystem
pub type LocalTree<P = LocalFs> = Tree<LocalSource<P>>;

/// start a walk of the local directory at `path`
pub fn open_root(path: &Path, options: WalkOptions) -> Result<(LocalTree, NodeId)> {
    open_root_with(LocalFs, path, options)
}

/// start a walk of `path` through `provider`
///
/// the root is resolved to its canonical path first; ancestor rule files are
/// read here, once, for the whole walk.
pub fn open_root_with<P: Provider>(
    provider: P,
    path: &Path,
    options: WalkOptions,
) -> Result<(LocalTree<P>, NodeId)> {
    let root = provider.canonicalize(path)?;
    if !provider.is_dir(&root) {
        return Err(Error::NotADirectory(path.display().to_string()));
    }

    let mut global = IgnoreContext::default();
    if let Some(limit) = options.max_size {
        global.excludes.push(Filter::MaxSize(limit));
    }
    if options.gitignore && options.ancestor_ignore {
        let scope = IgnoreContext::ancestor_scope(&provider, &root, &options.rule_files)?;
        global.excludes.extend(scope.excludes);
        global.includes.extend(scope.includes);
    }

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ROOT".to_string());
    info!(root = %root.display(), "opening tree");

    let source = LocalSource {
        provider,
        options,
        root: root.clone(),
        global,
    };
    let mut tree = Tree::new(source);
    let id = tree.add_root(name, Entry::new(root))?;
    Ok((tree, id))
}

impl<P: Provider> Tree<LocalSource<P>> {
    fn fs(&self) -> &dyn Provider {
        &self.source().provider
    }

    fn meta(&self, id: NodeId) -> Result<&FileMetadata> {
        self.data(id).metadata(self.fs())
    }

    pub fn file_type(&self, id: NodeId) -> Result<FileType> {
        Ok(self.meta(id)?.file_type())
    }

    pub fn is_dir(&self, id: NodeId) -> Result<bool> {
        Ok(self.file_type(id)? == FileType::Directory)
    }

    pub fn is_file(&self, id: NodeId) -> Result<bool> {
        Ok(self.file_type(id)? == FileType::Regular)
    }

    pub fn is_symlink(&self, id: NodeId) -> Result<bool> {
        Ok(self.file_type(id)? == FileType::Symlink)
    }

    /// raw `st_mode`
    pub fn mode(&self, id: NodeId) -> Result<u32> {
        Ok(self.meta(id)?.mode)
    }

    pub fn perm(&self, id: NodeId) -> Result<u32> {
        Ok(self.meta(id)?.perm())
    }

    /// modification time in seconds
    pub fn mtime(&self, id: NodeId) -> Result<i64> {
        Ok(self.meta(id)?.mtime)
    }

    /// byte size; a symlink's size is the length of its recorded target
    pub fn size(&self, id: NodeId) -> Result<u64> {
        match self.file_type(id)? {
            FileType::Directory => Err(Error::Unsupported {
                op: "size",
                kind: FileType::Directory.type_name(),
            }),
            FileType::Symlink => Ok(self.target(id)?.as_bytes().len() as u64),
            FileType::Regular | FileType::Other => Ok(self.meta(id)?.size),
        }
    }

    /// target of a symlink node
    pub fn target(&self, id: NodeId) -> Result<&OsStr> {
        match self.file_type(id)? {
            FileType::Symlink => self.data(id).target(self.fs()),
            other => Err(Error::Unsupported {
                op: "target",
                kind: other.type_name(),
            }),
        }
    }

    /// tree-entry kind, i.e. the git mode
    pub fn entry_kind(&self, id: NodeId) -> Result<EntryKind> {
        if self.data(id).is_gitlink() {
            return Ok(EntryKind::Gitlink);
        }
        match self.file_type(id)? {
            FileType::Directory => Ok(EntryKind::Directory),
            FileType::Symlink => Ok(EntryKind::Symlink),
            FileType::Regular => Ok(EntryKind::regular(self.perm(id)?)),
            FileType::Other => Err(Error::Unsupported {
                op: "mode",
                kind: FileType::Other.type_name(),
            }),
        }
    }

    /// byte stream of a regular file
    pub fn open(&self, id: NodeId) -> Result<Box<dyn Read>> {
        match self.file_type(id)? {
            FileType::Regular => self.fs().open(self.data(id).path()),
            other => Err(Error::Unsupported {
                op: "open",
                kind: other.type_name(),
            }),
        }
    }

    /// content digest, computed once and cached on the node
    pub fn get_hash(&mut self, id: NodeId) -> Result<Hash> {
        if let Some(hash) = self.data(id).cached_hash() {
            return Ok(hash);
        }
        let hash = match self.file_type(id)? {
            FileType::Regular => self.blob_hash(id)?,
            FileType::Symlink => compute_symlink_hash(self.target(id)?),
            FileType::Directory => {
                let body = self.build_tree(id)?.encode();
                let _ = self.data(id).tree_size.set(body.len() as u64);
                compute_object_hash("tree", &body)
            }
            FileType::Other => {
                return Err(Error::Unsupported {
                    op: "hash",
                    kind: FileType::Other.type_name(),
                })
            }
        };
        Ok(*self.data(id).hash.get_or_init(|| hash))
    }

    /// length of a directory's encoded tree body
    pub fn tree_size(&mut self, id: NodeId) -> Result<u64> {
        if !self.is_dir(id)? {
            return Err(Error::NotADirectory(self.path(id, "/")));
        }
        self.get_hash(id)?;
        self.data(id)
            .tree_size
            .get()
            .copied()
            .ok_or_else(|| Error::Internal(format!("no tree size for {}", self.path(id, "/"))))
    }

    /// the tree object for a directory node
    ///
    /// empty subdirectories are left out, so emptiness propagates upwards.
    /// special files have no object form and are skipped.
    pub fn build_tree(&mut self, id: NodeId) -> Result<types::Tree> {
        let mut entries = Vec::new();
        for child in self.child_ids(id)? {
            let kind = match self.entry_kind(child) {
                Ok(kind) => kind,
                Err(Error::Unsupported { .. }) => {
                    debug!(path = %self.path(child, "/"), "skipping special file");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let hash = self.get_hash(child)?;
            if kind.is_directory() && hash.is_empty_tree() {
                info!(path = %self.path(child, "/"), "omitting empty directory");
                continue;
            }
            let name = match self.data(child).file_name() {
                Some(raw) => raw.to_os_string(),
                None => OsString::from(self.name(child)),
            };
            entries.push(TreeEntry::new(name, kind, hash));
        }
        types::Tree::new(entries)
    }

    fn blob_hash(&self, id: NodeId) -> Result<Hash> {
        let path = self.data(id).path();
        let size = self.meta(id)?.size;
        let mut reader = self.fs().open(path)?;
        let mut hasher = ObjectHasher::blob(size);
        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).with_path(path),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        if total != size {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, "file changed while hashing"),
            });
        }
        Ok(hasher.finalize())
    }

    /// descend by name, requiring the result to be a directory
    pub fn get_sub_dir<N: AsRef<str>>(&mut self, id: NodeId, names: &[N]) -> Result<Option<NodeId>> {
        match self.get_sub(id, names)? {
            Some(found) if !self.is_dir(found)? => Err(Error::NotADirectory(self.path(found, "/"))),
            other => Ok(other),
        }
    }

    /// descend by name, creating directories that are missing
    ///
    /// created nodes are synthetic: they never list anything from disk.
    pub fn get_sub_dir_or_intern<N: AsRef<str>>(&mut self, id: NodeId, names: &[N]) -> Result<NodeId> {
        let mut cur = id;
        for name in names {
            let name = name.as_ref();
            let path = self.data(cur).path().join(name);
            cur = self.intern(cur, name, || Entry::synthetic_dir(path))?;
            if !self.is_dir(cur)? {
                return Err(Error::NotADirectory(self.path(cur, "/")));
            }
        }
        Ok(cur)
    }
}
