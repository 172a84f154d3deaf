//! how symlinks found during a walk are represented
//!
//! `keep` hashes the link itself, `follow` swaps in the resolved target and
//! `safe` keeps the link but rewrites in-root targets to a relative form so the
//! tree stays valid when relocated. any resolution failure degrades to `keep`.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::fs::Provider;

/// per-kind symlink handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LinkPolicy {
    #[default]
    Keep,
    Follow,
    Safe,
}

impl FromStr for LinkPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(LinkPolicy::Keep),
            "follow" => Ok(LinkPolicy::Follow),
            "safe" => Ok(LinkPolicy::Safe),
            other => Err(Error::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for LinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkPolicy::Keep => "keep",
            LinkPolicy::Follow => "follow",
            LinkPolicy::Safe => "safe",
        })
    }
}

/// policies for links to files and links to directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymlinkPolicy {
    pub file: LinkPolicy,
    pub dir: LinkPolicy,
}

impl SymlinkPolicy {
    pub fn new(file: LinkPolicy, dir: LinkPolicy) -> Self {
        Self { file, dir }
    }

    pub fn for_target(&self, is_dir: bool) -> LinkPolicy {
        if is_dir {
            self.dir
        } else {
            self.file
        }
    }
}

/// what to put in the tree for one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// the link itself, with its on-disk target
    Keep,
    /// the link itself, recorded with this target instead
    Rewrite(OsString),
    /// the resolved target, under the link's name
    Follow(PathBuf),
}

/// decide how `link` is represented in a walk rooted at canonical `root`
///
/// `chain` lists the canonical directories the walk is currently inside,
/// nearest first. a directory link whose target contains any of them is kept.
pub fn resolve_link(
    provider: &dyn Provider,
    link: &Path,
    root: &Path,
    policy: &SymlinkPolicy,
    chain: &[&Path],
) -> LinkDecision {
    let is_dir = provider.is_dir(link);
    match policy.for_target(is_dir) {
        LinkPolicy::Keep => LinkDecision::Keep,
        LinkPolicy::Follow => follow(provider, link, is_dir, chain),
        LinkPolicy::Safe => safe(provider, link, root),
    }
}

fn follow(provider: &dyn Provider, link: &Path, is_dir: bool, chain: &[&Path]) -> LinkDecision {
    let target = match provider.canonicalize(link) {
        Ok(target) => target,
        Err(e) => {
            warn!(link = %link.display(), error = %e, "cannot resolve symlink, keeping it");
            return LinkDecision::Keep;
        }
    };
    if is_dir {
        // a link to its own directory or an ancestor would recurse forever
        match canonical_location(provider, link) {
            Some(location) if location.parent().is_some_and(|dir| dir.starts_with(&target)) => {
                info!(link = %link.display(), target = %target.display(), "symlink loop, keeping it");
                return LinkDecision::Keep;
            }
            Some(_) => {}
            None => return LinkDecision::Keep,
        }
        // mutual links loop through directories walked earlier
        if let Some(dir) = chain.iter().find(|dir| dir.starts_with(&target)) {
            info!(
                link = %link.display(),
                target = %target.display(),
                walked = %dir.display(),
                "symlink leads back into the walk, keeping it"
            );
            return LinkDecision::Keep;
        }
    }
    info!(link = %link.display(), target = %target.display(), "following symlink");
    LinkDecision::Follow(target)
}

fn safe(provider: &dyn Provider, link: &Path, root: &Path) -> LinkDecision {
    let Ok(target) = provider.canonicalize(link) else {
        warn!(link = %link.display(), "cannot resolve symlink, keeping it");
        return LinkDecision::Keep;
    };
    if !target.starts_with(root) {
        info!(link = %link.display(), target = %target.display(), "symlink escapes root, keeping it");
        return LinkDecision::Keep;
    }
    let Some(location) = canonical_location(provider, link) else {
        return LinkDecision::Keep;
    };
    let relative = relative_target(&target, &location);
    match provider.read_link(link) {
        Ok(current) if current == relative => {
            info!(link = %link.display(), target = %current.to_string_lossy(), "symlink already relative");
            LinkDecision::Keep
        }
        Ok(current) => {
            info!(
                link = %link.display(),
                from = %current.to_string_lossy(),
                to = %relative.to_string_lossy(),
                "rewriting symlink"
            );
            LinkDecision::Rewrite(relative)
        }
        Err(_) => LinkDecision::Keep,
    }
}

/// the link's own path with its parent directory resolved
fn canonical_location(provider: &dyn Provider, link: &Path) -> Option<PathBuf> {
    let name = link.file_name()?;
    let parent = provider.canonicalize(link.parent()?).ok()?;
    Some(parent.join(name))
}

/// path from the directory containing `link` to `target`, '/'-separated
///
/// both paths must be absolute and free of `.`/`..`/symlink components.
/// component bytes are carried over unchanged.
pub fn relative_target(target: &Path, link: &Path) -> OsString {
    let from: Vec<Component<'_>> = link
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let to: Vec<Component<'_>> = target.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = std::iter::repeat(OsStr::new("..")).take(from.len() - common);
    let downs = to[common..].iter().map(|c| c.as_os_str());

    let mut out = OsString::new();
    for part in ups.chain(downs) {
        if !out.is_empty() {
            out.push("/");
        }
        out.push(part);
    }
    if out.is_empty() {
        out.push(".");
    }
    out
}
