//! per-directory exclude/include chains and the two-phase resolver
//!
//! a candidate is excluded when some exclude unit matches it (the first one
//! found, nearest directory first) and no include unit anywhere in the chain
//! of contexts matches it. this differs from git's "last matching line wins":
//! an include in any scope overrides an exclude in any scope.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::fs::Provider;
use crate::ignore::pattern::{compile_line, parse_rules, PatternUnit};

/// what the resolver needs to know about a candidate entry
pub trait Subject {
    fn is_dir(&self) -> Result<bool>;

    /// size of a regular file, `None` for anything else
    fn file_size(&self) -> Result<Option<u64>>;
}

/// one unit of a chain
#[derive(Debug, Clone)]
pub enum Filter {
    Pattern(PatternUnit),
    /// excludes regular files larger than the limit
    MaxSize(u64),
}

impl Filter {
    pub fn matches(&self, subject: &dyn Subject, path: &str) -> Result<bool> {
        match self {
            Filter::Pattern(unit) => {
                if unit.dir_only() && !subject.is_dir()? {
                    return Ok(false);
                }
                Ok(unit.matches(path, true))
            }
            Filter::MaxSize(limit) => Ok(subject.file_size()?.is_some_and(|size| size > *limit)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Pattern(unit) => fmt::Display::fmt(unit, f),
            Filter::MaxSize(limit) => write!(f, "MaxSize<{}>", limit),
        }
    }
}

/// compiled filter state of one directory
#[derive(Debug, Clone, Default)]
pub struct IgnoreContext {
    /// exclude units in file order
    pub excludes: Vec<Filter>,
    /// negated (include) units in file order
    pub includes: Vec<Filter>,
}

/// names the engine looks for in every directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFiles {
    /// per-directory rule file, e.g. `.gitignore`
    pub ignore_file: String,
    /// implicitly excluded metadata directory, e.g. `.git`
    pub metadata_dir: String,
}

impl Default for RuleFiles {
    fn default() -> Self {
        Self {
            ignore_file: ".gitignore".to_string(),
            metadata_dir: ".git".to_string(),
        }
    }
}

impl IgnoreContext {
    pub fn is_empty(&self) -> bool {
        self.excludes.is_empty() && self.includes.is_empty()
    }

    /// read `dir`'s rule file and check for its metadata directory
    ///
    /// `base` anchors leading-'/' rules to an absolute directory; pass it for
    /// contexts matched against absolute paths.
    pub fn load(
        provider: &dyn Provider,
        dir: &Path,
        files: &RuleFiles,
        base: Option<&str>,
    ) -> Result<Self> {
        let mut ctx = IgnoreContext::default();

        let rule_path = dir.join(&files.ignore_file);
        if let Some(text) = provider.read_rules(&rule_path)? {
            for rule in parse_rules(&text, base, Some(&rule_path))? {
                if rule.negated {
                    ctx.includes.push(Filter::Pattern(rule.unit));
                } else {
                    ctx.excludes.push(Filter::Pattern(rule.unit));
                }
            }
        }

        if provider.is_dir(&dir.join(&files.metadata_dir)) {
            let implicit = compile_line(&format!("/{}/", files.metadata_dir), base)?;
            ctx.excludes.push(Filter::Pattern(implicit.unit));
        }

        if !ctx.is_empty() {
            debug!(
                dir = %dir.display(),
                excludes = ctx.excludes.len(),
                includes = ctx.includes.len(),
                "ignore context"
            );
        }
        Ok(ctx)
    }

    /// rules inherited from every directory above `root`, matched against
    /// absolute paths
    pub fn ancestor_scope(provider: &dyn Provider, root: &Path, files: &RuleFiles) -> Result<Self> {
        let mut scope = IgnoreContext::default();
        for dir in root.ancestors().skip(1) {
            let base = dir.to_string_lossy();
            let ctx = IgnoreContext::load(provider, dir, files, Some(base.as_ref()))?;
            scope.excludes.extend(ctx.excludes);
            scope.includes.extend(ctx.includes);
        }
        Ok(scope)
    }
}

/// a context paired with the candidate's path as that context sees it
pub struct Layer<'a> {
    pub context: &'a IgnoreContext,
    pub path: String,
}

/// two-phase resolution over `layers`, nearest context first
pub fn is_ignored(layers: &[Layer<'_>], subject: &dyn Subject) -> Result<bool> {
    let Some((rule, path)) = first_exclude(layers, subject)? else {
        return Ok(false);
    };

    for layer in layers {
        for include in &layer.context.includes {
            if include.matches(subject, &layer.path)? {
                debug!(path = %path, exclude = %rule, include = %include, "include overrides exclude");
                return Ok(false);
            }
        }
    }

    debug!(path = %path, rule = %rule, "excluded");
    Ok(true)
}

fn first_exclude<'a>(
    layers: &'a [Layer<'a>],
    subject: &dyn Subject,
) -> Result<Option<(&'a Filter, &'a str)>> {
    for layer in layers {
        for exclude in &layer.context.excludes {
            if exclude.matches(subject, &layer.path)? {
                return Ok(Some((exclude, &layer.path)));
            }
        }
    }
    Ok(None)
}
