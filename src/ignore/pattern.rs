//! gitignore line -> anchored regex
//!
//! every glob construct maps to one fixed regex fragment, left to right.

use std::fmt;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

/// one compiled ignore rule
#[derive(Debug, Clone)]
pub struct PatternUnit {
    regex: Regex,
    dir_only: bool,
    glob: String,
}

impl PatternUnit {
    /// does this rule apply to `path` (relative or absolute, '/'-separated)
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        (!self.dir_only || is_dir) && self.regex.is_match(path)
    }

    pub fn dir_only(&self) -> bool {
        self.dir_only
    }

    /// the glob text after marker stripping
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// the regex the glob was translated to
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for PatternUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dir_only { "Dir" } else { "Path" };
        write!(f, "{}<{}>", kind, self.glob)
    }
}

/// a compiled line: include (negated) or exclude
#[derive(Debug, Clone)]
pub struct Rule {
    pub negated: bool,
    pub unit: PatternUnit,
}

/// compile one non-blank, non-comment rule line
///
/// `base` anchors leading-'/' patterns to an absolute directory; without it
/// they are anchored to the start of the matched path.
pub fn compile_line(line: &str, base: Option<&str>) -> Result<Rule> {
    let mut line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Err(Error::InvalidPattern("empty or comment line".to_string()));
    }

    let negated = line.starts_with('!');
    if negated {
        line = line[1..].trim();
        if line.is_empty() {
            return Err(Error::InvalidPattern(
                "negation with empty pattern".to_string(),
            ));
        }
    }

    let dir_only = line.ends_with('/');
    if dir_only {
        line = &line[..line.len() - 1];
    }

    // collapse trailing whitespace to exactly one space
    let mut glob = line.to_string();
    if glob.ends_with(' ') {
        glob.truncate(glob.trim_end().len());
        glob.push(' ');
    }

    let regex = match glob.strip_prefix('/') {
        Some(rest) => match base {
            Some(base) => format!(
                "^{}/{}$",
                regex::escape(base.trim_end_matches('/')),
                translate(rest)
            ),
            None => format!("^{}$", translate(rest)),
        },
        None => format!("(?:^|/){}$", translate(&glob)),
    };

    let regex = Regex::new(&regex)
        .map_err(|e| Error::InvalidPattern(format!("{:?}: {}", glob, e)))?;

    Ok(Rule {
        negated,
        unit: PatternUnit {
            regex,
            dir_only,
            glob,
        },
    })
}

/// compile a whole rule file, skipping blank and comment lines
///
/// all-or-nothing: the first bad line fails the file.
pub fn parse_rules(text: &str, base: Option<&str>, source_file: Option<&Path>) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rule = compile_line(line, base).map_err(|e| Error::Pattern {
            source_file: source_file.map(Path::to_path_buf),
            line: idx + 1,
            text: line.to_string(),
            message: match e {
                Error::InvalidPattern(msg) => msg,
                other => other.to_string(),
            },
        })?;
        debug!(
            negated = rule.negated,
            dir_only = rule.unit.dir_only,
            regex = rule.unit.pattern(),
            "compiled ignore rule"
        );
        rules.push(rule);
    }
    Ok(rules)
}

/// glob syntax -> regex fragment, left to right
fn translate(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < n {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                if i < n && chars[i] == '*' {
                    i += 1;
                    if i < n && chars[i] == '/' {
                        i += 1;
                        out.push_str("(?:/[^/]+)*");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }
                if j >= n {
                    // unterminated class is a literal '['
                    out.push_str("\\[");
                } else {
                    out.push('[');
                    out.push_str(&translate_class(&chars[i..j]));
                    out.push(']');
                    i = j + 1;
                }
            }
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out
}

/// body of a `[...]` class; a leading '!' negates
fn translate_class(body: &[char]) -> String {
    let mut out = String::with_capacity(body.len() * 2);
    for (k, c) in body.iter().enumerate() {
        match c {
            '!' if k == 0 => out.push('^'),
            // ']' '.' '^' '$' '-' are always literal; '[' '&' '~' would start
            // nested classes or set operations in the regex engine
            ']' | '.' | '^' | '$' | '-' | '[' | '&' | '~' => {
                out.push('\\');
                out.push(*c);
            }
            other => out.push(*other),
        }
    }
    out
}
