//! gitignore-style filtering of directory listings

pub mod filter;
pub mod pattern;

pub use filter::{is_ignored, Filter, IgnoreContext, Layer, RuleFiles, Subject};
pub use pattern::{compile_line, parse_rules, PatternUnit, Rule};
