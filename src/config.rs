use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::WalkOptions;
use crate::error::{IoResultExt, Result};
use crate::ignore::RuleFiles;
use crate::symlink::{LinkPolicy, SymlinkPolicy};

/// walk configuration stored in a toml file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// policy for links that point at files
    pub file_links: LinkPolicy,
    /// policy for links that point at directories
    pub dir_links: LinkPolicy,
    pub gitignore: bool,
    pub ancestor_ignore: bool,
    /// size limit for regular files in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    pub ignore_file: String,
    pub metadata_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        let files = RuleFiles::default();
        Self {
            file_links: LinkPolicy::Keep,
            dir_links: LinkPolicy::Keep,
            gitignore: true,
            ancestor_ignore: true,
            max_size: None,
            ignore_file: files.ignore_file,
            metadata_dir: files.metadata_dir,
        }
    }
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    pub fn to_options(&self) -> WalkOptions {
        WalkOptions {
            links: SymlinkPolicy::new(self.file_links, self.dir_links),
            gitignore: self.gitignore,
            ancestor_ignore: self.ancestor_ignore,
            max_size: self.max_size,
            rule_files: RuleFiles {
                ignore_file: self.ignore_file.clone(),
                metadata_dir: self.metadata_dir.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config {
            file_links: LinkPolicy::Safe,
            dir_links: LinkPolicy::Follow,
            gitignore: false,
            ancestor_ignore: false,
            max_size: Some(1 << 20),
            ignore_file: ".ignore".to_string(),
            metadata_dir: ".hg".to_string(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str("dir_links = \"safe\"\n").unwrap();
        assert_eq!(config.dir_links, LinkPolicy::Safe);
        assert_eq!(config.file_links, LinkPolicy::Keep);
        assert!(config.gitignore);
        assert!(config.max_size.is_none());
        assert_eq!(config.to_options(), WalkOptions {
            links: SymlinkPolicy::new(LinkPolicy::Keep, LinkPolicy::Safe),
            ..WalkOptions::default()
        });
    }

    #[test]
    fn test_config_rejects_unknown_policy() {
        assert!(toml::from_str::<Config>("file_links = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gitree.toml");
        let config = Config {
            max_size: Some(4096),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        assert!(Config::load(&dir.path().join("missing.toml")).unwrap_err().is_io());
    }
}
