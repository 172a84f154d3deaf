use std::path::PathBuf;

/// error type for gitree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid entry name: {0}")]
    InvalidEntryName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("{op} not supported for {kind} entries")]
    Unsupported {
        op: &'static str,
        kind: &'static str,
    },

    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(String),

    #[error("{}: line {line}: invalid ignore pattern {text:?}: {message}", source_label(.source_file))]
    Pattern {
        source_file: Option<PathBuf>,
        line: usize,
        text: String,
        message: String,
    },

    #[error("invalid symlink policy: {0}")]
    InvalidPolicy(String),

    #[error("internal tree invariant violated: {0}")]
    Internal(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),
}

fn source_label(source_file: &Option<PathBuf>) -> String {
    match source_file {
        Some(path) => path.display().to_string(),
        None => "<pattern>".to_string(),
    }
}

impl Error {
    /// true for failures caused by the filesystem rather than by the caller
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_error_names_file_and_line() {
        let err = Error::Pattern {
            source_file: Some(PathBuf::from("/src/.gitignore")),
            line: 3,
            text: "!".to_string(),
            message: "negation with empty pattern".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/src/.gitignore"));
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.with_path("/missing").unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("/missing"));
    }
}
