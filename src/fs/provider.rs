use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};
use crate::fs::read::{read_symlink_target, FileMetadata, FileType};

/// everything the engine needs from a filesystem
///
/// paths handed in are always absolute. implementations must not follow
/// symlinks except in `canonicalize` and `is_dir`.
pub trait Provider {
    /// `(name, type)` pairs for a directory, in native listing order
    ///
    /// names are returned exactly as stored, whatever their encoding.
    fn read_dir(&self, path: &Path) -> Result<Vec<(OsString, FileType)>>;

    /// lstat
    fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// raw symlink target
    fn read_link(&self, path: &Path) -> Result<OsString>;

    /// byte stream of a regular file
    fn open(&self, path: &Path) -> Result<Box<dyn Read>>;

    /// fully resolved absolute path
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// does `path` resolve to a directory (follows links, false on error)
    fn is_dir(&self, path: &Path) -> bool;

    /// text of a rule file, `None` when there is no regular file at `path`
    fn read_rules(&self, path: &Path) -> Result<Option<String>>;
}

/// the real filesystem via `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Provider for LocalFs {
    fn read_dir(&self, path: &Path) -> Result<Vec<(OsString, FileType)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path).with_path(path)? {
            let entry = entry.with_path(path)?;
            let file_type = entry.file_type().with_path(entry.path())?;
            out.push((entry.file_name(), FileType::from_std(file_type)));
        }
        Ok(out)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        FileMetadata::from_path(path)
    }

    fn read_link(&self, path: &Path) -> Result<OsString> {
        read_symlink_target(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        let file = File::open(path).with_path(path)?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_path(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_rules(&self, path: &Path) -> Result<Option<String>> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(path).with_path(path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl<P: Provider + ?Sized> Provider for &P {
    fn read_dir(&self, path: &Path) -> Result<Vec<(OsString, FileType)>> {
        (**self).read_dir(path)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        (**self).metadata(path)
    }

    fn read_link(&self, path: &Path) -> Result<OsString> {
        (**self).read_link(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        (**self).open(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        (**self).canonicalize(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn read_rules(&self, path: &Path) -> Result<Option<String>> {
        (**self).read_rules(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_dir_reports_types() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f"), "x").unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        std::os::unix::fs::symlink("f", dir.path().join("l")).unwrap();

        let mut entries = LocalFs.read_dir(dir.path()).unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (OsString::from("d"), FileType::Directory),
                (OsString::from("f"), FileType::Regular),
                (OsString::from("l"), FileType::Symlink),
            ]
        );
    }

    #[test]
    fn test_read_dir_keeps_non_utf8_names() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let dir = tempdir().unwrap();
        let name = std::ffi::OsStr::from_bytes(b"caf\xe9.txt");
        fs::write(dir.path().join(name), "x").unwrap();

        let entries = LocalFs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        let (listed, file_type) = entries.into_iter().next().unwrap();
        assert_eq!(file_type, FileType::Regular);
        assert_eq!(listed.into_vec(), b"caf\xe9.txt");
    }

    #[test]
    fn test_read_rules_absent() {
        let dir = tempdir().unwrap();
        assert_eq!(LocalFs.read_rules(&dir.path().join(".gitignore")).unwrap(), None);

        // a directory named like a rule file is not a rule file
        fs::create_dir(dir.path().join(".gitignore")).unwrap();
        assert_eq!(LocalFs.read_rules(&dir.path().join(".gitignore")).unwrap(), None);
    }

    #[test]
    fn test_open_reads_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "hello").unwrap();

        let mut buf = String::new();
        LocalFs.open(&path).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let dir = tempdir().unwrap();
        let err = LocalFs.metadata(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_io());
    }
}
