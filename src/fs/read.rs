use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::libc::mode_t;
use nix::sys::stat::{Mode, SFlag};

use crate::error::{IoResultExt, Result};

/// file type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    /// devices, fifos, sockets: listed but never hashed
    Other,
}

impl FileType {
    /// classify raw `st_mode` bits
    pub fn from_mode(mode: u32) -> Self {
        let fmt = SFlag::from_bits_truncate(mode as mode_t) & SFlag::S_IFMT;
        if fmt == SFlag::S_IFREG {
            FileType::Regular
        } else if fmt == SFlag::S_IFDIR {
            FileType::Directory
        } else if fmt == SFlag::S_IFLNK {
            FileType::Symlink
        } else {
            FileType::Other
        }
    }

    /// detect file type from metadata
    pub fn from_std(ft: fs::FileType) -> Self {
        if ft.is_file() {
            FileType::Regular
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::Other
        }
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FileType::Regular => "regular",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
            FileType::Other => "special",
        }
    }
}

/// the stat fields the engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// raw `st_mode`, type and permission bits
    pub mode: u32,
    pub size: u64,
    /// modification time, seconds since the epoch
    pub mtime: i64,
    pub mtime_nsec: i64,
}

impl FileMetadata {
    /// read metadata from path (does not follow symlinks)
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).with_path(path)?;
        Ok(Self::from_std_metadata(&meta))
    }

    /// create from std::fs::Metadata
    pub fn from_std_metadata(meta: &Metadata) -> Self {
        Self {
            mode: meta.mode(),
            size: meta.len(),
            mtime: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    /// permission bits (including setuid/setgid/sticky)
    pub fn perm(&self) -> u32 {
        Mode::from_bits_truncate(self.mode as mode_t).bits() as u32
    }

    /// any of the user/group/other execute bits set
    pub fn is_executable(&self) -> bool {
        let exec = Mode::S_IXUSR | Mode::S_IXGRP | Mode::S_IXOTH;
        Mode::from_bits_truncate(self.mode as mode_t).intersects(exec)
    }
}

/// read symlink target, byte for byte
pub fn read_symlink_target(path: &Path) -> Result<OsString> {
    let target = fs::read_link(path).with_path(path)?;
    Ok(target.into_os_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use tempfile::tempdir;

    #[test]
    fn test_file_type_regular() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();

        let meta = FileMetadata::from_path(&path).unwrap();
        assert_eq!(meta.file_type(), FileType::Regular);
        assert_eq!(meta.size, 7);
    }

    #[test]
    fn test_file_type_directory() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let meta = FileMetadata::from_path(&subdir).unwrap();
        assert_eq!(meta.file_type(), FileType::Directory);
    }

    #[test]
    fn test_file_type_symlink_not_followed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        fs::write(&target, "content").unwrap();
        symlink(&target, &link).unwrap();

        let meta = FileMetadata::from_path(&link).unwrap();
        assert_eq!(meta.file_type(), FileType::Symlink);
    }

    #[test]
    fn test_mode_classification() {
        assert_eq!(FileType::from_mode(0o100644), FileType::Regular);
        assert_eq!(FileType::from_mode(0o040755), FileType::Directory);
        assert_eq!(FileType::from_mode(0o120777), FileType::Symlink);
        assert_eq!(FileType::from_mode(0o010644), FileType::Other);
    }

    #[test]
    fn test_perm_and_executable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "#!/bin/sh\n").unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let meta = FileMetadata::from_path(&path).unwrap();
        assert_eq!(meta.perm() & 0o777, 0o644);
        assert!(!meta.is_executable());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();
        let meta = FileMetadata::from_path(&path).unwrap();
        assert!(meta.is_executable());
    }

    #[test]
    fn test_read_symlink_target() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink("/some/target/path", &link).unwrap();

        let target = read_symlink_target(&link).unwrap();
        assert_eq!(target, "/some/target/path");
    }

    #[test]
    fn test_read_symlink_target_keeps_raw_bytes() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink(std::ffi::OsStr::from_bytes(b"t\xff"), &link).unwrap();

        let target = read_symlink_target(&link).unwrap();
        assert_eq!(target.into_vec(), b"t\xff");
    }
}
