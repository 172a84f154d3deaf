pub mod provider;
pub mod read;

pub use provider::{LocalFs, Provider};
pub use read::{read_symlink_target, FileMetadata, FileType};
