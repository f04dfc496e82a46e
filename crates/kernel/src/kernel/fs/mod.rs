// kernel/src/kernel/fs/mod.rs
//! File management layer
//!
//! Three tables cooperate to turn a descriptor into bytes:
//!
//! - [`fd_table::FileDescriptorTable`]: per process, slot -> open-file id
//! - [`open_file::OpenFileTable`]: shared by all processes, open-file id ->
//!   cursor, mode and the object being accessed (file, console or pipe end)
//! - the [`FileSystem`] collaborator: file id -> bytes, path -> file id
//!
//! The physical file system is out of scope; [`ramfs::RamFs`] is the
//! in-memory implementation used by the kernel tests.

pub mod fd_table;
pub mod open_file;
pub mod ops;
pub mod ramfs;
pub mod stdio;

pub use fd_table::{Fd, FileDescriptorTable};
pub use open_file::{OpenFileEntry, OpenFileId, OpenFileTable, OpenMode, OpenObject};
pub use ramfs::RamFs;
pub use stdio::{BufferConsole, Console, ConsoleEnd, LogConsole, STDIN_FD, STDOUT_FD};

pub use crate::errors::FileError;

/// Result type for file operations
pub type FileResult<T> = Result<T, FileError>;

use crate::kernel::core::types::FileId;

/// Trait for filesystem implementations
///
/// Names and storage are separate: removing a name does not free the
/// storage behind it. The kernel calls [`FileSystem::release`] once the
/// last open reference to an unlinked file is gone.
pub trait FileSystem: Send + Sync {
    /// Resolve a path to the file it names
    fn lookup(&self, path: &str) -> Option<FileId>;

    /// Create the file, or truncate it to zero length if it already exists
    ///
    /// # Errors
    ///
    /// `StorageFailure` if the file system cannot hold another file.
    fn create(&self, path: &str) -> FileResult<FileId>;

    /// Remove a name, returning the file it named
    fn remove_name(&self, path: &str) -> Option<FileId>;

    /// Read bytes at `offset`; returns 0 at or past end of file
    ///
    /// # Errors
    ///
    /// `StorageFailure` if the file's storage is gone.
    fn read_at(&self, file: FileId, offset: usize, buf: &mut [u8]) -> FileResult<usize>;

    /// Write bytes at `offset`, growing the file as needed
    ///
    /// # Errors
    ///
    /// `StorageFailure` if the file's storage is gone.
    fn write_at(&self, file: FileId, offset: usize, data: &[u8]) -> FileResult<usize>;

    /// Free the storage of a file that no longer has a name
    fn release(&self, file: FileId);

    /// Check if a path exists
    fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }
}
