// kernel/src/kernel/fs/ramfs.rs
//! In-memory filesystem
//!
//! Flat namespace (no directories). Names map to file ids, file ids map to
//! byte vectors. A file keeps its bytes after its name is removed until
//! [`FileSystem::release`] is called.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use spin::Mutex;

use super::{FileError, FileResult, FileSystem};
use crate::kernel::core::types::FileId;

#[derive(Default)]
struct RamFsInner {
    names: BTreeMap<String, FileId>,
    files: BTreeMap<FileId, Vec<u8>>,
    next_id: u64,
}

/// Read-write in-memory filesystem
#[derive(Default)]
pub struct RamFs {
    inner: Mutex<RamFsInner>,
}

impl RamFs {
    /// Create an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file with the given contents (test and boot-time helper)
    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        {
            let mut inner = self.inner.lock();
            let id = Self::allocate(&mut inner, path);
            inner.files.insert(id, contents.to_vec());
        }
        self
    }

    /// Contents of the file currently named `path`
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock();
        let id = inner.names.get(normalize(path))?;
        inner.files.get(id).cloned()
    }

    /// Number of files whose storage has not been released
    pub fn stored_files(&self) -> usize {
        self.inner.lock().files.len()
    }

    /// Whether storage for `file` is still held
    pub fn is_stored(&self, file: FileId) -> bool {
        self.inner.lock().files.contains_key(&file)
    }

    fn allocate(inner: &mut RamFsInner, path: &str) -> FileId {
        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.names.insert(normalize(path).to_string(), id);
        id
    }
}

/// Paths are flat; a leading `/` is optional
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl FileSystem for RamFs {
    fn lookup(&self, path: &str) -> Option<FileId> {
        self.inner.lock().names.get(normalize(path)).copied()
    }

    fn create(&self, path: &str) -> FileResult<FileId> {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.names.get(normalize(path)) {
            let file = inner.files.get_mut(&id).ok_or(FileError::StorageFailure)?;
            file.clear();
            return Ok(id);
        }
        let id = Self::allocate(&mut inner, path);
        inner.files.insert(id, Vec::new());
        Ok(id)
    }

    fn remove_name(&self, path: &str) -> Option<FileId> {
        self.inner.lock().names.remove(normalize(path))
    }

    fn read_at(&self, file: FileId, offset: usize, buf: &mut [u8]) -> FileResult<usize> {
        let inner = self.inner.lock();
        let data = inner.files.get(&file).ok_or(FileError::StorageFailure)?;
        if offset >= data.len() {
            return Ok(0);
        }
        let count = buf.len().min(data.len() - offset);
        buf[..count].copy_from_slice(&data[offset..offset + count]);
        Ok(count)
    }

    fn write_at(&self, file: FileId, offset: usize, bytes: &[u8]) -> FileResult<usize> {
        let mut inner = self.inner.lock();
        let data = inner.files.get_mut(&file).ok_or(FileError::StorageFailure)?;
        let end = offset + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn release(&self, file: FileId) {
        self.inner.lock().files.remove(&file);
    }
}
