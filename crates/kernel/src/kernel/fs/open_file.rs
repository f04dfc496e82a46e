// kernel/src/kernel/fs/open_file.rs
//! System-wide open-file table
//!
//! # Design
//!
//! Every successful `open`/`creat` creates one [`OpenFileEntry`] with its
//! own cursor. Descriptor slots (in any process) refer to entries by
//! [`OpenFileId`]; the entry counts those references and is removed as
//! soon as the count reaches zero.
//!
//! For regular files the table also keeps a record per [`FileId`]: how
//! many entries reference the file and whether its name has been
//! unlinked. Storage of an unlinked file is released through the
//! [`FileSystem`] when the last entry referencing it goes away.
//!
//! Entries live in an arena of slots. Ids carry the slot generation so a
//! removed entry can never be reached through an old id.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;

use super::stdio::ConsoleEnd;
use super::{FileError, FileResult, FileSystem};
use crate::kernel::core::types::FileId;
use crate::kernel::ipc::PipeEndpoint;

bitflags! {
    /// Access directions granted by an open-file entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenMode: u8 {
        /// `read` is allowed
        const READ = 1 << 0;
        /// `write` is allowed
        const WRITE = 1 << 1;
        /// Both directions
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Stable id of an open-file entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenFileId {
    index: u32,
    generation: u32,
}

impl OpenFileId {
    #[cfg(test)]
    pub(crate) const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index
    pub const fn index(self) -> u32 {
        self.index
    }
}

/// What an open-file entry gives access to
#[derive(Debug, Clone)]
pub enum OpenObject {
    /// Regular file in the file system
    File(FileId),
    /// One side of the console
    Console(ConsoleEnd),
    /// One endpoint of a named pipe
    Pipe(PipeEndpoint),
}

/// One open instance of a file, console side or pipe endpoint
#[derive(Debug)]
pub struct OpenFileEntry {
    object: OpenObject,
    mode: OpenMode,
    cursor: usize,
    ref_count: u32,
}

impl OpenFileEntry {
    /// The object this entry opens
    pub fn object(&self) -> &OpenObject {
        &self.object
    }

    /// Access mode
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Byte offset of the next regular-file transfer
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor forward
    pub fn advance(&mut self, count: usize) {
        self.cursor += count;
    }

    /// Number of descriptor slots referring to this entry
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// Per-file bookkeeping for regular files
#[derive(Debug, Clone, Copy)]
struct FileRecord {
    /// Live entries referencing the file
    open_count: u32,
    /// Name removed while entries were still open
    unlink_pending: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<OpenFileEntry>,
}

/// Shared open-file table
pub struct OpenFileTable {
    fs: Arc<dyn FileSystem>,
    slots: Vec<Slot>,
    count: usize,
    records: BTreeMap<FileId, FileRecord>,
}

impl OpenFileTable {
    /// Create an empty table over `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            slots: Vec::new(),
            count: 0,
            records: BTreeMap::new(),
        }
    }

    /// The file system collaborator
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Open a regular file
    ///
    /// With `create` set the file is created if absent and truncated if
    /// present; without it the file must already exist.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file does not exist and `create` is unset, or the
    /// file system's error from `create`.
    pub fn open_file(&mut self, path: &str, create: bool) -> FileResult<OpenFileId> {
        let file = if create {
            self.fs.create(path)?
        } else {
            self.fs.lookup(path).ok_or(FileError::NotFound)?
        };
        Ok(self.insert(OpenObject::File(file), OpenMode::READ_WRITE))
    }

    /// Add an entry with a reference count of one
    pub fn insert(&mut self, object: OpenObject, mode: OpenMode) -> OpenFileId {
        if let OpenObject::File(file) = &object {
            self.records
                .entry(*file)
                .or_insert(FileRecord {
                    open_count: 0,
                    unlink_pending: false,
                })
                .open_count += 1;
        }

        let entry = OpenFileEntry {
            object,
            mode,
            cursor: 0,
            ref_count: 1,
        };

        let index = match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.entry = Some(entry);
        self.count += 1;

        #[allow(clippy::cast_possible_truncation)]
        let index = index as u32;
        OpenFileId {
            index,
            generation: slot.generation,
        }
    }

    /// Look up a live entry
    pub fn get(&self, id: OpenFileId) -> Option<&OpenFileEntry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Look up a live entry mutably
    pub fn get_mut(&mut self, id: OpenFileId) -> Option<&mut OpenFileEntry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Entry referenced from a descriptor slot
    ///
    /// # Panics
    ///
    /// Descriptor slots only ever hold ids of live entries; a dangling id
    /// is a kernel bug.
    pub fn entry(&self, id: OpenFileId) -> &OpenFileEntry {
        self.get(id)
            .unwrap_or_else(|| panic!("descriptor refers to dangling open-file id {id:?}"))
    }

    /// Mutable variant of [`Self::entry`]
    ///
    /// # Panics
    ///
    /// Same as [`Self::entry`].
    pub fn entry_mut(&mut self, id: OpenFileId) -> &mut OpenFileEntry {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("descriptor refers to dangling open-file id {id:?}"))
    }

    /// Add a reference (a second descriptor slot now points at the entry)
    pub fn retain(&mut self, id: OpenFileId) {
        self.entry_mut(id).ref_count += 1;
    }

    /// Drop a reference
    ///
    /// Returns the object of the entry if this was the last reference and
    /// the entry has been removed, so the caller can detach pipe endpoints.
    /// Storage of an unlinked file is released here.
    pub fn release(&mut self, id: OpenFileId) -> Option<OpenObject> {
        let entry = self.entry_mut(id);
        assert!(entry.ref_count > 0, "open-file reference count underflow");
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return None;
        }

        let slot = &mut self.slots[id.index as usize];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.count -= 1;

        if let OpenObject::File(file) = &entry.object {
            self.drop_file_reference(*file);
        }
        Some(entry.object)
    }

    /// Remove a name from the file system
    ///
    /// If entries still reference the file its storage survives until the
    /// last of them is released; otherwise it is released immediately.
    ///
    /// # Errors
    ///
    /// `NotFound` if the path names no file.
    pub fn unlink(&mut self, path: &str) -> FileResult<()> {
        let file = self.fs.remove_name(path).ok_or(FileError::NotFound)?;
        match self.records.get_mut(&file) {
            Some(record) => {
                record.unlink_pending = true;
                log::debug!("[OFT] {} unlinked while open ({} entries), deferring release", file, record.open_count);
            }
            None => {
                self.fs.release(file);
                log::debug!("[OFT] {} unlinked and released", file);
            }
        }
        Ok(())
    }

    /// Number of live entries referencing `file`
    pub fn open_count(&self, file: FileId) -> u32 {
        self.records.get(&file).map_or(0, |r| r.open_count)
    }

    /// Whether `file` has been unlinked and awaits its last close
    pub fn is_unlink_pending(&self, file: FileId) -> bool {
        self.records.get(&file).is_some_and(|r| r.unlink_pending)
    }

    fn drop_file_reference(&mut self, file: FileId) {
        let Some(record) = self.records.get_mut(&file) else {
            panic!("open file {file} has no record");
        };
        record.open_count -= 1;
        if record.open_count > 0 {
            return;
        }
        let pending = record.unlink_pending;
        self.records.remove(&file);
        if pending {
            self.fs.release(file);
            log::debug!("[OFT] last close of unlinked {}, storage released", file);
        }
    }
}

impl core::fmt::Debug for OpenFileTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpenFileTable")
            .field("entries", &self.count)
            .field("files", &self.records.len())
            .finish()
    }
}
