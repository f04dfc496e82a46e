// kernel/src/kernel/fs/fd_table.rs
//! Per-process file descriptor table
//!
//! # Design
//!
//! - Fixed number of slots; the descriptor number is the slot index
//! - Allocation always picks the lowest free slot
//! - Each slot carries a generation that is bumped when the slot is
//!   vacated, so a descriptor value kept across a `close` is rejected even
//!   after the same slot number has been handed out again
//!
//! A slot holds an [`OpenFileId`]; the open-file entry itself lives in the
//! shared [`OpenFileTable`](super::OpenFileTable) and is reference counted
//! there.

use alloc::vec::Vec;
use rany_os_abi::RawFd;

use super::open_file::OpenFileId;
use super::{FileError, FileResult};

/// A live descriptor: slot number plus the generation it was issued under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd {
    slot: u32,
    generation: u32,
}

impl Fd {
    /// Decode a value received from userspace
    pub const fn from_raw(raw: i64) -> Option<Self> {
        match RawFd::from_raw(raw) {
            Some(fd) => Some(Self {
                slot: fd.slot(),
                generation: fd.generation(),
            }),
            None => None,
        }
    }

    /// Value handed back to userspace
    pub const fn to_raw(self) -> i64 {
        RawFd::new(self.slot, self.generation).as_raw()
    }

    /// Slot number
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Generation the descriptor was issued under
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Slot in the descriptor table
#[derive(Debug, Clone, Copy, Default)]
struct FdSlot {
    /// Generation of the current (or next) occupant
    generation: u32,
    /// Open-file entry, if occupied
    open_file: Option<OpenFileId>,
}

impl FdSlot {
    fn is_empty(&self) -> bool {
        self.open_file.is_none()
    }

    /// Vacate the slot and invalidate descriptors issued for it
    fn take(&mut self) -> Option<OpenFileId> {
        let open_file = self.open_file.take()?;
        self.generation = self.generation.wrapping_add(1) & RawFd::GENERATION_MASK;
        Some(open_file)
    }
}

/// Per-process descriptor table
#[derive(Debug)]
pub struct FileDescriptorTable {
    slots: Vec<FdSlot>,
    count: usize,
}

impl FileDescriptorTable {
    /// Create a table with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, FdSlot::default());
        Self { slots, count: 0 }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if no descriptor is open
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Store `open_file` in the lowest free slot
    ///
    /// # Errors
    ///
    /// `DescriptorTableFull` if every slot is occupied.
    pub fn allocate(&mut self, open_file: OpenFileId) -> FileResult<Fd> {
        let index = self
            .slots
            .iter()
            .position(FdSlot::is_empty)
            .ok_or(FileError::DescriptorTableFull)?;

        let slot = &mut self.slots[index];
        slot.open_file = Some(open_file);
        self.count += 1;

        #[allow(clippy::cast_possible_truncation)]
        let fd = Fd {
            slot: index as u32,
            generation: slot.generation,
        };
        Ok(fd)
    }

    /// Resolve a live descriptor
    ///
    /// # Errors
    ///
    /// `BadDescriptor` if the slot is out of range, empty, or was reused
    /// since `fd` was issued.
    pub fn get(&self, fd: Fd) -> FileResult<OpenFileId> {
        let slot = self.slots.get(fd.slot as usize).ok_or(FileError::BadDescriptor)?;
        match slot.open_file {
            Some(open_file) if slot.generation == fd.generation => Ok(open_file),
            _ => Err(FileError::BadDescriptor),
        }
    }

    /// Vacate the slot behind a live descriptor
    ///
    /// # Errors
    ///
    /// `BadDescriptor` under the same conditions as [`Self::get`].
    pub fn remove(&mut self, fd: Fd) -> FileResult<OpenFileId> {
        self.get(fd)?;
        let open_file = self.slots[fd.slot as usize]
            .take()
            .ok_or(FileError::BadDescriptor)?;
        self.count -= 1;
        Ok(open_file)
    }

    /// Vacate every slot, returning the open-file ids that were held
    pub fn drain(&mut self) -> Vec<OpenFileId> {
        let drained: Vec<OpenFileId> = self.slots.iter_mut().filter_map(FdSlot::take).collect();
        self.count = 0;
        drained
    }

    /// Iterate over live descriptors in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Fd, OpenFileId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let fd = Fd {
                slot: index as u32,
                generation: slot.generation,
            };
            slot.open_file.map(|open_file| (fd, open_file))
        })
    }
}
