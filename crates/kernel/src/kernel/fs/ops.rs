// kernel/src/kernel/fs/ops.rs
//! Descriptor operations
//!
//! `open`, `creat`, `close`, `dup`, `read`, `write` and `unlink` as seen
//! from one process. Every operation validates the descriptor against the
//! caller's table before touching the shared open-file table.
//!
//! Pipe transfers may block. The channel is resolved under the kernel
//! locks, the locks are dropped, and only then is the transfer awaited.

use alloc::sync::Arc;

use super::fd_table::{Fd, FileDescriptorTable};
use super::open_file::{OpenFileId, OpenFileTable, OpenMode, OpenObject};
use super::stdio::ConsoleEnd;
use super::{FileError, FileResult};
use crate::errors::unified::Result;
use crate::errors::ProcessError;
use crate::kernel::Kernel;
use crate::kernel::core::types::{FileId, ProcessId};
use crate::kernel::ipc::{PipeChannel, PipeEnd};

/// Where a transfer continues after the descriptor has been resolved
enum Transfer {
    /// Finished under the lock (regular file)
    Done(usize),
    Console,
    Pipe(Arc<PipeChannel>),
}

impl Kernel {
    /// Open (or with `create`, create-or-truncate) a path for `pid`
    ///
    /// Paths under the pipe prefix attach a pipe endpoint instead:
    /// `creat` a writer, `open` a reader.
    pub(crate) fn open_path(&self, pid: ProcessId, path: &str, create: bool) -> Result<Fd> {
        if path.is_empty() {
            return Err(FileError::InvalidPath.into());
        }

        let mut processes = self.processes.lock();
        let process = processes.get_mut(pid).ok_or(ProcessError::NoSuchProcess)?;
        // 失敗時に creat の切り詰めなどの副作用を残さない
        if process.fd_table().is_full() {
            return Err(FileError::DescriptorTableFull.into());
        }

        let mut files = self.files.lock();
        let id = {
            let mut pipes = self.pipes.lock();
            if pipes.is_pipe_path(path) {
                let (end, mode) = if create {
                    (PipeEnd::Writer, OpenMode::WRITE)
                } else {
                    (PipeEnd::Reader, OpenMode::READ)
                };
                let endpoint = pipes.attach(path, end)?;
                files.insert(OpenObject::Pipe(endpoint), mode)
            } else {
                files.open_file(path, create)?
            }
        };

        match process.fd_table_mut().allocate(id) {
            Ok(fd) => {
                log::debug!("[FD] {} {} {} -> slot {}", pid, if create { "creat" } else { "open" }, path, fd.slot());
                Ok(fd)
            }
            Err(err) => {
                self.release_entry(&mut *files, id);
                Err(err.into())
            }
        }
    }

    /// Close a descriptor of `pid`
    pub(crate) fn close_fd(&self, pid: ProcessId, raw: i64) -> Result<()> {
        let fd = Fd::from_raw(raw).ok_or(FileError::BadDescriptor)?;
        let mut processes = self.processes.lock();
        let process = processes.get_mut(pid).ok_or(ProcessError::NoSuchProcess)?;
        let id = process.fd_table_mut().remove(fd)?;
        self.release_entry(&mut *self.files.lock(), id);
        log::debug!("[FD] {} close slot {}", pid, fd.slot());
        Ok(())
    }

    /// Duplicate a descriptor into the lowest free slot
    ///
    /// Both descriptors share the open-file entry, cursor included.
    pub(crate) fn dup_fd(&self, pid: ProcessId, raw: i64) -> Result<Fd> {
        let fd = Fd::from_raw(raw).ok_or(FileError::BadDescriptor)?;
        let mut processes = self.processes.lock();
        let table = processes
            .get_mut(pid)
            .ok_or(ProcessError::NoSuchProcess)?
            .fd_table_mut();
        let id = table.get(fd)?;
        let copy = table.allocate(id)?;
        self.files.lock().retain(id);
        log::debug!("[FD] {} dup slot {} -> slot {}", pid, fd.slot(), copy.slot());
        Ok(copy)
    }

    /// Read from a descriptor of `pid`
    pub(crate) async fn read_fd(&self, pid: ProcessId, raw: i64, buf: &mut [u8]) -> Result<usize> {
        let transfer = self.resolve(pid, raw, OpenMode::READ, |files, id, entry_file| {
            let entry = files.entry(id);
            let offset = entry.cursor();
            let count = files.fs().read_at(entry_file, offset, buf)?;
            files.entry_mut(id).advance(count);
            Ok(count)
        })?;

        match transfer {
            Transfer::Done(count) => Ok(count),
            Transfer::Console => Ok(self.console.read(buf)),
            Transfer::Pipe(channel) => Ok(channel.read(buf).await),
        }
    }

    /// Write to a descriptor of `pid`
    pub(crate) async fn write_fd(&self, pid: ProcessId, raw: i64, data: &[u8]) -> Result<usize> {
        let transfer = self.resolve(pid, raw, OpenMode::WRITE, |files, id, entry_file| {
            let offset = files.entry(id).cursor();
            let count = files.fs().write_at(entry_file, offset, data)?;
            files.entry_mut(id).advance(count);
            Ok(count)
        })?;

        match transfer {
            Transfer::Done(count) => Ok(count),
            Transfer::Console => Ok(self.console.write(data)),
            Transfer::Pipe(channel) => Ok(channel.write(data).await?),
        }
    }

    /// Remove a name from the file system
    ///
    /// Pipe paths are not file-system names and are never found.
    pub(crate) fn unlink_path(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(FileError::InvalidPath.into());
        }
        if self.pipes.lock().is_pipe_path(path) {
            return Err(FileError::NotFound.into());
        }
        self.files.lock().unlink(path)?;
        log::debug!("[FS] unlink {}", path);
        Ok(())
    }

    /// Give a fresh table its console descriptors (0 = input, 1 = output)
    pub(crate) fn install_stdio(files: &mut OpenFileTable, table: &mut FileDescriptorTable) -> Result<()> {
        for (end, mode) in [
            (ConsoleEnd::Input, OpenMode::READ),
            (ConsoleEnd::Output, OpenMode::WRITE),
        ] {
            let id = files.insert(OpenObject::Console(end), mode);
            if let Err(err) = table.allocate(id) {
                files.release(id);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Drop one reference to an open-file entry
    ///
    /// Detaches the pipe endpoint when the entry goes away.
    pub(crate) fn release_entry(&self, files: &mut OpenFileTable, id: OpenFileId) {
        if let Some(OpenObject::Pipe(endpoint)) = files.release(id) {
            self.pipes.lock().detach(&endpoint);
        }
    }

    /// Resolve a descriptor and check its access mode
    ///
    /// Regular files are transferred right away through `on_file` while the
    /// tables are locked.
    fn resolve<F>(&self, pid: ProcessId, raw: i64, needed: OpenMode, on_file: F) -> Result<Transfer>
    where
        F: FnOnce(&mut OpenFileTable, OpenFileId, FileId) -> FileResult<usize>,
    {
        let fd = Fd::from_raw(raw).ok_or(FileError::BadDescriptor)?;
        let processes = self.processes.lock();
        let process = processes.get(pid).ok_or(ProcessError::NoSuchProcess)?;
        let id = process.fd_table().get(fd)?;

        let mut files = self.files.lock();
        let entry = files.entry(id);
        if !entry.mode().contains(needed) {
            return Err(FileError::BadDescriptor.into());
        }

        let file = match entry.object() {
            OpenObject::File(file) => *file,
            OpenObject::Console(_) => return Ok(Transfer::Console),
            OpenObject::Pipe(endpoint) => return Ok(Transfer::Pipe(Arc::clone(endpoint.channel()))),
        };
        Ok(Transfer::Done(on_file(&mut *files, id, file)?))
    }
}
