// src/kernel/syscall/mod.rs
//! System call implementation module
//!
//! This module is the boundary between user programs and the kernel.
//!
//! # Architecture
//!
//! Every process owns one [`UserContext`]. It is the only handle a program
//! has on the kernel and exposes each system call as a typed method:
//!
//! | Call     | Success                 | Blocks                        |
//! |----------|-------------------------|-------------------------------|
//! | `creat`  | descriptor              | no                            |
//! | `open`   | descriptor              | no                            |
//! | `close`  | `()`                    | no                            |
//! | `read`   | byte count (0 = EOF)    | on an empty pipe              |
//! | `write`  | byte count              | on a full pipe                |
//! | `unlink` | `()`                    | no                            |
//! | `dup`    | descriptor              | no                            |
//! | `exec`   | child pid               | no                            |
//! | `join`   | [`JoinOutcome`]         | while the child runs          |
//! | `halt`   | `()`                    | no                            |
//!
//! `exit` is not a method: a program exits by returning its
//! [`ProcessExit`](crate::kernel::process::ProcessExit).
//!
//! # Sign-coded ABI
//!
//! [`dispatch`] takes a [`Syscall`] and returns a single `i64` the way a
//! trap handler would hand it back in a register:
//!
//! - **Positive or zero**: success (descriptor, count, pid, join outcome)
//! - **Negative**: [`SyscallError::to_errno`]
//!
//! # Error Handling
//!
//! Errors are always returned to the caller, never raised. A failed call
//! leaves the caller's process running and its tables unchanged.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errors::ErrorContext;
use crate::kernel::Kernel;
use crate::kernel::core::types::ProcessId;
use rany_os_abi::{JoinOutcome, SyscallError, SyscallNumber, SyscallResult};

/// A process's handle on the kernel
///
/// Cloning is cheap; all clones act as the same process.
#[derive(Clone)]
pub struct UserContext {
    kernel: Arc<Kernel>,
    pid: ProcessId,
}

impl UserContext {
    pub(crate) fn new(kernel: Arc<Kernel>, pid: ProcessId) -> Self {
        Self { kernel, pid }
    }

    /// Own process id
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Argument vector captured at exec time
    pub fn args(&self) -> Vec<String> {
        self.kernel
            .processes
            .lock()
            .get(self.pid)
            .map(|p| p.args().to_vec())
            .unwrap_or_default()
    }

    /// Open an existing file, or attach a pipe reader
    ///
    /// # Errors
    ///
    /// `NotFound`, `TableFull`, `InvalidArgument` for an empty path.
    pub fn open(&self, path: &str) -> SyscallResult<i64> {
        self.complete(SyscallNumber::Open, self.kernel.open_path(self.pid, path, false))
            .map(|fd| fd.to_raw())
    }

    /// Create or truncate a file, or attach a pipe writer
    ///
    /// # Errors
    ///
    /// `TableFull`, `InvalidArgument` for an empty path.
    pub fn creat(&self, path: &str) -> SyscallResult<i64> {
        self.complete(SyscallNumber::Creat, self.kernel.open_path(self.pid, path, true))
            .map(|fd| fd.to_raw())
    }

    /// Close a descriptor
    ///
    /// # Errors
    ///
    /// `BadDescriptor` if `fd` is not a live descriptor of this process.
    pub fn close(&self, fd: i64) -> SyscallResult<()> {
        self.complete(SyscallNumber::Close, self.kernel.close_fd(self.pid, fd))
    }

    /// Read into `buf`
    ///
    /// # Errors
    ///
    /// `BadDescriptor` if `fd` is not live or not open for reading.
    pub async fn read(&self, fd: i64, buf: &mut [u8]) -> SyscallResult<usize> {
        let result = self.kernel.read_fd(self.pid, fd, buf).await;
        self.complete(SyscallNumber::Read, result)
    }

    /// Write `data`
    ///
    /// # Errors
    ///
    /// `BadDescriptor` if `fd` is not live or not open for writing,
    /// `BrokenPipe` if every reader of the pipe is gone.
    pub async fn write(&self, fd: i64, data: &[u8]) -> SyscallResult<usize> {
        let result = self.kernel.write_fd(self.pid, fd, data).await;
        self.complete(SyscallNumber::Write, result)
    }

    /// Remove a file name
    ///
    /// # Errors
    ///
    /// `NotFound` if the path names no file.
    pub fn unlink(&self, path: &str) -> SyscallResult<()> {
        self.complete(SyscallNumber::Unlink, self.kernel.unlink_path(path))
    }

    /// Duplicate a descriptor
    ///
    /// # Errors
    ///
    /// `BadDescriptor`, `TableFull`.
    pub fn dup(&self, fd: i64) -> SyscallResult<i64> {
        self.complete(SyscallNumber::Dup, self.kernel.dup_fd(self.pid, fd))
            .map(|fd| fd.to_raw())
    }

    /// Start a child process
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown image, `LoadFailure` for a bad path or
    /// argument vector, `TableFull` when no pid is available.
    pub fn exec(&self, path: &str, args: &[&str]) -> SyscallResult<ProcessId> {
        self.complete(SyscallNumber::Exec, self.kernel.exec(self.pid, path, args))
    }

    /// Wait for a child to terminate
    ///
    /// # Errors
    ///
    /// `NotAChild`, `AlreadyJoined`; never blocks in those cases.
    pub async fn join(&self, child: ProcessId) -> SyscallResult<JoinOutcome> {
        let result = self.kernel.join(self.pid, child).await;
        self.complete(SyscallNumber::Join, result)
    }

    /// Halt the machine
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless called by the root process.
    pub fn halt(&self) -> SyscallResult<()> {
        self.complete(SyscallNumber::Halt, self.kernel.halt(self.pid))
    }

    fn complete<T>(&self, number: SyscallNumber, result: crate::errors::unified::Result<T>) -> SyscallResult<T> {
        result.map_err(|err| {
            log::debug!("[Syscall] {} {}: {} ({})", self.pid, number.name(), err, err.context());
            SyscallError::from(err)
        })
    }
}

impl core::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserContext").field("pid", &self.pid).finish()
    }
}

/// A decoded system call with its arguments
#[derive(Debug)]
pub enum Syscall<'a> {
    /// halt()
    Halt,
    /// exec(path, argv)
    Exec {
        /// Executable path
        path: &'a str,
        /// Argument vector
        args: &'a [&'a str],
    },
    /// join(pid, &status)
    Join {
        /// Child pid as passed by the program
        pid: i64,
        /// Receives the exit status on normal termination
        status: &'a mut i32,
    },
    /// creat(path)
    Creat {
        /// Path to create or truncate
        path: &'a str,
    },
    /// open(path)
    Open {
        /// Path to open
        path: &'a str,
    },
    /// read(fd, buf)
    Read {
        /// Descriptor
        fd: i64,
        /// Destination
        buf: &'a mut [u8],
    },
    /// write(fd, buf)
    Write {
        /// Descriptor
        fd: i64,
        /// Source
        buf: &'a [u8],
    },
    /// close(fd)
    Close {
        /// Descriptor
        fd: i64,
    },
    /// unlink(path)
    Unlink {
        /// Name to remove
        path: &'a str,
    },
    /// dup(fd)
    Dup {
        /// Descriptor to duplicate
        fd: i64,
    },
}

impl Syscall<'_> {
    /// ABI number of the call
    pub const fn number(&self) -> SyscallNumber {
        match self {
            Self::Halt => SyscallNumber::Halt,
            Self::Exec { .. } => SyscallNumber::Exec,
            Self::Join { .. } => SyscallNumber::Join,
            Self::Creat { .. } => SyscallNumber::Creat,
            Self::Open { .. } => SyscallNumber::Open,
            Self::Read { .. } => SyscallNumber::Read,
            Self::Write { .. } => SyscallNumber::Write,
            Self::Close { .. } => SyscallNumber::Close,
            Self::Unlink { .. } => SyscallNumber::Unlink,
            Self::Dup { .. } => SyscallNumber::Dup,
        }
    }
}

/// Run a system call and encode the result as a sign-coded `i64`
///
/// `join` returns 1 and stores the status for a normal exit, 0 for an
/// abnormal one.
pub async fn dispatch(ctx: &UserContext, call: Syscall<'_>) -> i64 {
    #[cfg(feature = "syscall_trace")]
    log::trace!("[Syscall] {} -> {}", ctx.pid(), call.number().name());

    let result = match call {
        Syscall::Halt => ctx.halt().map(|()| 0),
        Syscall::Exec { path, args } => ctx.exec(path, args).map(ProcessId::as_raw),
        Syscall::Join { pid, status } => match ProcessId::from_raw(pid) {
            Some(child) => ctx.join(child).await.map(|outcome| {
                if let Some(code) = outcome.status() {
                    *status = code;
                }
                outcome.to_raw()
            }),
            None => Err(SyscallError::NotAChild),
        },
        Syscall::Creat { path } => ctx.creat(path),
        Syscall::Open { path } => ctx.open(path),
        Syscall::Read { fd, buf } => ctx.read(fd, buf).await.map(count_to_raw),
        Syscall::Write { fd, buf } => ctx.write(fd, buf).await.map(count_to_raw),
        Syscall::Close { fd } => ctx.close(fd).map(|()| 0),
        Syscall::Unlink { path } => ctx.unlink(path).map(|()| 0),
        Syscall::Dup { fd } => ctx.dup(fd),
    };

    let raw = result.unwrap_or_else(SyscallError::to_errno);

    #[cfg(feature = "syscall_trace")]
    log::trace!("[Syscall] {} <- {}", ctx.pid(), raw);

    raw
}

#[allow(clippy::cast_possible_wrap)]
fn count_to_raw(count: usize) -> i64 {
    count as i64
}
