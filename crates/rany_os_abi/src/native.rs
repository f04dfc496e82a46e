// rany_os_abi/src/native.rs
//! Syscall numbers and value encodings
//!
//! This module fixes the numbering of the syscall table and the encoding of
//! the values that cross the boundary: descriptors and join outcomes.

/// System call numbers
///
/// The numbering is part of the ABI and must stay stable.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyscallNumber {
    /// Power off the machine (root process only)
    Halt = 0,
    /// Terminate the calling process
    Exit = 1,
    /// Start a new child process from a program image
    Exec = 2,
    /// Wait for a child process to exit
    Join = 3,
    /// Create or truncate a file, or attach a pipe writer
    Creat = 4,
    /// Open an existing file, or attach a pipe reader
    Open = 5,
    /// Read from a descriptor
    Read = 6,
    /// Write to a descriptor
    Write = 7,
    /// Close a descriptor
    Close = 8,
    /// Remove a name from the file system
    Unlink = 9,
    /// Duplicate a descriptor onto the smallest free slot
    Dup = 10,
}

impl SyscallNumber {
    /// Convert from raw u64 value
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Halt),
            1 => Some(Self::Exit),
            2 => Some(Self::Exec),
            3 => Some(Self::Join),
            4 => Some(Self::Creat),
            5 => Some(Self::Open),
            6 => Some(Self::Read),
            7 => Some(Self::Write),
            8 => Some(Self::Close),
            9 => Some(Self::Unlink),
            10 => Some(Self::Dup),
            _ => None,
        }
    }

    /// Get the raw u64 value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self as u64
    }

    /// Syscall name, as used in trace output
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Exit => "exit",
            Self::Exec => "exec",
            Self::Join => "join",
            Self::Creat => "creat",
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
            Self::Unlink => "unlink",
            Self::Dup => "dup",
        }
    }

    /// Get the category of this syscall
    #[must_use]
    pub const fn category(self) -> SyscallCategory {
        match self {
            Self::Halt | Self::Exit | Self::Exec | Self::Join => SyscallCategory::Process,
            Self::Creat | Self::Open | Self::Close | Self::Unlink | Self::Dup => {
                SyscallCategory::Descriptor
            }
            Self::Read | Self::Write => SyscallCategory::Io,
        }
    }

    /// Whether the call may suspend the calling process
    #[must_use]
    pub const fn may_block(self) -> bool {
        matches!(self, Self::Join | Self::Read | Self::Write)
    }
}

/// Syscall categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallCategory {
    /// Process lifecycle
    Process,
    /// Descriptor table management
    Descriptor,
    /// Data transfer
    Io,
}

/// Raw descriptor value as seen by userspace
///
/// The low 32 bits are the slot number, the next 31 bits are the slot
/// generation. A slot that has never been closed has generation 0, so the
/// first descriptors a process sees are the plain integers 0, 1, 2, ...
/// A value that outlived a `close` carries an old generation and is
/// rejected even after the slot number has been handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawFd(i64);

impl RawFd {
    /// Largest generation that fits the encoding
    pub const GENERATION_MASK: u32 = 0x7FFF_FFFF;

    /// Pack a slot and generation
    #[must_use]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self((((generation & Self::GENERATION_MASK) as i64) << 32) | slot as i64)
    }

    /// Wrap a value received from userspace; negative values are rejected
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw < 0 { None } else { Some(Self(raw)) }
    }

    /// The raw value handed to userspace
    #[must_use]
    pub const fn as_raw(self) -> i64 {
        self.0
    }

    /// Slot number (the classic descriptor number)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn slot(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Slot generation
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32 & Self::GENERATION_MASK
    }
}

/// Result of a successful `join`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Child called `exit` (or returned) with this status
    Exited(i32),
    /// Child terminated abnormally; no status is available
    Faulted,
}

impl JoinOutcome {
    /// Return value of the sign-coded `join` for a normal exit
    pub const EXITED: i64 = 1;
    /// Return value of the sign-coded `join` for an abnormal exit
    pub const FAULTED: i64 = 0;

    /// Sign-coded return value
    #[must_use]
    pub const fn to_raw(self) -> i64 {
        match self {
            Self::Exited(_) => Self::EXITED,
            Self::Faulted => Self::FAULTED,
        }
    }

    /// Exit status, if the child exited normally
    #[must_use]
    pub const fn status(self) -> Option<i32> {
        match self {
            Self::Exited(status) => Some(status),
            Self::Faulted => None,
        }
    }
}
