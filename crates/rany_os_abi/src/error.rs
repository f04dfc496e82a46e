// rany_os_abi/src/error.rs
//! Type-safe System Call Errors
//!
//! This module defines the error type every system call can fail with.
//!
//! # Design
//!
//! - **Pattern matching**: inside the kernel and in Rust userspace errors are
//!   strongly typed and must be handled explicitly
//! - **Stable encoding**: across the user-kernel boundary an error travels as
//!   a negative errno value, see [`SyscallError::to_errno`]
//!
//! # Example
//!
//! ```
//! use rany_os_abi::SyscallError;
//!
//! let raw = SyscallError::BadDescriptor.to_errno();
//! assert!(raw < 0);
//! assert_eq!(SyscallError::from_errno(raw), Some(SyscallError::BadDescriptor));
//! ```

/// System call error type
///
/// # ABI Representation
///
/// The discriminant values are stable and must not be changed. The upper
/// byte selects the [`ErrorCategory`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyscallError {
    // === General Errors (0x00xx) ===
    /// Invalid argument provided (empty path, malformed request)
    InvalidArgument = 0x0001,

    /// The caller is not allowed to perform this operation
    PermissionDenied = 0x0003,

    /// Path, program image or other named resource does not exist
    NotFound = 0x0004,

    /// A fixed-capacity table (descriptors, pipes, processes) is full
    TableFull = 0x000B,

    // === I/O Errors (0x01xx) ===
    /// Descriptor is not open, already closed, or lacks the needed direction
    BadDescriptor = 0x0100,

    /// Write to a pipe whose readers have all closed
    BrokenPipe = 0x0102,

    // === Process Errors (0x05xx) ===
    /// No process with the given pid exists
    NoSuchProcess = 0x0500,

    /// Program image could not be loaded (bad name, bad arguments)
    LoadFailure = 0x0502,

    /// Joined pid is not a child of the caller
    NotAChild = 0x0503,

    /// Child has already been joined
    AlreadyJoined = 0x0504,

    // === System Errors (0xFFxx) ===
    /// Internal kernel error (should never happen)
    InternalError = 0xFF01,
}

impl SyscallError {
    /// Every error variant, in discriminant order
    pub const ALL: [Self; 11] = [
        Self::InvalidArgument,
        Self::PermissionDenied,
        Self::NotFound,
        Self::TableFull,
        Self::BadDescriptor,
        Self::BrokenPipe,
        Self::NoSuchProcess,
        Self::LoadFailure,
        Self::NotAChild,
        Self::AlreadyJoined,
        Self::InternalError,
    ];

    /// Convert from raw u32 value
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0001 => Some(Self::InvalidArgument),
            0x0003 => Some(Self::PermissionDenied),
            0x0004 => Some(Self::NotFound),
            0x000B => Some(Self::TableFull),
            0x0100 => Some(Self::BadDescriptor),
            0x0102 => Some(Self::BrokenPipe),
            0x0500 => Some(Self::NoSuchProcess),
            0x0502 => Some(Self::LoadFailure),
            0x0503 => Some(Self::NotAChild),
            0x0504 => Some(Self::AlreadyJoined),
            0xFF01 => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Get the raw u32 value
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    /// Negative errno value returned by the sign-coded syscall entry
    ///
    /// The numbers follow the classic Unix errno table so that C-style
    /// test programs can compare against familiar constants.
    #[must_use]
    pub const fn to_errno(self) -> i64 {
        match self {
            Self::PermissionDenied => -1,  // EPERM
            Self::NotFound => -2,          // ENOENT
            Self::NoSuchProcess => -3,     // ESRCH
            Self::InternalError => -5,     // EIO
            Self::LoadFailure => -8,       // ENOEXEC
            Self::BadDescriptor => -9,     // EBADF
            Self::NotAChild => -10,        // ECHILD
            Self::InvalidArgument => -22,  // EINVAL
            Self::TableFull => -24,        // EMFILE
            Self::BrokenPipe => -32,       // EPIPE
            Self::AlreadyJoined => -114,   // EALREADY
        }
    }

    /// Decode a negative errno value produced by [`Self::to_errno`]
    #[must_use]
    pub const fn from_errno(errno: i64) -> Option<Self> {
        match errno {
            -1 => Some(Self::PermissionDenied),
            -2 => Some(Self::NotFound),
            -3 => Some(Self::NoSuchProcess),
            -5 => Some(Self::InternalError),
            -8 => Some(Self::LoadFailure),
            -9 => Some(Self::BadDescriptor),
            -10 => Some(Self::NotAChild),
            -22 => Some(Self::InvalidArgument),
            -24 => Some(Self::TableFull),
            -32 => Some(Self::BrokenPipe),
            -114 => Some(Self::AlreadyJoined),
            _ => None,
        }
    }

    /// Get the error category
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match (*self as u32) >> 8 {
            0x00 => ErrorCategory::General,
            0x01 => ErrorCategory::Io,
            0x05 => ErrorCategory::Process,
            0xFF => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Get a human-readable description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::TableFull => "table full",
            Self::BadDescriptor => "bad file descriptor",
            Self::BrokenPipe => "broken pipe",
            Self::NoSuchProcess => "no such process",
            Self::LoadFailure => "program could not be loaded",
            Self::NotAChild => "not a child of the caller",
            Self::AlreadyJoined => "child already joined",
            Self::InternalError => "internal error",
        }
    }
}

impl core::fmt::Display for SyscallError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// General errors
    General,
    /// I/O errors
    Io,
    /// Process errors
    Process,
    /// System errors
    System,
    /// Unknown category
    Unknown,
}

/// Type alias for syscall results
pub type SyscallResult<T> = Result<T, SyscallError>;
