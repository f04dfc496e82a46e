// src/errors/unified.rs

//! Unified error types for the kernel
//!
//! Every subsystem reports failures with its own small enum. They all
//! convert into [`KernelError`] for logging with context, and into
//! [`SyscallError`] at the syscall boundary.

use core::fmt;
use rany_os_abi::SyscallError;

/// Top-level kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// File, descriptor or pipe error
    File(FileError),
    /// Process table error
    Process(ProcessError),
    /// Program loader error
    Load(LoadError),
    /// Invalid kernel configuration
    Config(ConfigError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(e) => write!(f, "File error: {e}"),
            Self::Process(e) => write!(f, "Process error: {e}"),
            Self::Load(e) => write!(f, "Load error: {e}"),
            Self::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

/// File subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// Path does not exist
    NotFound,
    /// Descriptor is not live in the caller's table
    BadDescriptor,
    /// Descriptor table is full
    DescriptorTableFull,
    /// Pipe table is full
    PipeTableFull,
    /// All readers of the pipe have closed
    BrokenPipe,
    /// Path is empty or names nothing under the pipe prefix
    InvalidPath,
    /// The backing file system rejected the operation
    StorageFailure,
}

impl FileError {
    /// Returns a string representation of the file error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "no such file",
            Self::BadDescriptor => "bad descriptor",
            Self::DescriptorTableFull => "descriptor table full",
            Self::PipeTableFull => "pipe table full",
            Self::BrokenPipe => "broken pipe",
            Self::InvalidPath => "invalid path",
            Self::StorageFailure => "storage failure",
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FileError> for KernelError {
    fn from(err: FileError) -> Self {
        Self::File(err)
    }
}

/// Process table errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// Pid does not name a live record
    NoSuchProcess,
    /// Joined pid is not a child of the caller
    NotAChild,
    /// Child was already joined
    AlreadyJoined,
    /// Process limit reached or pid space exhausted
    TableFull,
    /// Caller may not perform this operation
    PermissionDenied,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchProcess => write!(f, "no such process"),
            Self::NotAChild => write!(f, "not a child"),
            Self::AlreadyJoined => write!(f, "already joined"),
            Self::TableFull => write!(f, "process table full"),
            Self::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

impl From<ProcessError> for KernelError {
    fn from(err: ProcessError) -> Self {
        Self::Process(err)
    }
}

/// Program loader errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// No program image under this path
    ImageNotFound,
    /// Path lacks the executable suffix
    NotExecutable,
    /// An argument is empty
    EmptyArgument,
    /// Arguments do not fit in the argument page
    ArgumentsTooLarge,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageNotFound => write!(f, "image not found"),
            Self::NotExecutable => write!(f, "not an executable"),
            Self::EmptyArgument => write!(f, "empty argument"),
            Self::ArgumentsTooLarge => write!(f, "arguments too large"),
        }
    }
}

impl From<LoadError> for KernelError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Descriptor table cannot hold stdin and stdout
    DescriptorTableTooSmall,
    /// Pipe capacity must be a non-zero power of two
    InvalidPipeCapacity,
    /// Pipe prefix must be non-empty
    EmptyPipePrefix,
    /// Process limit must be non-zero and fit the pid space and run queue
    InvalidProcessLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DescriptorTableTooSmall => write!(f, "descriptor table too small"),
            Self::InvalidPipeCapacity => write!(f, "invalid pipe capacity"),
            Self::EmptyPipePrefix => write!(f, "empty pipe prefix"),
            Self::InvalidProcessLimit => write!(f, "invalid process limit"),
        }
    }
}

impl From<ConfigError> for KernelError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Result type alias for kernel operations
pub type Result<T> = core::result::Result<T, KernelError>;

// ============================================================================
// Syscall boundary conversions
// ============================================================================

impl From<FileError> for SyscallError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound => Self::NotFound,
            FileError::BadDescriptor => Self::BadDescriptor,
            FileError::DescriptorTableFull | FileError::PipeTableFull => Self::TableFull,
            FileError::BrokenPipe => Self::BrokenPipe,
            FileError::InvalidPath => Self::InvalidArgument,
            FileError::StorageFailure => Self::InternalError,
        }
    }
}

impl From<ProcessError> for SyscallError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NoSuchProcess => Self::NoSuchProcess,
            ProcessError::NotAChild => Self::NotAChild,
            ProcessError::AlreadyJoined => Self::AlreadyJoined,
            ProcessError::TableFull => Self::TableFull,
            ProcessError::PermissionDenied => Self::PermissionDenied,
        }
    }
}

impl From<LoadError> for SyscallError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::ImageNotFound => Self::NotFound,
            LoadError::NotExecutable
            | LoadError::EmptyArgument
            | LoadError::ArgumentsTooLarge => Self::LoadFailure,
        }
    }
}

impl From<KernelError> for SyscallError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::File(e) => e.into(),
            KernelError::Process(e) => e.into(),
            KernelError::Load(e) => e.into(),
            KernelError::Config(_) => Self::InternalError,
        }
    }
}

/// Helper trait for error context
pub trait ErrorContext {
    /// Get a detailed description of the error
    fn context(&self) -> &'static str;
}

impl ErrorContext for KernelError {
    fn context(&self) -> &'static str {
        match self {
            Self::File(_) => "Error occurred in file subsystem",
            Self::Process(_) => "Error occurred in process subsystem",
            Self::Load(_) => "Error occurred while loading a program",
            Self::Config(_) => "Kernel configuration was rejected",
        }
    }
}

impl ErrorContext for FileError {
    fn context(&self) -> &'static str {
        match self {
            Self::NotFound => "Path does not name an existing file",
            Self::BadDescriptor => "Descriptor is closed, stale or lacks the requested access",
            Self::DescriptorTableFull => "Every descriptor slot of the process is in use",
            Self::PipeTableFull => "Maximum number of pipes already exist",
            Self::BrokenPipe => "Pipe has no readers left",
            Self::InvalidPath => "Path is empty or names no pipe",
            Self::StorageFailure => "Backing file system failed the request",
        }
    }
}

impl ErrorContext for ProcessError {
    fn context(&self) -> &'static str {
        match self {
            Self::NoSuchProcess => "Process record does not exist",
            Self::NotAChild => "Only the parent may join a process",
            Self::AlreadyJoined => "A child can be joined only once",
            Self::TableFull => "Process limit reached",
            Self::PermissionDenied => "Only the root process may halt the machine",
        }
    }
}

impl ErrorContext for LoadError {
    fn context(&self) -> &'static str {
        match self {
            Self::ImageNotFound => "No program image is registered under this path",
            Self::NotExecutable => "Program path lacks the executable suffix",
            Self::EmptyArgument => "Program arguments must be non-empty strings",
            Self::ArgumentsTooLarge => "Program arguments exceed the argument page",
        }
    }
}
