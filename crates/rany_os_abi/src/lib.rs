//! RanY OS Shared ABI Definitions
//!
//! This crate provides the type-safe Application Binary Interface (ABI)
//! definitions shared between the kernel and userspace programs.
//!
//! # Conventions
//!
//! Every syscall returns a single signed 64-bit value:
//! - non-negative values carry the result (descriptor, byte count, pid, ...)
//! - negative values carry an error, see [`SyscallError::to_errno`]
//!
//! # Modules
//!
//! - [`error`]: Type-safe syscall error types and errno encoding
//! - [`native`]: Syscall numbers, descriptor encoding and join outcomes

#![no_std]
#![warn(missing_docs)]

pub mod error;
pub mod native;

pub use error::{ErrorCategory, SyscallError, SyscallResult};
pub use native::{JoinOutcome, RawFd, SyscallCategory, SyscallNumber};
