// src/errors/mod.rs
//! Kernel error types

pub mod unified;

pub use unified::{ConfigError, ErrorContext, FileError, KernelError, LoadError, ProcessError};
