// kernel/src/kernel/core/mod.rs
//! カーネル共通の基本型と設定

pub mod config;
pub mod types;

pub use config::KernelConfig;
pub use types::{FileId, ProcessId};
