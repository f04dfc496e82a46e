// src/lib.rs
//! RanY OS - リソース管理とプロセス管理のカーネルコア
//!
//! ユーザープログラムが呼び出す `open` / `creat` / `close` / `read` /
//! `write` / `unlink` / `exec` / `join` を実装するカーネル側のサブシステム。
//!
//! - プロセスごとのファイルディスクリプタテーブル (世代番号付き)
//! - 全プロセスで共有される参照カウント付きオープンファイルテーブル
//! - 名前付きパイプ (ブロッキング読み書き)
//! - 親子関係を持つプロセステーブル (exec / join / exit)
//!
//! プロセスは協調型 executor 上の非同期タスクとして動作し、ブロックは
//! Pending な Future として表現されます。
//!
//! # Example
//!
//! ```
//! use rany_kernel::prelude::*;
//! use rany_kernel::kernel::fs::{RamFs, BufferConsole};
//! use rany_kernel::kernel::process::loader::ProgramRegistry;
//! use std::sync::Arc;
//!
//! let programs = Arc::new(ProgramRegistry::new());
//! programs.register("hello.coff", |ctx: UserContext| async move {
//!     let _ = ctx.write(1, b"hello").await;
//!     ProcessExit::Exited(0)
//! });
//!
//! let console = Arc::new(BufferConsole::new());
//! let kernel = Kernel::new(
//!     KernelConfig::default(),
//!     Arc::new(RamFs::new()),
//!     programs,
//!     console.clone(),
//! ).unwrap();
//!
//! kernel.boot("hello.coff", &[]).unwrap();
//! kernel.run_until_idle();
//! assert!(kernel.is_halted());
//! assert_eq!(console.take_output(), b"hello");
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(missing_docs))]

extern crate alloc;

pub mod errors;
pub mod kernel;

pub use kernel::Kernel;

/// よく使う型の再エクスポート
pub mod prelude {
    pub use crate::errors::unified::{KernelError, ErrorContext};
    pub use crate::kernel::core::config::KernelConfig;
    pub use crate::kernel::core::types::{FileId, ProcessId};
    pub use crate::kernel::process::ProcessExit;
    pub use crate::kernel::syscall::UserContext;
    pub use crate::kernel::Kernel;
    pub use rany_os_abi::{JoinOutcome, SyscallError, SyscallResult};
}
