// crates/kernel/src/kernel/async/mod.rs
//! 非同期処理基盤
//!
//! Future executor と待ち行列を提供します。
//!
//! # Overview
//!
//! ユーザープロセスは 1 つの非同期タスクとして executor 上で実行されます。
//! `read` / `write` / `join` でブロックする場合、タスクは `WaitQueue` に
//! Waker を登録して `Pending` を返し、相手側の状態変化で再びキューに入ります。
//!
//! # Usage
//!
//! ```
//! use rany_kernel::kernel::r#async::Executor;
//!
//! let executor = Executor::with_capacity(8);
//! executor.spawn(async {
//!     // プロセス本体
//! });
//! assert_eq!(executor.run_until_idle(), 1);
//! ```

pub mod executor;
pub mod wait_queue;
#[cfg(test)]
pub(crate) mod waker;

pub use executor::{Executor, TaskId};
pub use wait_queue::WaitQueue;
