// crates/kernel/src/kernel/async/wait_queue.rs
//! Wait Queue
//!
//! ブロックしたタスクの Waker を保持し、状態変化時にまとめて起こす。
//!
//! 待機側は必ず「状態のロックを保持したまま `register` し、その後ロックを
//! 解放して `Pending` を返す」こと。起こす側は状態を変更してから
//! `wake_all` を呼ぶ。こうすることで wake の取りこぼしが起きない。
//! 起こされたタスクは条件を必ず再確認する。

use alloc::vec::Vec;
use core::task::Waker;
use spin::Mutex;

/// 待機中タスクの集合
#[derive(Debug, Default)]
pub struct WaitQueue {
    wakers: Mutex<Vec<Waker>>,
}

impl WaitQueue {
    /// 空の待ち行列を作成
    pub const fn new() -> Self {
        Self {
            wakers: Mutex::new(Vec::new()),
        }
    }

    /// Waker を登録 (同じタスクの Waker は 1 つにまとめる)
    pub fn register(&self, waker: &Waker) {
        let mut wakers = self.wakers.lock();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    /// 登録されている全タスクを起こす
    ///
    /// # Returns
    /// 起こしたタスクの数
    pub fn wake_all(&self) -> usize {
        let wakers = core::mem::take(&mut *self.wakers.lock());
        let count = wakers.len();
        for waker in wakers {
            waker.wake();
        }
        count
    }

    /// 待機中のタスク数
    pub fn len(&self) -> usize {
        self.wakers.lock().len()
    }

    /// 待機中のタスクがないか
    pub fn is_empty(&self) -> bool {
        self.wakers.lock().is_empty()
    }
}
