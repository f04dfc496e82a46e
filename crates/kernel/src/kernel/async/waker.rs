// crates/kernel/src/kernel/async/waker.rs
//! Waker ユーティリティ (テスト用)
//!
//! Executor を使わずに Future を直接ポーリングするテストで使う。

use alloc::sync::Arc;
use alloc::task::Wake;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::Waker;

/// wake された回数を数える Waker
pub struct CountingWaker {
    count: AtomicUsize,
}

impl CountingWaker {
    /// カウンタと、それに結び付いた Waker を作成
    pub fn new() -> (Arc<Self>, Waker) {
        let counter = Arc::new(Self {
            count: AtomicUsize::new(0),
        });
        let waker = Waker::from(Arc::clone(&counter));
        (counter, waker)
    }

    /// これまでに wake された回数
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
