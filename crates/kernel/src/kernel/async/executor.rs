// crates/kernel/src/kernel/async/executor.rs
//! Future Executor
//!
//! プロセスを非同期タスクとして実行するための協調型 Executor。
//! crossbeam-queue を使用したロックフリーキューでタスクを管理。
//!
//! 各タスクは実行キューに高々 1 回しか入らない (`scheduled` フラグ)。
//! そのためキュー容量はタスク数の上限と一致していればよい。

use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::task::{Context, Poll, Waker};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::task::Wake;
use crossbeam_queue::ArrayQueue;
use spin::Mutex;

// ============================================================================
// Task ID
// ============================================================================

/// タスク ID - 各タスクを一意に識別
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// 内部の u64 値を取得
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

// ============================================================================
// Task
// ============================================================================

/// 非同期タスク
///
/// Box 化された Future と、そのタスク専用の Waker を保持する。
struct Task {
    /// Box 化された Future
    future: Pin<Box<dyn Future<Output = ()> + Send>>,
    /// タスクを起こすための Waker
    waker: Arc<TaskWaker>,
}

impl Task {
    /// タスクをポーリング
    fn poll(&mut self) -> Poll<()> {
        // キューから取り出した時点で再スケジュール可能にする
        self.waker.scheduled.store(false, Ordering::Release);
        let waker = Waker::from(Arc::clone(&self.waker));
        let mut context = Context::from_waker(&waker);
        self.future.as_mut().poll(&mut context)
    }
}

// ============================================================================
// TaskWaker - Wake trait 実装
// ============================================================================

/// タスクを起こすための Waker 実装
struct TaskWaker {
    /// 対象タスクの ID
    task_id: TaskId,
    /// 実行キューに入っているかどうか
    scheduled: AtomicBool,
    /// タスクキューへの参照
    task_queue: Arc<ArrayQueue<TaskId>>,
}

impl TaskWaker {
    /// 実行キューに入れる (既に入っていれば何もしない)
    fn schedule(&self) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.task_queue.push(self.task_id).is_err() {
            // 容量はタスク数の上限以上に設定されるため通常は起こらない
            self.scheduled.store(false, Ordering::Release);
            log::error!("[Executor] run queue full, dropped wake for task {}", self.task_id.as_u64());
        }
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule();
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Future Executor
///
/// crossbeam-queue を使用したロックフリーキューでタスクを管理。
/// 完了済みタスクへの遅れた wake はキューから取り出した時点で読み捨てる。
pub struct Executor {
    /// 実行待ちタスクキュー（ロックフリー）
    task_queue: Arc<ArrayQueue<TaskId>>,
    /// タスクマップ（TaskId -> Task）
    tasks: Mutex<BTreeMap<TaskId, Task>>,
    /// 次に割り当てるタスク ID
    next_id: AtomicU64,
    /// 実行中フラグ
    running: AtomicBool,
}

impl Executor {
    /// 指定したキャパシティで Executor を作成
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            task_queue: Arc::new(ArrayQueue::new(capacity)),
            tasks: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
        }
    }

    /// タスクを追加（spawn）
    ///
    /// 任意の Future を Executor に追加し、すぐにキューに入れる。
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static + Send) -> TaskId {
        let task_id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let waker = Arc::new(TaskWaker {
            task_id,
            scheduled: AtomicBool::new(false),
            task_queue: Arc::clone(&self.task_queue),
        });
        let task = Task {
            future: Box::pin(future),
            waker: Arc::clone(&waker),
        };

        // タスクマップに追加してから実行キューに入れる
        self.tasks.lock().insert(task_id, task);
        waker.schedule();

        log::trace!("[Executor] Spawned task {}", task_id.as_u64());
        task_id
    }

    /// 1つのタスクをポーリング
    ///
    /// キューからタスクを1つ取り出してポーリングする。
    ///
    /// # Returns
    /// - `Some(true)` - タスクが完了した
    /// - `Some(false)` - タスクはまだ Pending
    /// - `None` - キューが空だった
    pub fn run_one(&self) -> Option<bool> {
        // 完了済みタスクの ID は読み飛ばす
        let (task_id, mut task) = loop {
            let task_id = self.task_queue.pop()?;
            if let Some(task) = self.tasks.lock().remove(&task_id) {
                break (task_id, task);
            }
        };

        // ポーリング中はタスクマップのロックを保持しない (タスクが spawn できるように)
        let completed = match task.poll() {
            Poll::Ready(()) => {
                log::trace!("[Executor] Task {} completed", task_id.as_u64());
                true
            }
            Poll::Pending => {
                // タスクを再度マップに戻す
                self.tasks.lock().insert(task_id, task);
                false
            }
        };

        Some(completed)
    }

    /// アイドル状態になるまで実行
    ///
    /// キューが空になるか `stop()` が呼ばれるまでタスクを実行し続ける。
    /// Pending になったタスクは Waker で再度キューに入れられる。
    ///
    /// # Returns
    /// 完了したタスクの数
    pub fn run_until_idle(&self) -> usize {
        let mut completed = 0;

        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            match self.run_one() {
                Some(true) => completed += 1,
                Some(false) => {}
                None => break,
            }
        }
        self.running.store(false, Ordering::SeqCst);

        completed
    }

    /// Executor を停止
    ///
    /// 実行中のタスクから呼ばれた場合、そのポーリングが終わった時点で止まる。
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 現在のタスク数を取得 (Pending 中のものを含む)
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// キュー内のタスク数を取得
    pub fn queued_count(&self) -> usize {
        self.task_queue.len()
    }

    /// 実行中かどうか
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl core::fmt::Debug for Executor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.task_count())
            .field("queued", &self.queued_count())
            .field("running", &self.is_running())
            .finish()
    }
}
