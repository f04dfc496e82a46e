// kernel/src/kernel/mod.rs
//! カーネル本体
//!
//! すべての共有状態は 1 つの [`Kernel`] 値にまとまっています。
//! グローバルな可変状態はありません。
//!
//! # モジュール構成
//!
//! - `core`: 共通型と設定
//! - `async`: 協調型 executor と待ち行列
//! - `fs`: ディスクリプタテーブル、オープンファイルテーブル、標準入出力
//! - `ipc`: 名前付きパイプ
//! - `process`: プロセステーブルと exec / join / exit
//! - `syscall`: ユーザープログラムから見たシステムコール
//!
//! # ロック順序
//!
//! `processes` → `files` → `pipes` の順でのみ取得します。
//! `.await` をまたいでロックを保持することはありません。

pub mod core;
pub mod r#async;
pub mod fs;
pub mod ipc;
pub mod process;
pub mod syscall;

use alloc::sync::Arc;
use ::core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use self::core::config::KernelConfig;
use self::core::types::{FileId, ProcessId};
use self::fs::{Console, FileSystem, OpenFileTable};
use self::ipc::PipeRegistry;
use self::process::{ProgramLoader, ProcessState, ProcessTable};
use self::r#async::Executor;
use crate::errors::ConfigError;

/// カーネルインスタンス
///
/// [`Kernel::new`] で作成し、[`Kernel::boot`] で最初のプロセスを起動して
/// [`Kernel::run_until_idle`] で実行します。
pub struct Kernel {
    config: KernelConfig,
    processes: Mutex<ProcessTable>,
    files: Mutex<OpenFileTable>,
    pipes: Mutex<PipeRegistry>,
    loader: Arc<dyn ProgramLoader>,
    console: Arc<dyn Console>,
    executor: Executor,
    halted: AtomicBool,
}

impl Kernel {
    /// カーネルを初期化
    ///
    /// # Errors
    ///
    /// 設定値が不正な場合は [`ConfigError`] を返す。
    pub fn new(
        config: KernelConfig,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn ProgramLoader>,
        console: Arc<dyn Console>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        log::info!(
            "[Kernel] init: {} fds/process, {} pipes x {} bytes, {} processes",
            config.fd_table_size,
            config.max_pipes,
            config.pipe_capacity,
            config.max_processes
        );

        Ok(Arc::new(Self {
            config,
            processes: Mutex::new(ProcessTable::new(config.pid_limit, config.max_processes)),
            files: Mutex::new(OpenFileTable::new(fs)),
            pipes: Mutex::new(PipeRegistry::new(
                config.pipe_prefix,
                config.pipe_capacity,
                config.max_pipes,
            )),
            loader,
            console,
            executor: Executor::with_capacity(config.task_queue_capacity),
            halted: AtomicBool::new(false),
        }))
    }

    /// 設定を取得
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// 実行可能なプロセスがなくなるまで実行
    ///
    /// 停止済みの場合は何もしない。
    ///
    /// # Returns
    /// 完了したプロセスタスクの数
    pub fn run_until_idle(&self) -> usize {
        if self.is_halted() {
            return 0;
        }
        self.executor.run_until_idle()
    }

    /// マシンが停止したかどうか
    ///
    /// ルートプロセスが `halt` を呼んだか、最後のプロセスが終了した場合に真。
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// プロセスレコード数 (join 待ちを含む)
    pub fn process_count(&self) -> usize {
        self.processes.lock().len()
    }

    /// プロセスの状態 (レコードがなければ `None`)
    pub fn process_state(&self, pid: ProcessId) -> Option<ProcessState> {
        self.processes.lock().get(pid).map(process::Process::state)
    }

    /// プロセスが開いているディスクリプタ数
    pub fn descriptor_count(&self, pid: ProcessId) -> Option<usize> {
        self.processes.lock().get(pid).map(|p| p.fd_table().len())
    }

    /// オープンファイルテーブルのエントリ数
    pub fn open_file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// ファイルを参照しているエントリ数
    pub fn file_open_count(&self, file: FileId) -> u32 {
        self.files.lock().open_count(file)
    }

    /// unlink 済みで最後の close を待っているか
    pub fn is_unlink_pending(&self, file: FileId) -> bool {
        self.files.lock().is_unlink_pending(file)
    }

    /// 存在するパイプの数
    pub fn pipe_count(&self) -> usize {
        self.pipes.lock().len()
    }

    fn mark_halted(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            log::info!("[Kernel] halted");
        }
        self.executor.stop();
    }
}

impl ::core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", &self.config)
            .field("processes", &self.processes.lock().len())
            .field("open_files", &self.files.lock().len())
            .field("pipes", &self.pipes.lock().len())
            .field("halted", &self.is_halted())
            .finish_non_exhaustive()
    }
}
