// kernel/src/kernel/core/config.rs
//! カーネル設定
//!
//! テーブルサイズやパイプ容量などの定数を 1 か所にまとめる。
//! `const` で構築できるため、静的な設定値としても使える。
//!
//! ```
//! use rany_kernel::kernel::core::KernelConfig;
//!
//! const SMALL: KernelConfig = KernelConfig::new()
//!     .with_fd_table_size(4)
//!     .with_pipe_capacity(64);
//! assert!(SMALL.validate().is_ok());
//! ```

use crate::errors::ConfigError;

/// ファイルディスクリプタテーブルのデフォルトサイズ
pub const DEFAULT_FD_TABLE_SIZE: usize = 16;

/// 同時に存在できるパイプ数のデフォルト
pub const DEFAULT_MAX_PIPES: usize = 16;

/// ページサイズ (パイプバッファと引数ページの大きさ)
pub const PAGE_SIZE: usize = 1024;

/// パイプとして扱うパスの接頭辞
pub const DEFAULT_PIPE_PREFIX: &str = "/pipe/";

/// 実行可能イメージの拡張子
pub const DEFAULT_EXECUTABLE_SUFFIX: &str = ".coff";

/// 同時に存在できるプロセス数のデフォルト
pub const DEFAULT_MAX_PROCESSES: usize = 64;

/// pid の上限 (この値に達すると 0 に戻る)
pub const DEFAULT_PID_LIMIT: u32 = 32768;

/// 実行キューのデフォルトサイズ
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 256;

/// カーネル設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// プロセスあたりのディスクリプタ数 (stdin/stdout を含む)
    pub fd_table_size: usize,
    /// 同時に存在できるパイプ数
    pub max_pipes: usize,
    /// パイプバッファの容量 (2 のべき乗)
    pub pipe_capacity: usize,
    /// パイプとして扱うパスの接頭辞
    pub pipe_prefix: &'static str,
    /// 実行可能イメージの拡張子
    pub executable_suffix: &'static str,
    /// 引数ページの大きさ (各引数は 4 + len + 1 バイトを消費)
    pub max_arg_bytes: usize,
    /// 同時に存在できるプロセス数 (join 待ちのレコードを含む)
    pub max_processes: usize,
    /// pid の上限
    pub pid_limit: u32,
    /// executor の実行キュー容量
    pub task_queue_capacity: usize,
}

impl KernelConfig {
    /// デフォルト設定
    pub const DEFAULT: Self = Self::new();

    /// デフォルト値で設定を作成
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fd_table_size: DEFAULT_FD_TABLE_SIZE,
            max_pipes: DEFAULT_MAX_PIPES,
            pipe_capacity: PAGE_SIZE,
            pipe_prefix: DEFAULT_PIPE_PREFIX,
            executable_suffix: DEFAULT_EXECUTABLE_SUFFIX,
            max_arg_bytes: PAGE_SIZE,
            max_processes: DEFAULT_MAX_PROCESSES,
            pid_limit: DEFAULT_PID_LIMIT,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
        }
    }

    /// ディスクリプタテーブルのサイズを設定
    #[must_use]
    pub const fn with_fd_table_size(mut self, size: usize) -> Self {
        self.fd_table_size = size;
        self
    }

    /// パイプ数の上限を設定
    #[must_use]
    pub const fn with_max_pipes(mut self, max: usize) -> Self {
        self.max_pipes = max;
        self
    }

    /// パイプ容量を設定
    #[must_use]
    pub const fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    /// パイプ接頭辞を設定
    #[must_use]
    pub const fn with_pipe_prefix(mut self, prefix: &'static str) -> Self {
        self.pipe_prefix = prefix;
        self
    }

    /// 実行可能イメージの拡張子を設定
    #[must_use]
    pub const fn with_executable_suffix(mut self, suffix: &'static str) -> Self {
        self.executable_suffix = suffix;
        self
    }

    /// 引数ページの大きさを設定
    #[must_use]
    pub const fn with_max_arg_bytes(mut self, bytes: usize) -> Self {
        self.max_arg_bytes = bytes;
        self
    }

    /// プロセス数の上限を設定
    #[must_use]
    pub const fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = max;
        self
    }

    /// pid の上限を設定
    #[must_use]
    pub const fn with_pid_limit(mut self, limit: u32) -> Self {
        self.pid_limit = limit;
        self
    }

    /// 実行キュー容量を設定
    #[must_use]
    pub const fn with_task_queue_capacity(mut self, capacity: usize) -> Self {
        self.task_queue_capacity = capacity;
        self
    }

    /// 設定値の整合性を検証
    ///
    /// # Errors
    ///
    /// - `DescriptorTableTooSmall` - stdin/stdout の 2 スロットを確保できない
    /// - `InvalidPipeCapacity` - パイプ容量が 0 または 2 のべき乗でない
    /// - `EmptyPipePrefix` - パイプ接頭辞が空
    /// - `InvalidProcessLimit` - プロセス数が 0、pid 空間や実行キューに収まらない
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.fd_table_size < 2 {
            return Err(ConfigError::DescriptorTableTooSmall);
        }
        if self.pipe_capacity == 0 || !self.pipe_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidPipeCapacity);
        }
        if self.pipe_prefix.is_empty() {
            return Err(ConfigError::EmptyPipePrefix);
        }
        // 各タスクは実行キューに高々 1 回しか入らない
        if self.max_processes == 0
            || self.max_processes > self.pid_limit as usize
            || self.max_processes > self.task_queue_capacity
        {
            return Err(ConfigError::InvalidProcessLimit);
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
