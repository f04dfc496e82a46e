//! カーネル共通型定義

use core::fmt;

/// プロセス ID
///
/// 単調増加で割り当てられ、上限に達すると 0 に戻る。
/// レコードが残っている pid は再利用されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    /// ルートプロセス (最初に起動されるプロセス) の ID
    pub const ROOT: Self = Self(0);

    /// 新しいプロセス ID を作成
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// ユーザー空間から渡された値を検証して変換
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw < 0 || raw > u32::MAX as i64 {
            None
        } else {
            Some(Self(raw as u32))
        }
    }

    /// ID を取得
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// システムコールの戻り値としての表現
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID({})", self.0)
    }
}

/// ファイルシステム上のファイル実体の ID (inode 相当)
///
/// 名前 (パス) とは独立しており、unlink 後も開いている間は有効。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FileId(u64);

impl FileId {
    /// 新しいファイル ID を作成
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// ID を取得
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}
