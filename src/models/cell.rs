use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// 单元格标识
///
/// 同一个任务内唯一，检查点以 `key()` 作为记录键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    /// 工作表标识
    pub sheet: String,
    /// 行号（数据行，从 0 开始）
    pub row: usize,
    /// 列号（源文本所在列，从 0 开始）
    pub column: usize,
}

impl CellId {
    pub fn new(sheet: impl Into<String>, row: usize, column: usize) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            column,
        }
    }

    /// 检查点记录键，例如 `Sheet1!R3C0`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!R{}C{}", self.sheet, self.row, self.column)
    }
}

/// 单元格状态
///
/// `Pending → InFlight → Translated | Failed`，缓存命中时 `Pending → Translated`。
/// `InFlight` 只存在于内存中，不会写入检查点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Pending,
    InFlight,
    Translated,
    Failed,
    Skipped,
}

impl CellStatus {
    /// 是否为可以持久化的终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CellStatus::Translated | CellStatus::Failed | CellStatus::Skipped
        )
    }
}

impl Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CellStatus::Pending => "pending",
            CellStatus::InFlight => "in_flight",
            CellStatus::Translated => "translated",
            CellStatus::Failed => "failed",
            CellStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// 待翻译的单元格
#[derive(Debug, Clone)]
pub struct CellUnit {
    pub id: CellId,
    pub source_text: String,
    pub status: CellStatus,
}

impl CellUnit {
    pub fn new(id: CellId, source_text: impl Into<String>) -> Self {
        Self {
            id,
            source_text: source_text.into(),
            status: CellStatus::Pending,
        }
    }
}

/// 译文来源，用于统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOrigin {
    /// 之前的运行已完成
    Checkpoint,
    /// 缓存命中
    Cache,
    /// 本次调用翻译接口（或术语完全替换）得到
    Remote,
    /// 空单元格
    Empty,
}

/// 翻译结果
#[derive(Debug, Clone)]
pub struct CellOutput {
    pub id: CellId,
    /// 译文；失败时为错误标记
    pub text: String,
    pub status: CellStatus,
    pub origin: OutputOrigin,
    pub last_error: Option<String>,
}

/// 放弃翻译的单元格，写入失败报告
#[derive(Debug, Clone)]
pub struct FailedCell {
    pub id: CellId,
    pub error: String,
    /// 累计尝试次数
    pub attempts: u32,
}

/// 失败单元格的错误标记
pub fn failure_marker(error: &str) -> String {
    let short: String = error.chars().take(50).collect();
    format!("[翻译失败: {}]", short)
}
