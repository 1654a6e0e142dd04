//! 单元格处理上下文
//!
//! 封装“我正在处理哪个任务的哪个单元格”这一信息

use std::fmt::Display;

use crate::models::CellId;

/// 单元格处理上下文
#[derive(Debug, Clone)]
pub struct CellCtx {
    /// 任务ID
    pub job_id: String,

    /// 代表单元格（同一原文的多个单元格共用一次翻译）
    pub cell: CellId,

    /// 在本次待翻译文本中的序号（从1开始，仅用于日志显示）
    pub position: usize,

    /// 本次待翻译文本总数
    pub total: usize,

    /// 共用这次翻译的单元格数量
    pub group_size: usize,
}

impl CellCtx {
    pub fn new(job_id: impl Into<String>, cell: CellId, position: usize, total: usize) -> Self {
        Self {
            job_id: job_id.into(),
            cell,
            position,
            total,
            group_size: 1,
        }
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }
}

impl Display for CellCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[任务 {} 单元格 {} #{}/{}]",
            self.job_id, self.cell, self.position, self.total
        )
    }
}
