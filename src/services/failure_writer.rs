//! 失败报告写入服务 - 业务能力层
//!
//! 只负责“把翻译失败的单元格追加到报告文件”能力，不关心流程

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::FailedCell;

/// 失败报告写入服务
///
/// 每行一个单元格，便于人工核对后重新运行
pub struct FailureWriter {
    report_file_path: String,
}

impl FailureWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            report_file_path: path.into(),
        }
    }

    /// 追加一个任务的失败单元格
    pub async fn write(&self, job_id: &str, failed: &[FailedCell]) -> Result<()> {
        if failed.is_empty() {
            return Ok(());
        }
        debug!(
            "写入失败报告: 任务 {} | {} 个单元格 -> {}",
            job_id,
            failed.len(),
            self.report_file_path
        );

        let mut content = String::new();
        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        for cell in failed {
            content.push_str(&format!(
                "{} | 任务 {} | 单元格 {} | 尝试 {} 次 | 错误: {}\n",
                time,
                job_id,
                cell.id,
                cell.attempts,
                cell.error.replace('\n', " ")
            ));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_file_path)
            .await
            .with_context(|| format!("无法打开失败报告: {}", self.report_file_path))?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
