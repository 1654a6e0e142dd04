use crate::error::{AppResult, ConfigError, PersistenceError};
use crate::models::TerminologyEntry;
use std::path::Path;
use tokio::fs;

/// 从 CSV 文件读取术语表
///
/// 第一行是表头，前两列分别是中文术语和英文术语，其余列忽略。
/// 整行为空的行跳过；只填了一列的行视为配置错误。
pub async fn load_glossary(path: &Path) -> AppResult<Vec<TerminologyEntry>> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| PersistenceError::read(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes.as_slice());

    let header_len = reader
        .headers()
        .map_err(|e| PersistenceError::sheet(path, e))?
        .len();
    if header_len < 2 {
        return Err(ConfigError::invalid_sheet(path, "术语表至少需要两列（中文、英文）").into());
    }

    let mut entries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PersistenceError::sheet(path, e))?;
        let zh = record.get(0).unwrap_or("").trim();
        let en = record.get(1).unwrap_or("").trim();

        match (zh.is_empty(), en.is_empty()) {
            (true, true) => continue,
            (false, false) => entries.push(TerminologyEntry::new(zh, en)),
            // 表头占第 1 行
            _ => return Err(ConfigError::EmptyTerm { row: i + 2 }.into()),
        }
    }

    tracing::info!("成功加载 {} 条术语: {}", entries.len(), path.display());
    Ok(entries)
}
