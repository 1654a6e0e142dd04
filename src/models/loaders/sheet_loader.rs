use crate::error::{AppResult, ConfigError, PersistenceError};
use crate::models::{CellId, CellOutput, CellUnit, Language, LanguagePair};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 输出文件名后缀
pub const TRANSLATED_SUFFIX: &str = "_translated";

/// 双语表格（CSV）
///
/// 第一列和第二列分别是两种语言，表头决定哪一列是中文。
/// 只有目标列为空的行才需要翻译，已有译文的单元格原样保留。
#[derive(Debug, Clone)]
pub struct BilingualSheet {
    path: PathBuf,
    job_id: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    pair: LanguagePair,
    source_col: usize,
    target_col: usize,
}

impl BilingualSheet {
    /// 读取表格
    ///
    /// `pair` 为 None 时根据表头检测翻译方向
    pub async fn load(path: &Path, pair: Option<LanguagePair>) -> AppResult<Self> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| PersistenceError::read(path, e))?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|e| PersistenceError::sheet(path, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches('\u{feff}').to_string();
        }

        if headers.len() < 2 {
            return Err(ConfigError::invalid_sheet(path, "至少需要两列（原文和译文）").into());
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| PersistenceError::sheet(path, e))?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            if row.len() < 2 {
                row.resize(2, String::new());
            }
            rows.push(row);
        }

        let first_lang = header_language(&headers[0]).unwrap_or(Language::Zh);
        let pair = match pair {
            Some(pair) => pair,
            None => detect_pair(&headers[0]),
        };
        let (source_col, target_col) = if pair.source == first_lang {
            (0, 1)
        } else {
            (1, 0)
        };

        let job_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "sheet".to_string());

        Ok(Self {
            path: path.to_path_buf(),
            job_id,
            headers,
            rows,
            pair,
            source_col,
            target_col,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn pair(&self) -> LanguagePair {
        self.pair
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_column(&self) -> usize {
        self.source_col
    }

    /// 目标列为空的行，按表格顺序
    pub fn pending_cells(&self) -> Vec<CellUnit> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[self.target_col].trim().is_empty())
            .map(|(i, row)| {
                CellUnit::new(
                    CellId::new(&self.job_id, i, self.source_col),
                    row[self.source_col].clone(),
                )
            })
            .collect()
    }

    /// 把译文写回目标列
    pub fn apply_outputs(&mut self, outputs: &[CellOutput]) {
        for output in outputs {
            if let Some(row) = self.rows.get_mut(output.id.row) {
                row[self.target_col] = output.text.clone();
            }
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
    }

    /// 写出表格
    pub async fn write(&self, path: &Path) -> AppResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer
            .write_record(&self.headers)
            .map_err(|e| PersistenceError::sheet(path, e))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| PersistenceError::sheet(path, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PersistenceError::write(path, e.into_error()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::write(parent, e))?;
        }
        fs::write(path, bytes)
            .await
            .map_err(|e| PersistenceError::write(path, e))?;
        Ok(())
    }

    /// 输出文件路径：`<output_dir>/<原文件名>_translated.csv`
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}{}.csv", self.job_id, TRANSLATED_SUFFIX))
    }
}

/// 识别表头中的语言
pub fn header_language(header: &str) -> Option<Language> {
    let lower = header.trim().to_lowercase();
    if lower.contains("中文") || lower.contains("chinese") {
        return Some(Language::Zh);
    }
    if lower.contains("英文") || lower.contains("english") {
        return Some(Language::En);
    }
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| match token {
            "zh" | "cn" => Some(Language::Zh),
            "en" => Some(Language::En),
            _ => None,
        })
}

/// 根据第一列表头检测翻译方向（第一列 → 第二列）
///
/// 无法识别时按第一列为中文处理
pub fn detect_pair(first_header: &str) -> LanguagePair {
    match header_language(first_header) {
        Some(Language::En) => LanguagePair::EN_TO_ZH,
        _ => LanguagePair::ZH_TO_EN,
    }
}

/// 扫描文件夹中待翻译的 CSV 文件（跳过已输出的译文文件）
pub async fn find_sheets(folder_path: &str) -> Result<Vec<PathBuf>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut sheets = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let is_output = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.ends_with(TRANSLATED_SUFFIX));

        if is_csv && !is_output {
            tracing::info!(
                "发现表格: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            sheets.push(path);
        }
    }

    sheets.sort();
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellStatus, OutputOrigin};

    async fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).await.unwrap();
        path
    }

    #[test]
    fn test_detect_pair_from_header() {
        assert_eq!(detect_pair("中文"), LanguagePair::ZH_TO_EN);
        assert_eq!(detect_pair("English Text"), LanguagePair::EN_TO_ZH);
        assert_eq!(detect_pair("source_en"), LanguagePair::EN_TO_ZH);
        assert_eq!(detect_pair("原文"), LanguagePair::ZH_TO_EN);
        assert_eq!(header_language("Token"), None);
    }

    #[tokio::test]
    async fn test_pending_cells_only_for_empty_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "manual.csv",
            "\u{feff}中文,英文\n你好,Hello\n服务器,\n,\n",
        )
        .await;

        let sheet = BilingualSheet::load(&path, None).await.unwrap();
        assert_eq!(sheet.job_id(), "manual");
        assert_eq!(sheet.pair(), LanguagePair::ZH_TO_EN);

        let cells = sheet.pending_cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].id, CellId::new("manual", 1, 0));
        assert_eq!(cells[0].source_text, "服务器");
        assert_eq!(cells[1].source_text, "");
    }

    #[tokio::test]
    async fn test_override_picks_source_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "a.csv", "中文,英文\n,Hello\n").await;

        let sheet = BilingualSheet::load(&path, Some(LanguagePair::EN_TO_ZH))
            .await
            .unwrap();
        let cells = sheet.pending_cells();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].id.column, 1);
        assert_eq!(cells[0].source_text, "Hello");
    }

    #[tokio::test]
    async fn test_single_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "中文\n你好\n").await;

        let err = BilingualSheet::load(&path, None).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Config(ConfigError::InvalidSheet { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_and_write_preserves_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "b.csv", "中文,英文\n你好,Hi there\n服务器,\n").await;

        let mut sheet = BilingualSheet::load(&path, None).await.unwrap();
        sheet.apply_outputs(&[CellOutput {
            id: CellId::new("b", 1, 0),
            text: "server".to_string(),
            status: CellStatus::Translated,
            origin: OutputOrigin::Remote,
            last_error: None,
        }]);

        let out = sheet.output_path(&dir.path().join("out"));
        sheet.write(&out).await.unwrap();

        let written = BilingualSheet::load(&out, None).await.unwrap();
        assert_eq!(written.cell(0, 1), Some("Hi there"));
        assert_eq!(written.cell(1, 1), Some("server"));
        assert!(written.pending_cells().is_empty());
    }

    #[tokio::test]
    async fn test_find_sheets_skips_outputs() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "a.csv", "中文,英文\n").await;
        write_csv(dir.path(), "a_translated.csv", "中文,英文\n").await;
        write_csv(dir.path(), "notes.txt", "x").await;

        let sheets = find_sheets(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].ends_with("a.csv"));
    }
}
