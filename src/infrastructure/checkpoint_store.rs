//! 检查点 - 基础设施层
//!
//! 每个任务一个 JSON 文件（`<job_id>.checkpoint.json`），记录每个单元格的终态。
//!
//! ## 持久化规则
//!
//! - 只保存终态（translated / failed / skipped），`in_flight` 永远不落盘
//! - 保存时先写临时文件再改名，中途被杀掉也不会留下半个文件
//! - 每完成 N 个单元格或距上次保存超过固定时间，二者先到者触发保存

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::models::{CellId, CellStatus};

/// 单个单元格的检查点记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub status: CellStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// 累计尝试次数（跨多次运行）
    #[serde(default)]
    pub attempt_count: u32,
    pub updated_at: DateTime<Local>,
}

impl CellRecord {
    pub fn translated(text: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            status: CellStatus::Translated,
            translated_text: Some(text.into()),
            last_error: None,
            attempt_count,
            updated_at: Local::now(),
        }
    }

    pub fn failed(error: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            status: CellStatus::Failed,
            translated_text: None,
            last_error: Some(error.into()),
            attempt_count,
            updated_at: Local::now(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: CellStatus::Skipped,
            translated_text: None,
            last_error: None,
            attempt_count: 0,
            updated_at: Local::now(),
        }
    }
}

/// 任务进度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: usize,
    /// 已完成（translated + skipped）
    pub done: usize,
    pub failed: usize,
}

impl JobProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// 检查点文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub job_id: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    pub progress: JobProgress,
    #[serde(default)]
    pub cells: BTreeMap<String, CellRecord>,
}

impl CheckpointState {
    fn new(job_id: &str) -> Self {
        let now = Local::now();
        Self {
            job_id: job_id.to_string(),
            created_at: now,
            updated_at: now,
            progress: JobProgress::default(),
            cells: BTreeMap::new(),
        }
    }

    fn recount(&mut self) {
        let mut done = 0;
        let mut failed = 0;
        for record in self.cells.values() {
            match record.status {
                CellStatus::Translated | CellStatus::Skipped => done += 1,
                CellStatus::Failed => failed += 1,
                _ => {}
            }
        }
        self.progress.done = done;
        self.progress.failed = failed;
    }
}

/// 上次运行留下的进度
#[derive(Debug, Clone)]
pub struct ResumeInfo {
    pub saved_at: DateTime<Local>,
    pub progress: JobProgress,
}

/// 保存策略
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    /// 每记录多少个单元格保存一次
    pub every_cells: usize,
    /// 距上次保存的最长时间
    pub interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            every_cells: 5,
            interval: Duration::from_secs(30),
        }
    }
}

struct Inner {
    state: CheckpointState,
    unflushed: usize,
    last_flush: Instant,
    resumed: Option<ResumeInfo>,
}

/// 检查点存储
///
/// 由创建它的任务独占；内部锁保证多个工作协程同时记录时不会写坏文件
pub struct CheckpointStore {
    path: Option<PathBuf>,
    policy: FlushPolicy,
    inner: Mutex<Inner>,
}

impl CheckpointStore {
    /// 检查点文件路径
    pub fn file_path(dir: &Path, job_id: &str) -> PathBuf {
        dir.join(format!("{}.checkpoint.json", job_id))
    }

    /// 不落盘的检查点
    pub fn in_memory(job_id: &str, policy: FlushPolicy) -> Self {
        Self::with_state(None, policy, CheckpointState::new(job_id), None)
    }

    fn with_state(
        path: Option<PathBuf>,
        policy: FlushPolicy,
        state: CheckpointState,
        resumed: Option<ResumeInfo>,
    ) -> Self {
        Self {
            path,
            policy,
            inner: Mutex::new(Inner {
                state,
                unflushed: 0,
                last_flush: Instant::now(),
                resumed,
            }),
        }
    }

    /// 打开任务的检查点，不存在时从空状态开始
    ///
    /// 无法解析的文件会被改名为 `.corrupt` 保留，然后从空状态开始
    pub async fn open(
        dir: impl AsRef<Path>,
        job_id: &str,
        policy: FlushPolicy,
    ) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .map_err(|e| PersistenceError::write(dir, e))?;

        let path = Self::file_path(dir, job_id);
        if !fs::try_exists(&path)
            .await
            .map_err(|e| PersistenceError::read(&path, e))?
        {
            debug!("[{}] 没有检查点，从头开始", job_id);
            return Ok(Self::with_state(
                Some(path),
                policy,
                CheckpointState::new(job_id),
                None,
            ));
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| PersistenceError::read(&path, e))?;

        let mut state = match serde_json::from_str::<CheckpointState>(&content) {
            Ok(state) => state,
            Err(e) => {
                let corrupt = path.with_extension("json.corrupt");
                warn!(
                    "⚠️ 检查点文件无法解析 ({}): {}，已另存为 {}",
                    path.display(),
                    e,
                    corrupt.display()
                );
                fs::rename(&path, &corrupt)
                    .await
                    .map_err(|e| PersistenceError::write(&path, e))?;
                return Ok(Self::with_state(
                    Some(path),
                    policy,
                    CheckpointState::new(job_id),
                    None,
                ));
            }
        };

        // 非终态的记录视为未开始
        let before = state.cells.len();
        state.cells.retain(|_, record| record.status.is_terminal());
        if state.cells.len() < before {
            debug!(
                "[{}] {} 条未完成记录恢复为待处理",
                job_id,
                before - state.cells.len()
            );
        }
        state.job_id = job_id.to_string();
        state.recount();

        let resumed = ResumeInfo {
            saved_at: state.updated_at,
            progress: state.progress,
        };

        Ok(Self::with_state(Some(path), policy, state, Some(resumed)))
    }

    /// 上次运行留下的进度（没有检查点时为 None）
    pub async fn resume_info(&self) -> Option<ResumeInfo> {
        self.inner.lock().await.resumed.clone()
    }

    pub async fn lookup(&self, id: &CellId) -> Option<CellRecord> {
        self.inner.lock().await.state.cells.get(&id.key()).cloned()
    }

    pub async fn set_total(&self, total: usize) {
        self.inner.lock().await.state.progress.total = total;
    }

    /// 记录单元格结果，同一单元格以最后一次为准
    ///
    /// 非终态会清除已有记录，使该单元格重新回到待处理
    pub async fn record(&self, id: &CellId, record: CellRecord) {
        let mut inner = self.inner.lock().await;
        if record.status.is_terminal() {
            inner.state.cells.insert(id.key(), record);
        } else {
            inner.state.cells.remove(&id.key());
        }
        inner.state.recount();
        inner.unflushed += 1;
    }

    pub async fn progress(&self) -> JobProgress {
        self.inner.lock().await.state.progress
    }

    /// 是否达到保存条件
    pub async fn should_flush(&self) -> bool {
        let inner = self.inner.lock().await;
        Self::due(&inner, &self.policy)
    }

    fn due(inner: &Inner, policy: &FlushPolicy) -> bool {
        inner.unflushed > 0
            && (inner.unflushed >= policy.every_cells
                || inner.last_flush.elapsed() >= policy.interval)
    }

    /// 达到保存条件时保存，返回是否真的写了文件
    pub async fn maybe_flush(&self) -> Result<bool, PersistenceError> {
        let mut inner = self.inner.lock().await;
        if !Self::due(&inner, &self.policy) {
            return Ok(false);
        }
        self.write_locked(&mut inner).await?;
        Ok(true)
    }

    /// 立即保存
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().await;
        self.write_locked(&mut inner).await
    }

    async fn write_locked(&self, inner: &mut Inner) -> Result<(), PersistenceError> {
        inner.state.updated_at = Local::now();

        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&inner.state)
                .map_err(|e| PersistenceError::serialize(path, e))?;

            let tmp = path.with_extension("json.tmp");
            let mut file = fs::File::create(&tmp)
                .await
                .map_err(|e| PersistenceError::write(&tmp, e))?;
            file.write_all(json.as_bytes())
                .await
                .map_err(|e| PersistenceError::write(&tmp, e))?;
            file.sync_all()
                .await
                .map_err(|e| PersistenceError::write(&tmp, e))?;
            drop(file);

            fs::rename(&tmp, path)
                .await
                .map_err(|e| PersistenceError::write(path, e))?;

            debug!(
                "💾 检查点已保存: {}/{} ({})",
                inner.state.progress.done,
                inner.state.progress.total,
                path.display()
            );
        }

        inner.unflushed = 0;
        inner.last_flush = Instant::now();
        Ok(())
    }

    /// 任务结束
    ///
    /// `archive` 为 true 时把检查点改名为 `.checkpoint.done.json`；
    /// 否则保留检查点，下次运行只处理失败和未完成的单元格
    pub async fn complete(&self, archive: bool) -> Result<(), PersistenceError> {
        self.flush().await?;

        if let (true, Some(path)) = (archive, &self.path) {
            let done = path.with_extension("done.json");
            fs::rename(path, &done)
                .await
                .map_err(|e| PersistenceError::write(path, e))?;
            info!("🗂️ 检查点已归档: {}", done.display());
        }
        Ok(())
    }

    /// 清空检查点并删除文件
    pub async fn reset(&self) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().await;
        let job_id = inner.state.job_id.clone();
        inner.state = CheckpointState::new(&job_id);
        inner.unflushed = 0;
        inner.resumed = None;

        if let Some(path) = &self.path {
            if fs::try_exists(path)
                .await
                .map_err(|e| PersistenceError::read(path, e))?
            {
                fs::remove_file(path)
                    .await
                    .map_err(|e| PersistenceError::write(path, e))?;
            }
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize) -> CellId {
        CellId::new("job", row, 0)
    }

    fn policy(every_cells: usize) -> FlushPolicy {
        FlushPolicy {
            every_cells,
            interval: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_record_latest_wins_and_counts() {
        let store = CheckpointStore::in_memory("job", policy(10));
        store.set_total(2).await;

        store.record(&cell(0), CellRecord::failed("429", 3)).await;
        assert_eq!(store.progress().await.failed, 1);

        store.record(&cell(0), CellRecord::translated("Hello", 4)).await;
        store.record(&cell(1), CellRecord::skipped()).await;

        let progress = store.progress().await;
        assert_eq!(progress.done, 2);
        assert_eq!(progress.failed, 0);
        assert_eq!(store.lookup(&cell(0)).await.unwrap().attempt_count, 4);
    }

    #[tokio::test]
    async fn test_flush_after_n_cells() {
        let store = CheckpointStore::in_memory("job", policy(2));
        store.record(&cell(0), CellRecord::translated("a", 1)).await;
        assert!(!store.maybe_flush().await.unwrap());
        store.record(&cell(1), CellRecord::translated("b", 1)).await;
        assert!(store.maybe_flush().await.unwrap());
        assert!(!store.should_flush().await);
    }

    #[tokio::test]
    async fn test_flush_after_interval() {
        let store = CheckpointStore::in_memory(
            "job",
            FlushPolicy {
                every_cells: 100,
                interval: Duration::ZERO,
            },
        );
        assert!(!store.should_flush().await);
        store.record(&cell(0), CellRecord::translated("a", 1)).await;
        assert!(store.should_flush().await);
    }

    #[tokio::test]
    async fn test_reload_keeps_only_flushed_terminal_records() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CheckpointStore::open(dir.path(), "job", policy(10))
                .await
                .unwrap();
            store.set_total(3).await;
            store.record(&cell(0), CellRecord::translated("Hello", 1)).await;
            store.record(&cell(1), CellRecord::failed("超时", 3)).await;
            store.flush().await.unwrap();
            // 未保存
            store.record(&cell(2), CellRecord::translated("World", 1)).await;
        }

        let store = CheckpointStore::open(dir.path(), "job", policy(10))
            .await
            .unwrap();
        let info = store.resume_info().await.unwrap();
        assert_eq!(info.progress.done, 1);
        assert_eq!(info.progress.failed, 1);
        assert_eq!(
            store.lookup(&cell(0)).await.unwrap().translated_text.as_deref(),
            Some("Hello")
        );
        assert_eq!(
            store.lookup(&cell(1)).await.unwrap().status,
            CellStatus::Failed
        );
        assert!(store.lookup(&cell(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_on_disk_reverts_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = CheckpointStore::file_path(dir.path(), "job");

        let mut state = CheckpointState::new("job");
        state.cells.insert(
            cell(0).key(),
            CellRecord {
                status: CellStatus::InFlight,
                translated_text: None,
                last_error: None,
                attempt_count: 1,
                updated_at: Local::now(),
            },
        );
        std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let store = CheckpointStore::open(dir.path(), "job", policy(10))
            .await
            .unwrap();
        assert!(store.lookup(&cell(0)).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = CheckpointStore::file_path(dir.path(), "job");
        std::fs::write(&path, "{ not json").unwrap();

        let store = CheckpointStore::open(dir.path(), "job", policy(10))
            .await
            .unwrap();
        assert!(store.resume_info().await.is_none());
        assert!(path.with_extension("json.corrupt").exists());
    }

    #[tokio::test]
    async fn test_complete_archives_and_reset_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = CheckpointStore::file_path(dir.path(), "job");

        let store = CheckpointStore::open(dir.path(), "job", policy(10))
            .await
            .unwrap();
        store.record(&cell(0), CellRecord::translated("a", 1)).await;
        store.complete(true).await.unwrap();
        assert!(!path.exists());
        assert!(dir.path().join("job.checkpoint.done.json").exists());

        let store = CheckpointStore::open(dir.path(), "job", policy(10))
            .await
            .unwrap();
        store.record(&cell(0), CellRecord::failed("x", 1)).await;
        store.complete(false).await.unwrap();
        assert!(path.exists());

        store.reset().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.progress().await.failed, 0);
    }
}
