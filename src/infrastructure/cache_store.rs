//! 翻译缓存 - 基础设施层
//!
//! 以“规范化原文 + 术语表版本 + 翻译方向”的指纹为键保存译文，
//! 多个任务共享同一个缓存文件。
//!
//! 文件格式为 JSON Lines，只追加不改写；
//! 同一个指纹出现多次时以最后一行为准，异常中断留下的残缺行在加载时跳过。
//! 写入被取消时，下一次追加会先补一个换行，残缺内容独占一行。

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::models::LanguagePair;

/// 缓存指纹
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 计算指纹
    ///
    /// 术语表变化会改变版本号，从而自动让旧缓存失效
    pub fn compute(source_text: &str, glossary_version: &str, pair: LanguagePair) -> Self {
        let normalized = normalize_text(source_text);

        let mut hasher = blake3::Hasher::new();
        hasher.update(pair.source.code().as_bytes());
        hasher.update(b">");
        hasher.update(pair.target.code().as_bytes());
        hasher.update(&[0]);
        hasher.update(glossary_version.as_bytes());
        hasher.update(&[0]);
        hasher.update(normalized.as_bytes());
        Fingerprint(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}

/// 规范化原文：去掉首尾空白，统一换行，合并连续的空格和制表符
pub fn normalize_text(text: &str) -> String {
    let text = text.trim().replace("\r\n", "\n");
    let mut out = String::with_capacity(text.len());
    let mut in_blank = false;
    for ch in text.chars() {
        if ch == ' ' || ch == '\t' {
            if !in_blank {
                out.push(' ');
            }
            in_blank = true;
        } else {
            out.push(ch);
            in_blank = false;
        }
    }
    out
}

/// 缓存文件中的一行
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheLine {
    fingerprint: String,
    translated_text: String,
    created_at: i64,
}

/// 追加写入的文件句柄
struct CacheWriter {
    file: BufWriter<fs::File>,
    /// 上一行可能没有写完整
    line_open: bool,
}

impl CacheWriter {
    async fn append_line(&mut self, line: &str) -> std::io::Result<()> {
        if self.line_open {
            self.file.write_all(b"\n").await?;
        }
        self.line_open = true;
        self.file.write_all(line.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.line_open = false;
        Ok(())
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// 翻译缓存
///
/// 读操作可以并发；写操作通过文件句柄上的锁串行化
pub struct TranslationCache {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<String, String>>,
    writer: Mutex<Option<CacheWriter>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TranslationCache {
    /// 不落盘的缓存
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
            writer: Mutex::new(None),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// 打开缓存文件，不存在时创建
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::write(parent, e))?;
        }

        let mut entries = HashMap::new();
        let mut line_open = false;
        if fs::try_exists(&path)
            .await
            .map_err(|e| PersistenceError::read(&path, e))?
        {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| PersistenceError::read(&path, e))?;

            line_open = !content.is_empty() && !content.ends_with('\n');

            let mut skipped = 0;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<CacheLine>(line) {
                    Ok(entry) => {
                        entries.insert(entry.fingerprint, entry.translated_text);
                    }
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                warn!("⚠️ 缓存文件中有 {} 行无法解析，已跳过: {}", skipped, path.display());
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PersistenceError::write(&path, e))?;

        debug!("缓存已加载: {} 条 ({})", entries.len(), path.display());

        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
            writer: Mutex::new(Some(CacheWriter {
                file: BufWriter::new(file),
                line_open,
            })),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        })
    }

    /// 查询缓存
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        let found = self.entries.read().await.get(fingerprint.as_str()).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// 写入缓存（同一个键以最后一次写入为准）
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        translated_text: &str,
    ) -> Result<(), PersistenceError> {
        let mut writer = self.writer.lock().await;

        if let (Some(w), Some(path)) = (writer.as_mut(), self.path.as_ref()) {
            let line = CacheLine {
                fingerprint: fingerprint.as_str().to_string(),
                translated_text: translated_text.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            };
            let json =
                serde_json::to_string(&line).map_err(|e| PersistenceError::serialize(path, e))?;
            w.append_line(&json)
                .await
                .map_err(|e| PersistenceError::write(path, e))?;
        }

        self.entries
            .write()
            .await
            .insert(fingerprint.as_str().to_string(), translated_text.to_string());
        Ok(())
    }

    /// 把缓冲区写入磁盘
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let mut writer = self.writer.lock().await;
        if let (Some(w), Some(path)) = (writer.as_mut(), self.path.as_ref()) {
            w.file
                .flush()
                .await
                .map_err(|e| PersistenceError::write(path, e))?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
