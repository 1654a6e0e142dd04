//! 批量表格处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量表格的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、打开缓存、加载术语表、创建翻译客户端
//! 2. **批量加载**：扫描输入目录中所有待翻译的表格
//! 3. **逐表处理**：每张表格是一个任务，拥有自己的检查点
//! 4. **中断处理**：Ctrl-C 时保存检查点和缓存后退出，下次运行从断点继续
//! 5. **结果输出**：写出译文表格、失败报告和统计信息
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有缓存和翻译客户端的模块
//! - **向下委托**：单张表格的单元格调度交给 `job_processor::Pipeline`

use crate::clients::{OpenAiTranslator, TranslationClient};
use crate::config::Config;
use crate::infrastructure::{CheckpointStore, FlushPolicy, TranslationCache};
use crate::models::{find_sheets, load_glossary, BilingualSheet, LanguagePair, TerminologyEntry};
use crate::orchestrator::job_processor::{JobReport, Pipeline};
use crate::services::{FailureWriter, TerminologyIndex};
use crate::utils::logging::{
    log_job_start, log_resume, log_sheets_loaded, log_startup, print_final_stats,
    print_job_stats,
};
use crate::workflow::{Sleeper, TokioSleeper};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 单张表格的处理结果
#[derive(Debug)]
pub enum SheetOutcome {
    /// 正常结束（可能有失败的单元格）
    Completed {
        report: JobReport,
        output_path: PathBuf,
    },
    /// 被 Ctrl-C 中断，检查点已保存
    Interrupted { job_id: String },
}

/// 整体运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// 没有失败单元格的表格
    pub success: usize,
    /// 有失败单元格的表格
    pub failed: usize,
    pub interrupted: bool,
}

/// 应用主结构
pub struct App {
    config: Config,
    cache: Arc<TranslationCache>,
    glossary: Vec<TerminologyEntry>,
    client: Arc<dyn TranslationClient>,
    sleeper: Arc<dyn Sleeper>,
    failure_writer: FailureWriter,
}

impl App {
    /// 初始化应用（使用 OpenAI 兼容接口）
    pub async fn initialize(config: Config) -> Result<Self> {
        let client: Arc<dyn TranslationClient> = Arc::new(OpenAiTranslator::new(&config));
        Self::with_client(config, client, Arc::new(TokioSleeper)).await
    }

    /// 使用指定的翻译客户端初始化应用
    pub async fn with_client(
        config: Config,
        client: Arc<dyn TranslationClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        log_startup(&config);

        let cache = TranslationCache::open(config.cache_path())
            .await
            .context("无法打开翻译缓存")?;
        info!("🗃️ 缓存已加载: {} 条", cache.len().await);

        let glossary = match &config.glossary_file {
            Some(path) => {
                let entries = load_glossary(Path::new(path)).await?;
                // 两个方向都要校验，避免处理到一半才发现术语表有问题
                for pair in [LanguagePair::ZH_TO_EN, LanguagePair::EN_TO_ZH] {
                    TerminologyIndex::load_for(entries.clone(), pair)?;
                }
                entries
            }
            None => Vec::new(),
        };

        let failure_writer = FailureWriter::with_path(config.failure_report_file.clone());

        Ok(Self {
            config,
            cache: Arc::new(cache),
            glossary,
            client,
            sleeper,
            failure_writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        info!("\n📁 正在扫描待翻译的表格...");
        let sheets = find_sheets(&self.config.input_dir).await?;

        if sheets.is_empty() {
            warn!("⚠️ 没有找到待翻译的 CSV 文件，程序结束");
            return Ok(RunSummary::default());
        }

        let mut summary = RunSummary {
            total: sheets.len(),
            ..Default::default()
        };
        log_sheets_loaded(sheets.len(), self.glossary.len());

        for (idx, path) in sheets.iter().enumerate() {
            match self.process_sheet(path, idx + 1, sheets.len()).await? {
                SheetOutcome::Completed { report, .. } => {
                    if report.is_complete() {
                        summary.success += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                SheetOutcome::Interrupted { job_id } => {
                    warn!("⏸️ 已在任务 {} 中断，下次运行将从检查点继续", job_id);
                    summary.interrupted = true;
                    break;
                }
            }
        }

        print_final_stats(
            summary.success,
            summary.total - summary.success,
            summary.total,
            &self.config.output_log_file,
        );

        Ok(summary)
    }

    /// 处理单张表格，Ctrl-C 时保存进度后返回
    pub async fn process_sheet(
        &self,
        path: &Path,
        index: usize,
        total: usize,
    ) -> Result<SheetOutcome> {
        self.process_sheet_until(path, index, total, tokio::signal::ctrl_c())
            .await
    }

    /// 处理单张表格，`shutdown` 返回 `Ok(())` 时中断
    ///
    /// `shutdown` 返回错误（例如无法注册信号处理）时不中断，继续处理
    pub async fn process_sheet_until<F>(
        &self,
        path: &Path,
        index: usize,
        total: usize,
        shutdown: F,
    ) -> Result<SheetOutcome>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let mut sheet = BilingualSheet::load(path, self.config.language_pair()?)
            .await
            .with_context(|| format!("无法读取表格: {}", path.display()))?;
        let job_id = sheet.job_id().to_string();
        let pair = sheet.pair();

        log_job_start(index, total, &job_id, &pair.to_string());

        let terminology = TerminologyIndex::load_for(self.glossary.clone(), pair)?;

        let checkpoint = CheckpointStore::open(
            &self.config.cache_dir,
            &job_id,
            FlushPolicy {
                every_cells: self.config.flush_every_cells,
                interval: self.config.flush_interval(),
            },
        )
        .await?;

        if self.config.reset_checkpoint {
            info!("[任务 {}] 🧹 删除已有检查点", job_id);
            checkpoint.reset().await?;
        } else if let Some(resume) = checkpoint.resume_info().await {
            log_resume(&job_id, &resume);
        }

        let cells = sheet.pending_cells();
        let pipeline = Pipeline::new(
            &self.config,
            pair,
            Arc::new(terminology),
            self.cache.clone(),
            self.client.clone(),
            self.sleeper.clone(),
        );

        let report = tokio::select! {
            result = pipeline.run(&job_id, cells, &checkpoint) => result?,
            Ok(()) = shutdown => {
                warn!("[任务 {}] ⏹️ 收到中断信号，正在保存进度...", job_id);
                checkpoint.flush().await?;
                self.cache.flush().await?;
                let progress = checkpoint.progress().await;
                info!(
                    "[任务 {}] 💾 进度已保存: {}/{}",
                    job_id, progress.done, progress.total
                );
                return Ok(SheetOutcome::Interrupted { job_id: job_id.clone() });
            }
        };

        sheet.apply_outputs(&report.outputs);
        let output_path = sheet.output_path(Path::new(&self.config.output_dir));
        sheet.write(&output_path).await?;
        info!("[任务 {}] 📝 译文已写入: {}", job_id, output_path.display());

        checkpoint.complete(report.is_complete()).await?;
        if !report.is_complete() {
            self.failure_writer.write(&job_id, &report.failed).await?;
            warn!(
                "[任务 {}] ⚠️ {} 个单元格翻译失败，已记录到 {}，重新运行将只处理这些单元格",
                job_id,
                report.failed.len(),
                self.config.failure_report_file
            );
        }

        print_job_stats(&report, &self.cache.stats().await);

        Ok(SheetOutcome::Completed {
            report,
            output_path,
        })
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }
}
