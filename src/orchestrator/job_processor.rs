//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 驱动一个任务（一张表格）的全部单元格：
//!
//! 1. 检查点中已完成的单元格直接输出
//! 2. 缓存命中的单元格记为已翻译，不调用接口
//! 3. 其余单元格按指纹分组，每组只翻译一次，由工作协程并发执行
//! 4. 结果写入缓存和检查点，按保存策略定期落盘
//! 5. 按原始顺序输出结果，失败的单元格输出错误标记
//!
//! ## 并发模型
//!
//! - 工作协程只负责调用 `CellFlow`，不接触缓存和检查点
//! - 所有写入都在主循环中完成，主循环是唯一的写入者
//! - Semaphore 限制同时进行的远程请求数量

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::clients::TranslationClient;
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{CellRecord, CheckpointStore, Fingerprint, TranslationCache};
use crate::models::{
    failure_marker, CellId, CellOutput, CellStatus, CellUnit, FailedCell, LanguagePair,
    OutputOrigin,
};
use crate::services::TerminologyIndex;
use crate::utils::logging::log_progress;
use crate::workflow::{CellCtx, CellFlow, FlowOutcome, RetryPolicy, Sleeper};

/// 任务报告
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub total: usize,
    /// 本次运行翻译完成的单元格
    pub translated: usize,
    /// 缓存命中的单元格
    pub cached: usize,
    /// 之前的运行已完成的单元格
    pub resumed: usize,
    /// 空单元格
    pub skipped: usize,
    pub failed: Vec<FailedCell>,
    /// 术语替换次数
    pub substitutions: usize,
    /// 实际发出的远程请求数
    pub remote_calls: usize,
    /// 按原始顺序排列的结果
    pub outputs: Vec<CellOutput>,
}

impl JobReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 同一指纹的待翻译单元格
struct PendingGroup {
    fingerprint: Fingerprint,
    source_text: String,
    /// (输出位置, 单元格, 之前累计的尝试次数)
    members: Vec<(usize, CellId, u32)>,
}

/// 任务处理器
pub struct Pipeline {
    pair: LanguagePair,
    terminology: Arc<TerminologyIndex>,
    cache: Arc<TranslationCache>,
    flow: Arc<CellFlow>,
    max_concurrent_requests: usize,
    force_retranslate: bool,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        pair: LanguagePair,
        terminology: Arc<TerminologyIndex>,
        cache: Arc<TranslationCache>,
        client: Arc<dyn TranslationClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let flow = CellFlow::new(
            terminology.clone(),
            client,
            sleeper,
            RetryPolicy::from_config(config),
            pair,
        );

        Self {
            pair,
            terminology,
            cache,
            flow: Arc::new(flow),
            max_concurrent_requests: config.max_concurrent_requests,
            force_retranslate: config.force_retranslate,
        }
    }

    pub fn pair(&self) -> LanguagePair {
        self.pair
    }

    /// 处理一个任务的全部单元格
    ///
    /// 单元格级别的错误被吸收并记录；只有持久化错误会返回
    pub async fn run(
        &self,
        job_id: &str,
        cells: Vec<CellUnit>,
        checkpoint: &CheckpointStore,
    ) -> AppResult<JobReport> {
        let total = cells.len();
        checkpoint.set_total(total).await;

        let mut report = JobReport {
            job_id: job_id.to_string(),
            total,
            translated: 0,
            cached: 0,
            resumed: 0,
            skipped: 0,
            failed: Vec::new(),
            substitutions: 0,
            remote_calls: 0,
            outputs: Vec::new(),
        };
        let mut outputs: Vec<Option<CellOutput>> = vec![None; total];
        let mut groups: Vec<PendingGroup> = Vec::new();
        let mut group_of: HashMap<Fingerprint, usize> = HashMap::new();

        // ========== 第一轮：检查点 / 缓存 ==========
        for (pos, cell) in cells.into_iter().enumerate() {
            if cell.source_text.trim().is_empty() {
                checkpoint.record(&cell.id, CellRecord::skipped()).await;
                outputs[pos] = Some(CellOutput {
                    id: cell.id,
                    text: String::new(),
                    status: CellStatus::Skipped,
                    origin: OutputOrigin::Empty,
                    last_error: None,
                });
                report.skipped += 1;
                continue;
            }

            let prior = checkpoint.lookup(&cell.id).await;
            let prior_attempts = prior.as_ref().map_or(0, |r| r.attempt_count);

            if !self.force_retranslate {
                if let Some(text) = prior
                    .as_ref()
                    .filter(|r| r.status == CellStatus::Translated)
                    .and_then(|r| r.translated_text.clone())
                {
                    outputs[pos] = Some(CellOutput {
                        id: cell.id,
                        text,
                        status: CellStatus::Translated,
                        origin: OutputOrigin::Checkpoint,
                        last_error: None,
                    });
                    report.resumed += 1;
                    continue;
                }
            }

            let fingerprint =
                Fingerprint::compute(&cell.source_text, self.terminology.version(), self.pair);

            if !self.force_retranslate {
                if let Some(text) = self.cache.get(&fingerprint).await {
                    debug!("[任务 {}] 缓存命中: {}", job_id, cell.id);
                    checkpoint
                        .record(&cell.id, CellRecord::translated(text.clone(), prior_attempts))
                        .await;
                    outputs[pos] = Some(CellOutput {
                        id: cell.id,
                        text,
                        status: CellStatus::Translated,
                        origin: OutputOrigin::Cache,
                        last_error: None,
                    });
                    report.cached += 1;
                    checkpoint.maybe_flush().await?;
                    continue;
                }
            }

            match group_of.get(&fingerprint) {
                Some(&gi) => groups[gi].members.push((pos, cell.id, prior_attempts)),
                None => {
                    group_of.insert(fingerprint.clone(), groups.len());
                    groups.push(PendingGroup {
                        fingerprint,
                        source_text: cell.source_text,
                        members: vec![(pos, cell.id, prior_attempts)],
                    });
                }
            }
        }

        let pending_cells: usize = groups.iter().map(|g| g.members.len()).sum();
        info!(
            "[任务 {}] 📋 共 {} 个单元格: 已完成 {}，缓存命中 {}，空白 {}，待翻译 {}（{} 段不同原文）",
            job_id,
            total,
            report.resumed,
            report.cached,
            report.skipped,
            pending_cells,
            groups.len()
        );

        // ========== 第二轮：并发翻译 ==========
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_requests));
        let mut tasks: JoinSet<(usize, FlowOutcome)> = JoinSet::new();
        let group_total = groups.len();

        for (gi, group) in groups.iter().enumerate() {
            let semaphore = semaphore.clone();
            let flow = self.flow.clone();
            let text = group.source_text.clone();
            let ctx = CellCtx::new(job_id, group.members[0].1.clone(), gi + 1, group_total)
                .with_group_size(group.members.len());

            tasks.spawn(async move {
                // 信号量不会被关闭
                let _permit = semaphore.acquire_owned().await.ok();
                debug!("{} 开始翻译（{} 个单元格共用）", ctx, ctx.group_size);
                let outcome = flow.run(&text, &ctx).await;
                (gi, outcome)
            });
        }

        let mut finished = vec![false; group_total];
        while let Some(joined) = tasks.join_next().await {
            let (gi, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    error!("[任务 {}] 翻译任务异常退出: {}", job_id, e);
                    continue;
                }
            };
            finished[gi] = true;
            let group = &groups[gi];

            report.substitutions += outcome.substitutions * group.members.len();
            if outcome.remote {
                report.remote_calls += outcome.attempts as usize;
            }

            match outcome.result {
                Ok(text) => {
                    self.cache.put(&group.fingerprint, &text).await?;
                    for (pos, id, prior) in &group.members {
                        checkpoint
                            .record(id, CellRecord::translated(text.clone(), prior + outcome.attempts))
                            .await;
                        outputs[*pos] = Some(CellOutput {
                            id: id.clone(),
                            text: text.clone(),
                            status: CellStatus::Translated,
                            origin: OutputOrigin::Remote,
                            last_error: None,
                        });
                        report.translated += 1;
                    }
                }
                Err(e) => {
                    for (pos, id, prior) in &group.members {
                        self.record_failure(
                            checkpoint,
                            &mut report,
                            &mut outputs[*pos],
                            id,
                            e.message(),
                            prior + outcome.attempts,
                        )
                        .await;
                    }
                }
            }

            if checkpoint.maybe_flush().await? {
                self.cache.flush().await?;
            }

            let progress = checkpoint.progress().await;
            log_progress(job_id, progress.done + progress.failed, total);
        }

        // 异常退出的任务按失败处理
        for (gi, group) in groups.iter().enumerate().filter(|(gi, _)| !finished[*gi]) {
            debug!("[任务 {}] 第 {} 组未返回结果", job_id, gi + 1);
            for (pos, id, prior) in &group.members {
                self.record_failure(
                    checkpoint,
                    &mut report,
                    &mut outputs[*pos],
                    id,
                    "翻译任务异常退出",
                    *prior,
                )
                .await;
            }
        }

        checkpoint.flush().await?;
        self.cache.flush().await?;

        report.outputs = outputs.into_iter().flatten().collect();
        Ok(report)
    }

    async fn record_failure(
        &self,
        checkpoint: &CheckpointStore,
        report: &mut JobReport,
        slot: &mut Option<CellOutput>,
        id: &CellId,
        error: &str,
        attempts: u32,
    ) {
        checkpoint
            .record(id, CellRecord::failed(error, attempts))
            .await;
        *slot = Some(CellOutput {
            id: id.clone(),
            text: failure_marker(error),
            status: CellStatus::Failed,
            origin: OutputOrigin::Remote,
            last_error: Some(error.to_string()),
        });
        report.failed.push(FailedCell {
            id: id.clone(),
            error: error.to_string(),
            attempts,
        });
    }
}
