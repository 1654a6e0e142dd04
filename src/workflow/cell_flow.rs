//! 单元格翻译流程 - 流程层
//!
//! 核心职责：定义“一段原文”的完整翻译流程
//!
//! 流程顺序：
//! 1. 术语替换
//! 2. 已加载术语表且文本中没有源语言文字 → 直接作为译文
//! 3. 调用翻译接口，临时错误按退避策略重试，永久错误立即放弃
//!
//! 缓存和检查点不在这里处理，由编排层统一写入

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::{TranslationClient, TranslationRequest};
use crate::error::CellTranslationError;
use crate::models::LanguagePair;
use crate::services::terminology::is_fully_substituted;
use crate::services::TerminologyIndex;
use crate::utils::logging::truncate_text;
use crate::workflow::cell_ctx::CellCtx;
use crate::workflow::retry::{RetryDecision, RetryPolicy, Sleeper};

/// 流程结果
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub result: Result<String, CellTranslationError>,
    /// 本次运行的尝试次数（未调用接口时为 0）
    pub attempts: u32,
    /// 术语替换次数
    pub substitutions: usize,
    /// 是否调用了翻译接口
    pub remote: bool,
}

/// 单元格翻译流程
///
/// - 不持有缓存和检查点
/// - 只依赖术语索引和翻译客户端
/// - 可以被多个工作协程共享
pub struct CellFlow {
    terminology: Arc<TerminologyIndex>,
    client: Arc<dyn TranslationClient>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    pair: LanguagePair,
}

impl CellFlow {
    pub fn new(
        terminology: Arc<TerminologyIndex>,
        client: Arc<dyn TranslationClient>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        pair: LanguagePair,
    ) -> Self {
        Self {
            terminology,
            client,
            sleeper,
            policy,
            pair,
        }
    }

    pub async fn run(&self, source_text: &str, ctx: &CellCtx) -> FlowOutcome {
        let substitution = self.terminology.apply(source_text);
        let substitutions = substitution.replacement_count();

        if substitutions > 0 {
            debug!(
                "{} 🔤 术语替换 {} 处: {}",
                ctx,
                substitutions,
                truncate_text(&substitution.text, 40)
            );
        }

        if !self.terminology.is_empty()
            && is_fully_substituted(&substitution.text, self.pair.source)
        {
            debug!("{} 术语替换后无需翻译", ctx);
            return FlowOutcome {
                result: Ok(substitution.text),
                attempts: 0,
                substitutions,
                remote: false,
            };
        }

        let request =
            TranslationRequest::new(substitution.text, self.pair).with_hints(substitution.applied);

        let mut state = self.policy.start();
        loop {
            let attempt = state.begin_attempt();

            match self.client.translate(&request).await {
                Ok(text) => {
                    if attempt > 1 {
                        info!("{} ✓ 第 {} 次尝试成功", ctx, attempt);
                    }
                    return FlowOutcome {
                        result: Ok(text),
                        attempts: attempt,
                        substitutions,
                        remote: true,
                    };
                }
                Err(e) => match state.on_failure(&e, &self.policy) {
                    RetryDecision::RetryAfter(wait) => {
                        warn!(
                            "{} ⚠️ 第 {}/{} 次尝试失败: {}，{} 毫秒后重试",
                            ctx,
                            attempt,
                            self.policy.max_attempts,
                            e,
                            wait.as_millis()
                        );
                        self.sleeper.sleep(wait).await;
                    }
                    RetryDecision::GiveUp => {
                        warn!("{} ❌ 放弃翻译（已尝试 {} 次）: {}", ctx, attempt, e);
                        return FlowOutcome {
                            result: Err(e),
                            attempts: attempt,
                            substitutions,
                            remote: true,
                        };
                    }
                },
            }
        }
    }
}
