//! 重试状态机
//!
//! 每个单元格持有一个 `RetryState`（已尝试次数 + 下一次等待时间），
//! 每次失败后由 `on_failure` 决定“等待后重试”还是“放弃”。
//! 等待通过 `Sleeper` 完成，测试中可以替换为不真正睡眠的实现。

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::CellTranslationError;

/// 等待抽象
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 使用 tokio 计时器的真实等待
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 每次运行的最大尝试次数（含第一次）
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.backoff_initial(),
            multiplier: config.backoff_multiplier,
            max_backoff: config.backoff_max(),
        }
    }

    /// 新单元格的初始状态
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts: 0,
            next_backoff: self.initial_backoff.min(self.max_backoff),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 失败后的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// 单个单元格的重试状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryState {
    pub attempts: u32,
    pub next_backoff: Duration,
}

impl RetryState {
    /// 开始一次尝试
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// 根据错误类型和已尝试次数决定下一步
    pub fn on_failure(&mut self, error: &CellTranslationError, policy: &RetryPolicy) -> RetryDecision {
        if !error.is_retryable() || self.attempts >= policy.max_attempts {
            return RetryDecision::GiveUp;
        }

        let wait = self.next_backoff;
        self.next_backoff = wait.mul_f64(policy.multiplier).min(policy.max_backoff);
        RetryDecision::RetryAfter(wait)
    }
}
