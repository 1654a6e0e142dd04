//! # Sheet Translate
//!
//! 可断点续传的中英双语表格翻译工具
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，每一层只依赖它下面的层：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有需要落盘的共享资源，只暴露读写能力
//! - `TranslationCache` - 按“原文 + 术语表版本 + 方向”指纹保存译文
//! - `CheckpointStore` - 每个任务的单元格终态，支持中断后继续
//!
//! ### ② 业务能力层（Services / Clients）
//! - `services/` - 描述"我能做什么"，只处理单段文本
//! - `TerminologyIndex` - 术语替换能力
//! - `FailureWriter` - 写失败报告能力
//! - `clients/` - `TranslationClient` 接口和 `OpenAiTranslator` 实现
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一段原文"的完整翻译流程
//! - `CellCtx` - 上下文封装（job_id + 单元格）
//! - `CellFlow` - 流程编排（术语替换 → 翻译 → 重试）
//! - `retry` - 显式的重试状态机和可替换的等待实现
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量表格处理器，管理资源和中断
//! - `orchestrator/job_processor` - 单个任务处理器，管理并发、缓存和检查点
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{OpenAiTranslator, TranslationClient, TranslationRequest};
pub use config::Config;
pub use error::{AppError, AppResult, CellTranslationError, ConfigError, PersistenceError};
pub use infrastructure::{CheckpointStore, FlushPolicy, TranslationCache};
pub use models::{CellId, CellOutput, CellStatus, CellUnit, Language, LanguagePair};
pub use orchestrator::{App, JobReport, Pipeline};
pub use services::TerminologyIndex;
pub use workflow::{CellCtx, CellFlow, RetryPolicy, Sleeper};
