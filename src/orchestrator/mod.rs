//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量表格处理器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描输入目录，逐张表格处理
//! - 持有共享资源（TranslationCache、TranslationClient）
//! - 处理中断信号，输出全局统计信息
//!
//! ### `job_processor` - 单个任务处理器
//! - 遍历一张表格的所有待翻译单元格
//! - 查询检查点和缓存，按指纹合并相同原文
//! - 用 Semaphore 限制并发请求，按原始顺序汇总结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Sheet>)
//!     ↓
//! job_processor (处理 Vec<CellUnit>)
//!     ↓
//! workflow::CellFlow (处理单段原文)
//!     ↓
//! services / clients (术语替换 / 翻译接口)
//!     ↓
//! infrastructure (TranslationCache / CheckpointStore)
//! ```

pub mod batch_processor;
pub mod job_processor;

// 重新导出主要类型
pub use batch_processor::{App, RunSummary, SheetOutcome};
pub use job_processor::{JobReport, Pipeline};
