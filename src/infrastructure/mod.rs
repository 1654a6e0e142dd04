//! 基础设施层
//!
//! 持有需要落盘的共享资源，只暴露读写能力：
//! - `TranslationCache` - 跨任务共享的译文缓存
//! - `CheckpointStore` - 单个任务的检查点

pub mod cache_store;
pub mod checkpoint_store;

pub use cache_store::{normalize_text, CacheStats, Fingerprint, TranslationCache};
pub use checkpoint_store::{
    CellRecord, CheckpointState, CheckpointStore, FlushPolicy, JobProgress, ResumeInfo,
};
