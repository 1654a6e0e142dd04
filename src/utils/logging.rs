/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::infrastructure::{CacheStats, ResumeInfo};
use crate::orchestrator::JobReport;

/// 初始化 tracing
///
/// 未设置 `RUST_LOG` 时默认 `sheet_translate=info`，详细日志模式下为 debug。
/// 指定日志文件时，同一份日志会追加写入该文件（不带颜色）。
pub fn init(verbose: bool, log_file_path: Option<&str>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sheet_translate={}", level)));

    let file_layer = match log_file_path {
        Some(path) => {
            init_log_file(path)?;
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .with_context(|| format!("无法打开日志文件: {}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("日志系统初始化失败")?;
    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n表格翻译日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 表格批量翻译模式");
    info!("🤖 模型: {}", config.llm_model_name);
    info!("📊 最大并发请求数: {}", config.max_concurrent_requests);
    info!(
        "🔁 最大尝试次数: {}，退避 {}ms × {} (上限 {}ms)",
        config.max_attempts,
        config.backoff_initial_ms,
        config.backoff_multiplier,
        config.backoff_max_ms
    );
    info!(
        "💾 检查点: 每 {} 个单元格或 {} 秒保存一次",
        config.flush_every_cells, config.flush_interval_secs
    );
    if config.force_retranslate {
        info!("⚠️ 强制重新翻译：忽略检查点和缓存");
    }
    info!("{}", "=".repeat(60));
}

/// 记录表格加载信息
///
/// # 参数
/// - `total`: 表格总数
/// - `glossary_terms`: 术语数量
pub fn log_sheets_loaded(total: usize, glossary_terms: usize) {
    info!("✓ 找到 {} 个待翻译的表格", total);
    info!("📚 术语表: {} 条", glossary_terms);
    info!("💡 表格逐个处理，表内单元格并发翻译\n");
}

/// 记录任务开始信息
///
/// # 参数
/// - `index`: 表格序号（从1开始）
/// - `total`: 表格总数
/// - `job_id`: 任务ID
/// - `direction`: 翻译方向
pub fn log_job_start(index: usize, total: usize, job_id: &str, direction: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📄 开始处理第 {}/{} 个表格: {}", index, total, job_id);
    info!("🌐 翻译方向: {}", direction);
    info!("{}", "=".repeat(60));
}

/// 记录上次运行留下的进度
pub fn log_resume(job_id: &str, resume: &ResumeInfo) {
    info!(
        "[任务 {}] 📂 发现检查点 ({})：已完成 {}/{} ({:.1}%)，失败 {}",
        job_id,
        resume.saved_at.format("%Y-%m-%d %H:%M:%S"),
        resume.progress.done,
        resume.progress.total,
        resume.progress.percent(),
        resume.progress.failed
    );
}

/// 记录任务进度
pub fn log_progress(job_id: &str, done: usize, total: usize) {
    let percent = if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    };
    info!("[任务 {}] ⏳ 进度: {}/{} ({:.1}%)", job_id, done, total, percent);
}

/// 打印单个任务的统计信息
pub fn print_job_stats(report: &JobReport, cache: &CacheStats) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 任务 {} 完成", report.job_id);
    info!("📊 单元格总数: {}", report.total);
    info!("✅ 本次翻译: {}", report.translated);
    info!("♻️ 缓存命中: {}", report.cached);
    info!("📂 之前已完成: {}", report.resumed);
    info!("⏭️ 空白跳过: {}", report.skipped);
    info!("❌ 失败: {}", report.failed.len());
    info!("🔤 术语替换: {} 处", report.substitutions);
    info!("🌐 远程请求: {} 次", report.remote_calls);
    info!(
        "🗃️ 缓存: 命中 {} / 未命中 {} / 共 {} 条",
        cache.hits, cache.misses, cache.entries
    );
    for failed in &report.failed {
        info!(
            "   - {} (尝试 {} 次): {}",
            failed.id,
            failed.attempts,
            truncate_text(&failed.error, 80)
        );
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 全部完成的表格数量
/// - `failed`: 有失败单元格或中断的表格数量
/// - `total`: 表格总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(success: usize, failed: usize, total: usize, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 全部完成: {}/{}", success, total);
    info!("❌ 未完成: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
