//! 日志工具模块
//!
//! 提供日志初始化和格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{Report, RunOutcome, Severity};

/// 初始化 tracing 订阅者
///
/// 默认级别 `info`（`verbose` 为真时 `debug`），可通过 `RUST_LOG` 覆盖；重复调用时静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(batch_size: usize, model_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 影像批量诊断模式");
    info!("📊 每批影像数: {}", batch_size);
    info!("🤖 模型: {}", model_name);
    info!("{}", "=".repeat(60));
}

/// 记录运行开始信息
pub fn log_run_start(run_id: &str, total_images: usize, total_batches: usize) {
    info!("✓ 运行 {}: 共 {} 张影像, 分为 {} 批", run_id, total_images, total_batches);
    info!("💡 逐批顺序处理，单批失败不影响其他批次\n");
}

/// 记录批次开始信息
pub fn log_batch_start(batch_num: u32, total_batches: u32, image_count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("🖼️ 本批影像: {} 张", image_count);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: u32, succeeded: bool, elapsed_ms: u128) {
    info!("\n{}", "─".repeat(60));
    if succeeded {
        info!("✓ 第 {} 批完成 (耗时 {} ms)", batch_num, elapsed_ms);
    } else {
        info!("✗ 第 {} 批失败 (耗时 {} ms)", batch_num, elapsed_ms);
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(outcome: &RunOutcome) {
    let report: &Report = &outcome.report;
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "✅ 成功批次: {}/{}",
        outcome.completed_count(),
        outcome.batches.len()
    );
    for batch in outcome.failed_batches() {
        info!(
            "❌ 失败: {} - {}",
            batch.label(),
            batch.error.as_deref().unwrap_or("未知原因")
        );
    }
    info!("🩺 发现数: {}", report.findings.len());
    for severity in Severity::PRIORITY_ORDER {
        let count = report.severity_count(severity);
        if count > 0 {
            info!("   {}: {}", severity, count);
        }
    }
    info!("📈 综合置信度: {}%", report.overall_confidence);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("影像批次", 2), "影像...");
        assert_eq!(truncate_text("ok", 10), "ok");
    }
}
