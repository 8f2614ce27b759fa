//! 报告编译
//!
//! 根据汇总结果生成最终报告，不做任何 I/O。

use chrono::{DateTime, Utc};

use crate::models::{Batch, BatchStatus, Finding, Report, Severity};
use crate::workflow::aggregator::Aggregation;

/// 报告的元信息（来自调用方）
#[derive(Debug, Clone, Copy)]
pub struct ReportMeta<'a> {
    pub run_id: &'a str,
    pub patient_id: Option<&'a str>,
}

/// 编译最终报告
///
/// `generated_at` 由调用方传入，相同输入得到完全相同的报告。
pub fn compile(
    aggregation: Aggregation,
    batches: &[Batch],
    meta: ReportMeta<'_>,
    generated_at: DateTime<Utc>,
) -> Report {
    let total_images: usize = batches.iter().map(Batch::image_count).sum();
    let total_batches = batches.len();

    Report {
        id: Report::make_id(meta.run_id),
        run_id: meta.run_id.to_string(),
        patient_id: meta.patient_id.map(str::to_string),
        summary: build_summary(total_images, total_batches, &aggregation.findings),
        findings: aggregation.findings,
        recommendations: aggregation.recommendations,
        overall_confidence: aggregation.overall_confidence,
        processing_time_ms: processing_time_ms(batches, generated_at),
        total_images,
        total_batches,
        batch_summaries: aggregation.batch_summaries,
        generated_at,
    }
}

/// 综合摘要
///
/// 按 critical → high → moderate → low 的顺序列出非零计数；没有发现时说明未见异常。
pub fn build_summary(total_images: usize, total_batches: usize, findings: &[Finding]) -> String {
    let scope = format!(
        "Analyzed {} {} across {} {}.",
        total_images,
        plural(total_images, "image", "images"),
        total_batches,
        plural(total_batches, "batch", "batches"),
    );

    if findings.is_empty() {
        return format!("{} No significant abnormalities were detected.", scope);
    }

    let parts: Vec<String> = Severity::PRIORITY_ORDER
        .iter()
        .filter_map(|severity| {
            let count = findings.iter().filter(|f| f.severity == *severity).count();
            (count > 0).then(|| format!("{} {}", count, severity))
        })
        .collect();

    let lead = if findings.iter().any(|f| f.severity == Severity::Critical) {
        " Critical findings require immediate attention."
    } else {
        ""
    };

    format!(
        "{} Identified {} {}: {}.{}",
        scope,
        findings.len(),
        plural(findings.len(), "finding", "findings"),
        parts.join(", "),
        lead
    )
}

/// 首个完成批次到最后一个完成批次之间的耗时（毫秒）
fn processing_time_ms(batches: &[Batch], now: DateTime<Utc>) -> i64 {
    let mut completions = batches
        .iter()
        .filter(|b| b.status() == BatchStatus::Completed)
        .filter_map(|b| b.completed_at);

    let first = completions.next();
    let last = completions.last().or(first);

    let start = first.unwrap_or(now);
    let end = last.unwrap_or(now);
    (end - start).num_milliseconds()
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}
