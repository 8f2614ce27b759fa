//! 报告导出格式
//!
//! 纯文本导出：头部信息 → 摘要 → 批次备注 → 按严重程度分组的发现 → 编号建议 → 免责声明

use std::fmt::Write;

use crate::models::{Report, Severity};

pub const DISCLAIMER: &str = "DISCLAIMER: This report was generated by an automated AI system \
and is intended to assist, not replace, a qualified medical professional. All findings must be \
reviewed and confirmed by a licensed radiologist or physician before any clinical decision.";

/// 生成纯文本报告
pub fn format_report_text(report: &Report) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(60);
    let light = "─".repeat(60);

    // 头部
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "MEDICAL IMAGE ANALYSIS REPORT");
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "Report ID:          {}", report.id);
    let _ = writeln!(out, "Run ID:             {}", report.run_id);
    let _ = writeln!(
        out,
        "Patient ID:         {}",
        report.patient_id.as_deref().unwrap_or("N/A")
    );
    let _ = writeln!(
        out,
        "Generated:          {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Images analyzed:    {}", report.total_images);
    let _ = writeln!(out, "Batches:            {}", report.total_batches);
    let _ = writeln!(out, "Overall confidence: {}%", report.overall_confidence);
    let _ = writeln!(
        out,
        "Processing time:    {:.1}s",
        report.processing_time_ms as f64 / 1000.0
    );
    let _ = writeln!(out);

    // 摘要
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", light);
    let _ = writeln!(out, "{}", report.summary);
    let _ = writeln!(out);

    // 批次备注
    if !report.batch_summaries.is_empty() {
        let _ = writeln!(out, "BATCH NOTES");
        let _ = writeln!(out, "{}", light);
        for note in &report.batch_summaries {
            let _ = writeln!(
                out,
                "Batch {}/{}: {}",
                note.batch_number, report.total_batches, note.summary
            );
        }
        let _ = writeln!(out);
    }

    // 发现
    let _ = writeln!(out, "FINDINGS");
    let _ = writeln!(out, "{}", light);
    if report.findings.is_empty() {
        let _ = writeln!(out, "No findings reported.");
    }
    for severity in Severity::PRIORITY_ORDER {
        let group: Vec<_> = report.findings_with(severity).collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "[{}] ({})",
            severity.as_str().to_ascii_uppercase(),
            group.len()
        );
        for finding in group {
            let _ = writeln!(out, "  - {}", finding.description);
            if let Some(location) = &finding.location {
                let _ = writeln!(out, "    Location:   {}", location);
            }
            let _ = writeln!(out, "    Confidence: {}%", finding.confidence);
        }
    }
    let _ = writeln!(out);

    // 建议
    let _ = writeln!(out, "RECOMMENDATIONS");
    let _ = writeln!(out, "{}", light);
    if report.recommendations.is_empty() {
        let _ = writeln!(out, "No specific recommendations.");
    }
    for (i, recommendation) in report.recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, recommendation);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "{}", DISCLAIMER);
    let _ = writeln!(out, "{}", heavy);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchSummary, Finding};
    use chrono::{TimeZone, Utc};

    fn sample_report() -> Report {
        let finding = |id: &str, description: &str, severity, location: Option<&str>| Finding {
            id: id.to_string(),
            description: description.to_string(),
            severity,
            location: location.map(str::to_string),
            confidence: 70,
            related_images: vec!["img-1".to_string()],
        };
        Report {
            id: "report-r1".to_string(),
            run_id: "r1".to_string(),
            patient_id: None,
            summary: "Analyzed 2 images across 1 batch.".to_string(),
            findings: vec![
                finding("finding-1-1", "Mild degenerative change", Severity::Low, None),
                finding("finding-1-2", "Pneumothorax", Severity::Critical, Some("left apex")),
            ],
            recommendations: vec!["Urgent review".to_string(), "Repeat film".to_string()],
            overall_confidence: 82,
            processing_time_ms: 1500,
            total_images: 2,
            total_batches: 1,
            batch_summaries: vec![BatchSummary {
                batch_number: 1,
                summary: "Left apical pneumothorax.".to_string(),
            }],
            generated_at: Utc.with_ymd_and_hms(2026, 5, 4, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_sections_appear_in_order() {
        let text = format_report_text(&sample_report());
        let positions: Vec<usize> = [
            "Report ID:",
            "SUMMARY",
            "BATCH NOTES",
            "FINDINGS",
            "RECOMMENDATIONS",
            "DISCLAIMER:",
        ]
        .iter()
        .map(|marker| text.find(marker).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("Patient ID:         N/A"));
        assert!(text.contains("Processing time:    1.5s"));
        assert!(text.contains("Batch 1/1: Left apical pneumothorax.\n"));
    }

    #[test]
    fn test_batch_notes_omitted_when_empty() {
        let mut report = sample_report();
        report.batch_summaries.clear();
        assert!(!format_report_text(&report).contains("BATCH NOTES"));
    }

    #[test]
    fn test_findings_grouped_critical_first() {
        let text = format_report_text(&sample_report());
        let critical = text.find("[CRITICAL] (1)").unwrap();
        let low = text.find("[LOW] (1)").unwrap();
        assert!(critical < low);
        assert!(!text.contains("[HIGH]"));
        assert!(text.contains("    Location:   left apex"));
    }

    #[test]
    fn test_recommendations_numbered() {
        let text = format_report_text(&sample_report());
        assert!(text.contains("1. Urgent review\n2. Repeat film\n"));
    }
}
