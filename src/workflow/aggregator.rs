//! 发现汇总
//!
//! 把所有已完成批次的回复折叠成一份汇总：
//! - 发现按批次顺序、批次内顺序追加，并关联该批次全部影像
//! - 建议按首次出现顺序去重（区分大小写的完全匹配）
//! - 置信度只对给出了数字置信度的批次求平均
//!
//! 单个批次回复解析失败只记录警告，不影响其他批次。

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{Batch, BatchStatus, BatchSummary, Finding};
use crate::services::reply_parser::{self, to_percent};
use crate::utils::truncate_text;

/// 汇总结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    /// 四舍五入后的平均置信度，没有批次给出置信度时为 0
    pub overall_confidence: u8,
    /// 每个批次自带的摘要
    pub batch_summaries: Vec<BatchSummary>,
    /// 已完成但回复无法解析的批次编号
    pub degraded_batches: Vec<u32>,
}

/// 汇总一组已进入终态的批次
pub fn aggregate(batches: &[Batch]) -> Aggregation {
    let mut aggregation = Aggregation::default();
    let mut seen_recommendations: HashSet<String> = HashSet::new();
    let mut confidences: Vec<f64> = Vec::new();

    for batch in batches {
        if batch.status() != BatchStatus::Completed {
            continue;
        }

        let raw = batch.result.as_deref().unwrap_or_default();
        let reply = match reply_parser::parse_reply(raw) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    "[{}] ⚠️ 回复解析失败，该批次不计入汇总: {} (回复: {})",
                    batch.label(),
                    e,
                    truncate_text(raw, 120)
                );
                aggregation.degraded_batches.push(batch.batch_number);
                continue;
            }
        };

        debug!(
            "[{}] 解析得到 {} 条发现, {} 条建议",
            batch.label(),
            reply.findings.len(),
            reply.recommendations.len()
        );

        let related_images = batch.image_ids();
        for (ordinal, parsed) in reply.findings.into_iter().enumerate() {
            aggregation.findings.push(Finding {
                id: Finding::make_id(batch.batch_number, ordinal + 1),
                description: parsed.description,
                severity: parsed.severity,
                location: parsed.location,
                confidence: parsed.confidence,
                related_images: related_images.clone(),
            });
        }

        for recommendation in reply.recommendations {
            if seen_recommendations.insert(recommendation.clone()) {
                aggregation.recommendations.push(recommendation);
            }
        }

        if let Some(confidence) = reply.confidence {
            confidences.push(confidence.clamp(0.0, 100.0));
        }

        if let Some(summary) = reply.summary {
            aggregation.batch_summaries.push(BatchSummary {
                batch_number: batch.batch_number,
                summary,
            });
        }
    }

    if !confidences.is_empty() {
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        aggregation.overall_confidence = to_percent(mean);
    }

    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicalImage, Severity};
    use chrono::{TimeZone, Utc};

    fn batch(number: u32, total: u32, image_ids: &[&str]) -> Batch {
        let images = image_ids
            .iter()
            .map(|id| {
                MedicalImage::new(*id, format!("{}.png", id), "image/png", vec![0u8], Utc::now())
            })
            .collect();
        Batch::new(format!("run-batch-{}", number), images, number, total)
    }

    fn completed(number: u32, total: u32, image_ids: &[&str], reply: &str) -> Batch {
        let mut b = batch(number, total, image_ids);
        b.start().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, number).unwrap();
        b.complete(reply.to_string(), at).unwrap();
        b
    }

    fn failed(number: u32, total: u32, image_ids: &[&str]) -> Batch {
        let mut b = batch(number, total, image_ids);
        b.start().unwrap();
        b.fail("connection reset").unwrap();
        b
    }

    #[test]
    fn test_confidence_mean_skips_batches_without_confidence() {
        let batches = vec![
            completed(1, 3, &["a"], r#"{"confidence": 80}"#),
            completed(2, 3, &["b"], r#"{"confidence": 90}"#),
            completed(3, 3, &["c"], r#"{"confidence": "n/a"}"#),
        ];
        assert_eq!(aggregate(&batches).overall_confidence, 85);
    }

    #[test]
    fn test_no_confidence_anywhere_is_zero() {
        let batches = vec![completed(1, 1, &["a"], r#"{"summary": "x"}"#)];
        assert_eq!(aggregate(&batches).overall_confidence, 0);
    }

    #[test]
    fn test_recommendations_deduplicated_in_first_seen_order() {
        let batches = vec![
            completed(
                1,
                2,
                &["a"],
                r#"{"recommendations": ["Follow-up CT recommended", "Compare with prior"]}"#,
            ),
            completed(
                2,
                2,
                &["b"],
                r#"{"recommendations": ["Biopsy", "Follow-up CT recommended", "follow-up CT recommended"]}"#,
            ),
        ];
        let aggregation = aggregate(&batches);
        assert_eq!(
            aggregation.recommendations,
            vec![
                "Follow-up CT recommended",
                "Compare with prior",
                "Biopsy",
                "follow-up CT recommended"
            ]
        );
    }

    #[test]
    fn test_findings_tagged_with_all_batch_images_in_order() {
        let batches = vec![
            completed(
                1,
                2,
                &["a", "b"],
                r#"{"findings": [{"description": "one", "severity": "low"}, {"description": "two", "severity": "critical"}]}"#,
            ),
            completed(2, 2, &["c"], r#"{"findings": [{"description": "three"}]}"#),
        ];
        let aggregation = aggregate(&batches);

        let ids: Vec<&str> = aggregation.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["finding-1-1", "finding-1-2", "finding-2-1"]);
        assert_eq!(aggregation.findings[0].related_images, vec!["a", "b"]);
        assert_eq!(aggregation.findings[1].severity, Severity::Critical);
        assert_eq!(aggregation.findings[2].related_images, vec!["c"]);
    }

    #[test]
    fn test_malformed_and_errored_batches_contribute_nothing() {
        let batches = vec![
            completed(1, 3, &["a"], "I could not analyze these images."),
            failed(2, 3, &["b"]),
            completed(
                3,
                3,
                &["c"],
                r#"{"findings": ["Fracture"], "recommendations": ["Orthopedic consult"], "confidence": 70}"#,
            ),
        ];
        let aggregation = aggregate(&batches);

        assert_eq!(aggregation.findings.len(), 1);
        assert_eq!(aggregation.findings[0].id, "finding-3-1");
        assert_eq!(aggregation.recommendations, vec!["Orthopedic consult"]);
        assert_eq!(aggregation.overall_confidence, 70);
        assert_eq!(aggregation.degraded_batches, vec![1]);
    }

    #[test]
    fn test_batch_summaries_kept_in_batch_order() {
        let batches = vec![
            completed(1, 3, &["a"], r#"{"summary": "Clear lung fields"}"#),
            completed(2, 3, &["b"], r#"{"summary": "   "}"#),
            completed(3, 3, &["c"], r#"{"summary": "Healed rib fracture"}"#),
        ];
        let aggregation = aggregate(&batches);
        let summaries: Vec<(u32, &str)> = aggregation
            .batch_summaries
            .iter()
            .map(|s| (s.batch_number, s.summary.as_str()))
            .collect();
        assert_eq!(summaries, vec![(1, "Clear lung fields"), (3, "Healed rib fracture")]);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let batches = vec![
            completed(1, 2, &["a"], r#"{"findings": [{"description": "x"}], "confidence": 61}"#),
            completed(2, 2, &["b"], r#"{"recommendations": ["r"], "confidence": 64}"#),
        ];
        assert_eq!(aggregate(&batches), aggregate(&batches));
    }
}
