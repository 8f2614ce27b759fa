use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Batch, BatchStatus, Finding, Severity};

/// 一次运行生成的综合诊断报告
///
/// 由报告编译器在运行结束时创建一次，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// `report-{run_id}`
    pub id: String,
    pub run_id: String,
    pub patient_id: Option<String>,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    pub overall_confidence: u8,
    pub processing_time_ms: i64,
    pub total_images: usize,
    pub total_batches: usize,
    /// 模型为各批次给出的摘要，按批次编号排列
    #[serde(default)]
    pub batch_summaries: Vec<BatchSummary>,
    pub generated_at: DateTime<Utc>,
}

/// 单个批次的模型摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_number: u32,
    pub summary: String,
}

impl Report {
    pub fn make_id(run_id: &str) -> String {
        format!("report-{}", run_id)
    }

    /// 指定严重程度的发现（保持原有顺序）
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.findings_with(severity).count()
    }
}

/// 一次运行交给展示/存储层的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    /// 全部批次的最终状态
    pub batches: Vec<Batch>,
    /// 所有批次都成功
    pub fully_succeeded: bool,
}

impl RunOutcome {
    pub fn new(report: Report, batches: Vec<Batch>) -> Self {
        let fully_succeeded = batches
            .iter()
            .all(|b| b.status() == BatchStatus::Completed);
        Self {
            report,
            batches,
            fully_succeeded,
        }
    }

    /// 失败的批次
    pub fn failed_batches(&self) -> impl Iterator<Item = &Batch> {
        self.batches
            .iter()
            .filter(|b| b.status() == BatchStatus::Error)
    }

    pub fn completed_count(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.status() == BatchStatus::Completed)
            .count()
    }
}
