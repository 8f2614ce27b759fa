//! 批次与批次状态机
//!
//! ```text
//! pending → processing → completed
//!                      ↘ error
//! ```
//!
//! `completed` / `error` 为终态，不允许再迁移。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::models::MedicalImage;

/// 批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Error)
    }

    /// 状态机是否允许 `self → next`
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Pending, BatchStatus::Processing)
                | (BatchStatus::Processing, BatchStatus::Completed)
                | (BatchStatus::Processing, BatchStatus::Error)
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// 一组一起提交给推理服务的影像
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: String,
    pub images: Vec<MedicalImage>,
    /// 批次编号（从1开始）
    pub batch_number: u32,
    pub total_batches: u32,
    status: BatchStatus,
    /// 模型原始回复
    pub result: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// 创建处于 `pending` 状态的批次
    pub fn new(
        id: impl Into<String>,
        images: Vec<MedicalImage>,
        batch_number: u32,
        total_batches: u32,
    ) -> Self {
        Self {
            id: id.into(),
            images,
            batch_number,
            total_batches,
            status: BatchStatus::Pending,
            result: None,
            error: None,
            completed_at: None,
        }
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn image_ids(&self) -> Vec<String> {
        self.images.iter().map(|img| img.id.clone()).collect()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// `pending → processing`
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Processing)
    }

    /// `processing → completed`，保存原始回复并记录完成时间
    pub fn complete(
        &mut self,
        raw_result: String,
        completed_at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Completed)?;
        self.result = Some(raw_result);
        self.completed_at = Some(completed_at);
        Ok(())
    }

    /// `processing → error`，保存失败原因
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(BatchStatus::Error)?;
        self.error = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, next: BatchStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                batch_number: self.batch_number,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// 日志和错误汇总使用的标签，例如 `batch 2/5`
    pub fn label(&self) -> String {
        format!("batch {}/{}", self.batch_number, self.total_batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> Batch {
        Batch::new("run-batch-1", Vec::new(), 1, 1)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut batch = sample_batch();
        assert_eq!(batch.status(), BatchStatus::Pending);
        batch.start().unwrap();
        assert_eq!(batch.status(), BatchStatus::Processing);
        let now = Utc::now();
        batch.complete("{}".to_string(), now).unwrap();
        assert_eq!(batch.status(), BatchStatus::Completed);
        assert_eq!(batch.result.as_deref(), Some("{}"));
        assert_eq!(batch.completed_at, Some(now));
    }

    #[test]
    fn test_cannot_complete_without_processing() {
        let mut batch = sample_batch();
        let err = batch.complete("{}".to_string(), Utc::now()).unwrap_err();
        assert_eq!(err.from, BatchStatus::Pending);
        assert_eq!(err.to, BatchStatus::Completed);
        assert!(batch.result.is_none());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut batch = sample_batch();
        batch.start().unwrap();
        batch.fail("boom").unwrap();
        assert!(batch.status().is_terminal());
        assert!(batch.start().is_err());
        assert!(batch.complete("{}".to_string(), Utc::now()).is_err());
        assert!(batch.fail("again").is_err());
        assert_eq!(batch.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&BatchStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
