//! 诊断流水线 - 编排层入口
//!
//! 输入校验 → 划分批次 → 逐批推理 → 汇总发现 → 编译报告

use std::collections::HashSet;
use std::fmt::Write;
use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Batch, BatchStatus, MedicalImage, RunOutcome};
use crate::orchestrator::batch_processor::{BatchProcessor, RunContext};
use crate::services::InferenceClient;
use crate::utils::logging;
use crate::workflow::{aggregate, compile, partition, ReportMeta};

/// 一次运行的输入
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: String,
    pub images: Vec<MedicalImage>,
    pub patient_id: Option<String>,
    pub custom_instruction: Option<String>,
    /// 整体截止时间
    pub deadline: Option<Instant>,
}

impl RunRequest {
    pub fn new(run_id: impl Into<String>, images: Vec<MedicalImage>) -> Self {
        Self {
            run_id: run_id.into(),
            images,
            patient_id: None,
            custom_instruction: None,
            deadline: None,
        }
    }

    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.custom_instruction = Some(instruction.into());
        self
    }

    /// 从现在起 `budget` 之后截止
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }
}

/// 诊断流水线
pub struct DiagnosisPipeline<C> {
    processor: BatchProcessor<C>,
    batch_size: NonZeroUsize,
}

impl<C: InferenceClient> DiagnosisPipeline<C> {
    pub fn new(client: C, batch_size: usize, pacing_delay: Duration) -> PipelineResult<Self> {
        let batch_size = NonZeroUsize::new(batch_size).ok_or(PipelineError::InvalidBatchSize)?;
        Ok(Self {
            processor: BatchProcessor::new(client, pacing_delay),
            batch_size,
        })
    }

    pub fn from_config(client: C, config: &Config) -> PipelineResult<Self> {
        Self::new(client, config.batch_size, config.pacing_delay())
    }

    /// 执行一次完整运行
    ///
    /// 至少一个批次完成即返回报告；全部失败时返回 [`PipelineError::AllBatchesFailed`]，
    /// 其中包含每个批次的失败原因。
    pub async fn run(&self, request: RunRequest) -> PipelineResult<RunOutcome> {
        validate_images(&request.images)?;

        let batches = partition(&request.run_id, &request.images, self.batch_size);
        logging::log_run_start(&request.run_id, request.images.len(), batches.len());

        let ctx = RunContext {
            custom_instruction: request.custom_instruction.as_deref(),
            deadline: request.deadline,
        };
        let settled = self.processor.process(batches, ctx).await;

        if !settled.iter().any(|b| b.status() == BatchStatus::Completed) {
            let detail = describe_failures(&settled);
            error!("❌ 运行 {} 全部批次失败:\n{}", request.run_id, detail);
            return Err(PipelineError::AllBatchesFailed {
                detail,
                batches: settled,
            });
        }

        let aggregation = aggregate(&settled);
        if !aggregation.degraded_batches.is_empty() {
            warn!(
                "⚠️ {} 个批次回复无法解析，已从报告中排除: {:?}",
                aggregation.degraded_batches.len(),
                aggregation.degraded_batches
            );
        }

        let report = compile(
            aggregation,
            &settled,
            ReportMeta {
                run_id: &request.run_id,
                patient_id: request.patient_id.as_deref(),
            },
            Utc::now(),
        );

        let outcome = RunOutcome::new(report, settled);
        if outcome.fully_succeeded {
            info!("✓ 运行 {} 全部批次成功", request.run_id);
        } else {
            warn!(
                "⚠️ 运行 {} 部分失败: {}",
                request.run_id,
                outcome
                    .failed_batches()
                    .map(Batch::label)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(outcome)
    }
}

/// 校验输入影像集合
pub fn validate_images(images: &[MedicalImage]) -> PipelineResult<()> {
    if images.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut seen = HashSet::with_capacity(images.len());
    for image in images {
        if image.id.trim().is_empty() {
            return Err(PipelineError::InvalidImage {
                image_id: image.filename.clone(),
                reason: "影像 ID 为空".to_string(),
            });
        }
        if image.data().is_empty() {
            return Err(PipelineError::InvalidImage {
                image_id: image.id.clone(),
                reason: "影像内容为空".to_string(),
            });
        }
        if !is_supported_media_type(&image.media_type) {
            return Err(PipelineError::InvalidImage {
                image_id: image.id.clone(),
                reason: format!("不支持的媒体类型 {}", image.media_type),
            });
        }
        if !seen.insert(image.id.as_str()) {
            return Err(PipelineError::DuplicateImageId {
                image_id: image.id.clone(),
            });
        }
    }

    Ok(())
}

fn is_supported_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/") || media_type == "application/dicom"
}

/// 每个失败批次一行：`batch N/M: 原因`
fn describe_failures(batches: &[Batch]) -> String {
    let mut detail = String::new();
    for batch in batches.iter().filter(|b| b.status() == BatchStatus::Error) {
        let _ = writeln!(
            detail,
            "{}: {}",
            batch.label(),
            batch.error.as_deref().unwrap_or("unknown error")
        );
    }
    detail.trim_end().to_string()
}
