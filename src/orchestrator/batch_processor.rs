//! 批次处理器 - 编排层
//!
//! ## 职责
//!
//! 按批次编号升序、严格逐个地把批次送入推理服务，并维护每个批次的状态机。
//!
//! ## 核心功能
//!
//! 1. **状态迁移**：`pending → processing → completed | error`
//! 2. **失败隔离**：单个批次失败（包括超时）只影响该批次，继续处理下一批
//! 3. **节流**：相邻两批之间固定等待一段时间，最后一批之后不等待
//! 4. **截止时间**：整体运行的截止时间同样约束正在进行的调用
//!
//! ## 设计特点
//!
//! - 批次列表按值传入、按值返回，处理期间只有本模块持有
//! - 同一时刻只有一个批次在调用推理服务
//! - 不做重试

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::InferenceError;
use crate::models::Batch;
use crate::services::{BatchRequest, InferenceClient};
use crate::utils::logging;

/// 一次运行中所有批次共享的参数
#[derive(Debug, Clone, Copy, Default)]
pub struct RunContext<'a> {
    pub custom_instruction: Option<&'a str>,
    /// 整体截止时间，`None` 表示不限
    pub deadline: Option<Instant>,
}

/// 顺序批次处理器
pub struct BatchProcessor<C> {
    client: C,
    pacing_delay: Duration,
}

impl<C: InferenceClient> BatchProcessor<C> {
    pub fn new(client: C, pacing_delay: Duration) -> Self {
        Self {
            client,
            pacing_delay,
        }
    }

    /// 处理全部批次，返回全部进入终态的批次列表
    pub async fn process(&self, mut batches: Vec<Batch>, ctx: RunContext<'_>) -> Vec<Batch> {
        batches.sort_by_key(|b| b.batch_number);

        for index in 0..batches.len() {
            if index > 0 {
                self.pace(ctx.deadline).await;
            }
            self.process_one(&mut batches[index], &ctx).await;
        }

        batches
    }

    /// 处理单个批次，结果记录在批次状态里，不向上抛出
    async fn process_one(&self, batch: &mut Batch, ctx: &RunContext<'_>) {
        if let Err(e) = batch.start() {
            error!("[{}] 状态异常，跳过: {}", batch.label(), e);
            return;
        }

        logging::log_batch_start(batch.batch_number, batch.total_batches, batch.image_count());
        let started = Instant::now();

        let outcome = if deadline_passed(ctx.deadline) {
            Err(InferenceError::DeadlineExceeded)
        } else {
            self.invoke(batch, ctx).await
        };

        let succeeded = outcome.is_ok();
        let transition = match outcome {
            Ok(raw) => {
                debug!("[{}] 回复长度: {} 字符", batch.label(), raw.len());
                batch.complete(raw, Utc::now())
            }
            Err(e) => {
                warn!("[{}] ❌ 处理失败: {}", batch.label(), e);
                batch.fail(e.to_string())
            }
        };

        if let Err(e) = transition {
            error!("[{}] 状态迁移失败: {}", batch.label(), e);
        }

        logging::log_batch_complete(
            batch.batch_number,
            succeeded,
            started.elapsed().as_millis(),
        );
    }

    async fn invoke(&self, batch: &Batch, ctx: &RunContext<'_>) -> Result<String, InferenceError> {
        let call = self.client.analyze_batch(BatchRequest {
            images: &batch.images,
            batch_number: batch.batch_number,
            total_batches: batch.total_batches,
            instruction: ctx.custom_instruction,
        });

        match ctx.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or(Err(InferenceError::DeadlineExceeded)),
            None => call.await,
        }
    }

    /// 批次之间的固定间隔，不超过截止时间
    async fn pace(&self, deadline: Option<Instant>) {
        if self.pacing_delay.is_zero() || deadline_passed(deadline) {
            return;
        }
        let wake = Instant::now() + self.pacing_delay;
        let wake = match deadline {
            Some(deadline) => wake.min(deadline),
            None => wake,
        };
        tokio::time::sleep_until(wake).await;
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
