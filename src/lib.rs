//! # Batch Diagnosis
//!
//! 医学影像批量诊断流水线：把一组影像切分为固定大小的批次，逐批提交给
//! 视觉大模型，再把各批次的结构化发现汇总为一份综合诊断报告。
//!
//! ## 架构设计
//!
//! ### ① 数据模型（Models）
//! - `models/` - `MedicalImage`、`Batch`（含状态机）、`Finding`、`Report`
//! - `models/loaders` - 从目录加载影像
//!
//! ### ② 业务能力层（Services）
//! - `VisionService` - 单批次视觉推理调用（`InferenceClient` 的默认实现）
//! - `reply_parser` - 容错解析模型回复
//! - `report_formatter` - 报告纯文本导出
//!
//! ### ③ 流程层（Workflow）
//! - `partitioner` → `aggregator` → `compiler`，全部为纯函数
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 逐批顺序处理，失败隔离，节流
//! - `orchestrator/pipeline` - 输入校验到报告生成的完整运行

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{InferenceError, PipelineError, PipelineResult, ReplyParseError};
pub use models::{Batch, BatchStatus, Finding, MedicalImage, Report, RunOutcome, Severity};
pub use orchestrator::{DiagnosisPipeline, RunRequest};
pub use services::{format_report_text, BatchRequest, InferenceClient, VisionService};
