//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度和整体运行控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 诊断流水线
//! - 校验输入影像集合
//! - 划分批次（委托 `workflow::partitioner`）
//! - 运行结束后汇总、编译报告
//! - 只有"全部批次失败"升级为运行级错误
//!
//! ### `batch_processor` - 批次处理器
//! - 逐批顺序调用推理服务（同一时刻只有一个批次在途）
//! - 维护批次状态机，记录结果或失败原因
//! - 批次之间固定节流，遵守整体截止时间
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (处理 Vec<MedicalImage>)
//!     ↓
//! batch_processor (处理 Vec<Batch>)
//!     ↓
//! services::InferenceClient (处理单个 Batch)
//! ```

pub mod batch_processor;
pub mod pipeline;

pub use batch_processor::{BatchProcessor, RunContext};
pub use pipeline::{validate_images, DiagnosisPipeline, RunRequest};
