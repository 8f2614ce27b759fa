//! 流程层（Workflow Layer）
//!
//! 三个纯函数阶段，彼此之间只传递快照：
//!
//! ```text
//! partitioner::partition  (Vec<MedicalImage> → Vec<Batch>)
//!     ↓  编排层逐批调用推理服务
//! aggregator::aggregate   (&[Batch] → Aggregation)
//!     ↓
//! compiler::compile       (Aggregation + &[Batch] → Report)
//! ```

pub mod aggregator;
pub mod compiler;
pub mod partitioner;

pub use aggregator::{aggregate, Aggregation};
pub use compiler::{build_summary, compile, ReportMeta};
pub use partitioner::partition;
