use std::time::Duration;

use thiserror::Error;

use crate::models::{Batch, BatchStatus};

/// 流水线级别错误
///
/// 只有输入错误和"所有批次都失败"会升级到这一层，
/// 单个批次的传输错误和解析错误都在本地记录为状态。
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 输入的影像集合为空
    #[error("输入影像集合为空，未启动任何批次")]
    EmptyInput,

    /// 单张影像不合法
    #[error("影像 {image_id} 不合法: {reason}")]
    InvalidImage { image_id: String, reason: String },

    /// 影像 ID 重复
    #[error("影像 ID 重复: {image_id}")]
    DuplicateImageId { image_id: String },

    /// 批次大小必须为正数
    #[error("批次大小必须大于 0")]
    InvalidBatchSize,

    /// 所有批次都失败，未生成报告
    #[error("全部 {} 个批次处理失败，未生成报告:\n{detail}", .batches.len())]
    AllBatchesFailed { detail: String, batches: Vec<Batch> },
}

/// 推理服务调用错误（单个批次）
#[derive(Debug, Error)]
pub enum InferenceError {
    /// 构建请求失败
    #[error("构建推理请求失败: {0}")]
    RequestBuild(String),

    /// 网络或 API 返回错误
    #[error("推理服务调用失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },

    /// 单次调用超时
    #[error("推理服务调用超时 ({}秒)", .0.as_secs())]
    Timeout(Duration),

    /// 返回中缺少 choices[0].message.content
    #[error("推理服务返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    /// 整体运行的截止时间已到
    #[error("run deadline exceeded")]
    DeadlineExceeded,
}

/// 批次回复解析错误
#[derive(Debug, Error)]
pub enum ReplyParseError {
    /// 回复中找不到 JSON 对象
    #[error("回复中未找到 JSON 对象")]
    NoJsonObject,

    /// JSON 语法错误
    #[error("JSON 解析失败: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// 批次状态机的非法迁移
#[derive(Debug, Error, PartialEq, Eq)]
#[error("批次 {batch_number} 不能从 {from} 迁移到 {to}")]
pub struct TransitionError {
    pub batch_number: u32,
    pub from: BatchStatus,
    pub to: BatchStatus,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件 TOML 解析失败
    #[error("配置文件 TOML 解析失败: {0}")]
    TomlParseFailed(#[from] toml::de::Error),

    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;
