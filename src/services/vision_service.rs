//! 视觉推理服务 - 业务能力层
//!
//! 只负责"把一批影像发给模型，拿回原始回复"，不解析回复内容
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI Chat Completions 协议的任意服务端点
//! - 影像以 `data:` URL 内联（base64）

use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use backoff::ExponentialBackoffBuilder;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::InferenceError;
use crate::models::MedicalImage;
use crate::services::prompt;

/// 单个批次的推理请求
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub images: &'a [MedicalImage],
    /// 从1开始
    pub batch_number: u32,
    pub total_batches: u32,
    /// 自定义指令，`None` 时使用默认指令
    pub instruction: Option<&'a str>,
}

/// 推理客户端
///
/// 编排层只依赖这个 trait，测试时可替换为脚本化实现。
/// 实现方负责单次调用的超时，且不做任何重试。
pub trait InferenceClient: Send + Sync {
    fn analyze_batch<'a>(
        &'a self,
        request: BatchRequest<'a>,
    ) -> BoxFuture<'a, Result<String, InferenceError>>;
}

impl<T: InferenceClient + ?Sized> InferenceClient for Arc<T> {
    fn analyze_batch<'a>(
        &'a self,
        request: BatchRequest<'a>,
    ) -> BoxFuture<'a, Result<String, InferenceError>> {
        (**self).analyze_batch(request)
    }
}

/// 基于 OpenAI 兼容接口的视觉推理服务
pub struct VisionService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl VisionService {
    /// 创建新的视觉推理服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        // 关闭客户端内置的指数退避重试，每次调用只发一个请求
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: config.request_timeout(),
        }
    }

    /// 覆盖单次调用超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 构建多模态请求：系统消息 + 用户消息（1 个文本部分 + N 个图片部分）
    pub fn build_request(
        &self,
        request: &BatchRequest<'_>,
    ) -> Result<CreateChatCompletionRequest, InferenceError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt::SYSTEM_MESSAGE)
            .build()
            .map_err(|e| InferenceError::RequestBuild(e.to_string()))?;

        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            Vec::with_capacity(request.images.len() + 1);

        content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: prompt::build_batch_text(
                    request.batch_number,
                    request.total_batches,
                    request.instruction,
                ),
            },
        ));

        for image in request.images {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: to_data_url(image),
                        detail: Some(ImageDetail::High),
                    },
                },
            ));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| InferenceError::RequestBuild(e.to_string()))?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| InferenceError::RequestBuild(e.to_string()))
    }

    /// 发送一次请求，返回模型原始回复
    async fn send(&self, request: BatchRequest<'_>) -> Result<String, InferenceError> {
        debug!(
            "调用视觉推理 API，模型: {}，批次 {}/{}，影像 {} 张",
            self.model_name,
            request.batch_number,
            request.total_batches,
            request.images.len()
        );

        let chat_request = self.build_request(&request)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(chat_request))
            .await
            .map_err(|_| {
                warn!(
                    "批次 {}/{} 推理调用超时 ({}秒)",
                    request.batch_number,
                    request.total_batches,
                    self.timeout.as_secs()
                );
                InferenceError::Timeout(self.timeout)
            })?
            .map_err(|e| {
                warn!("视觉推理 API 调用失败: {}", e);
                InferenceError::Transport {
                    model: self.model_name.clone(),
                    message: e.to_string(),
                }
            })?;

        debug!("视觉推理 API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| InferenceError::EmptyContent {
                model: self.model_name.clone(),
            })
    }
}

impl InferenceClient for VisionService {
    fn analyze_batch<'a>(
        &'a self,
        request: BatchRequest<'a>,
    ) -> BoxFuture<'a, Result<String, InferenceError>> {
        self.send(request).boxed()
    }
}

/// 影像内联为 `data:{media_type};base64,{payload}`
pub fn to_data_url(image: &MedicalImage) -> String {
    format!(
        "data:{};base64,{}",
        image.media_type,
        STANDARD.encode(image.data())
    )
}
