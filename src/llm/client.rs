//! 统一 LLM 客户端

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use super::anthropic::stream_anthropic;
use super::format::{ApiFormat, Endpoint};
use super::openai::stream_openai;
use super::types::{ChatChunk, ChatMessage, ChatModel, ChatOptions, LlmError};
use crate::config::AppConfig;

const SYSTEM_PROMPT: &str = "You are a professional coding and documentation assistant.";

/// 统一 LLM 客户端
///
/// 支持 OpenAI 和 Anthropic API 格式，根据模型名称自动选择
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: Endpoint,
    model: String,
    options: ChatOptions,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::ConfigError("API Key is required".to_string()));
        }
        let model: String = model.into();
        let base_url: String = base_url.into();
        let endpoint = Endpoint::resolve(&base_url, &model)?;

        // 整文件生成的回复可能很长
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(LlmError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
            options: ChatOptions::default(),
        })
    }

    /// 按应用配置创建
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        Ok(Self::new(&config.api_key, &config.base_url, &config.model)?.with_options(ChatOptions {
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }))
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// 流式聊天（自动检测 API 格式）
    pub fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>> {
        debug!("LLM request: model={}, endpoint={}", self.model, self.endpoint);

        match self.endpoint.format {
            ApiFormat::OpenAi => stream_openai(
                &self.client,
                &self.api_key,
                &self.endpoint.url,
                messages,
                &self.model,
                &self.options,
            ),
            ApiFormat::Anthropic => stream_anthropic(
                &self.client,
                &self.api_key,
                &self.endpoint.url,
                messages,
                &self.model,
                &self.options,
            ),
        }
    }

    /// 流式请求并收集完整响应
    pub async fn stream_and_collect(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let mut stream = self.stream_chat(messages);
        let mut content = String::new();
        let mut chunk_count = 0usize;
        let mut finish_reason = None;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            chunk_count += 1;
            if let Some(text) = chunk.content {
                content.push_str(&text);
            }
            if chunk.finish_reason.is_some() {
                finish_reason = chunk.finish_reason;
            }
        }

        info!(
            "LLM response collected: model={}, chunks={}, chars={}, finish_reason={:?}",
            self.model,
            chunk_count,
            content.len(),
            finish_reason
        );
        if content.is_empty() {
            return Err(LlmError::StreamError("empty response".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.stream_and_collect(messages).await
    }
}
