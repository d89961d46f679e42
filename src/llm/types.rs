//! LLM 类型定义

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// 角色：system, user, assistant
    pub role: String,
    /// 消息内容
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 流式响应块
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    /// 文本内容
    pub content: Option<String>,
    /// 完成原因
    pub finish_reason: Option<String>,
}

/// 聊天选项
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// 温度参数
    pub temperature: Option<f64>,
    /// 最大 token 数
    pub max_tokens: Option<u32>,
}

/// LLM 错误类型
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP 请求错误
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// 认证失败（401/403）
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// 请求被拒绝（400/404/422）
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 其他 API 错误
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// 配置错误
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// 流解析错误
    #[error("stream error: {0}")]
    StreamError(String),
}

impl LlmError {
    /// 按 HTTP 状态码分类
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => LlmError::Unauthorized(message),
            400 | 404 | 422 => LlmError::BadRequest(message),
            _ => LlmError::ApiError { status, message },
        }
    }
}

/// 文档生成使用的模型接口
///
/// 一次调用发送一个 prompt，返回完整回复文本
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            LlmError::from_status(401, "no key".to_string()),
            LlmError::Unauthorized(_)
        ));
        assert!(matches!(
            LlmError::from_status(422, "bad".to_string()),
            LlmError::BadRequest(_)
        ));
        assert_eq!(
            LlmError::from_status(503, "busy".to_string()).to_string(),
            "API error (503): busy"
        );
    }
}
