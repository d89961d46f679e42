//! 统一错误处理模块
//!
//! 定义应用级错误类型，并实现 axum 的 IntoResponse trait 以便自动转换为 HTTP 响应。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;
use crate::services::doc_generator::ScanError;

/// 应用错误枚举
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置相关错误
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM 调用错误
    #[error("model error: {0}")]
    Llm(String),

    /// 请求参数错误
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ConfigError(msg) => AppError::BadRequest(msg),
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl From<ScanError> for AppError {
    fn from(e: ScanError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Llm(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "success": false,
            "error": error_message
        }));

        (status, body).into_response()
    }
}

/// 便捷类型别名
pub type AppResult<T> = Result<T, AppError>;
