//! 配置管理端点

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{get_config, reload_config, update_config, AppConfig};
use crate::error::{AppError, AppResult};
use crate::llm::{ApiFormat, ChatModel, ChatOptions, LlmClient};
use crate::state::AppState;

/// 配置响应（隐藏 api_key 的实际值）
#[derive(Serialize)]
pub struct ConfigResponse {
    /// 是否已设置 API 密钥
    pub api_key_set: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub concurrency: usize,
    pub max_retries: usize,
    pub line_threshold: usize,
    pub output_dir_name: String,
}

impl From<AppConfig> for ConfigResponse {
    fn from(config: AppConfig) -> Self {
        Self {
            api_key_set: !config.api_key.is_empty(),
            base_url: config.base_url,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            concurrency: config.concurrency,
            max_retries: config.max_retries,
            line_threshold: config.line_threshold,
            output_dir_name: config.output_dir_name,
        }
    }
}

/// 配置更新请求
#[derive(Deserialize, Default)]
pub struct ConfigUpdateRequest {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<usize>,
    pub line_threshold: Option<usize>,
    pub output_dir_name: Option<String>,
}

impl ConfigUpdateRequest {
    /// 校验并写入配置
    fn apply(self, config: &mut AppConfig) {
        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature.clamp(0.0, 2.0);
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.clamp(1, 10);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(line_threshold) = self.line_threshold {
            config.line_threshold = line_threshold;
        }
        if let Some(output_dir_name) = self.output_dir_name {
            config.output_dir_name = output_dir_name;
        }
    }
}

/// 配置更新响应
#[derive(Serialize)]
pub struct ConfigUpdateResponse {
    pub success: bool,
    pub message: String,
}

/// 连接测试请求
#[derive(Deserialize)]
pub struct TestConnectionRequest {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// 连接测试响应
#[derive(Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    pub model: String,
    /// 实际请求的端点
    pub endpoint: String,
    pub api_format: ApiFormat,
}

/// 获取当前配置
async fn get_config_handler() -> Json<ConfigResponse> {
    Json(ConfigResponse::from(get_config()))
}

/// 更新配置
async fn update_config_handler(
    Json(req): Json<ConfigUpdateRequest>,
) -> AppResult<Json<ConfigUpdateResponse>> {
    update_config(|config| req.apply(config))?;

    Ok(Json(ConfigUpdateResponse {
        success: true,
        message: "Config updated successfully".to_string(),
    }))
}

/// 重新读取配置文件
async fn reload_config_handler() -> Json<ConfigResponse> {
    reload_config();
    Json(ConfigResponse::from(get_config()))
}

/// 测试 LLM 连接
async fn test_connection_handler(
    Json(req): Json<TestConnectionRequest>,
) -> AppResult<Json<TestConnectionResponse>> {
    let config = get_config();

    let api_key = req.api_key.unwrap_or(config.api_key);
    let base_url = req.base_url.unwrap_or(config.base_url);
    let model = req.model.unwrap_or(config.model);

    let client = LlmClient::new(api_key, base_url, model.clone())?.with_options(ChatOptions {
        max_tokens: Some(10),
        ..Default::default()
    });

    client
        .chat("Hi")
        .await
        .map_err(|e| AppError::BadRequest(format!("Connection failed: {}", e)))?;

    Ok(Json(TestConnectionResponse {
        success: true,
        message: "Connection successful".to_string(),
        model,
        endpoint: client.endpoint().url.clone(),
        api_format: client.endpoint().format,
    }))
}

/// 创建配置路由
pub fn config_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/config", get(get_config_handler).put(update_config_handler))
        .route("/api/config/reload", post(reload_config_handler))
        .route("/api/config/test", post(test_connection_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_clamps_values() {
        let mut config = AppConfig::default();
        let req = ConfigUpdateRequest {
            concurrency: Some(64),
            temperature: Some(3.5),
            line_threshold: Some(120),
            ..Default::default()
        };
        req.apply(&mut config);

        assert_eq!(config.concurrency, 10);
        assert!((config.temperature - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.line_threshold, 120);
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_config_response_hides_key() {
        let config = AppConfig {
            api_key: "sk-secret".to_string(),
            ..AppConfig::default()
        };
        let json = serde_json::to_value(ConfigResponse::from(config)).unwrap();

        assert_eq!(json["api_key_set"], true);
        assert!(json.get("api_key").is_none());
    }
}
