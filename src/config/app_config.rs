//! 应用配置管理
//!
//! 提供配置的加载、保存、更新功能，使用全局单例模式管理配置状态。

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::AppError;

/// 获取配置文件路径
fn get_config_path() -> PathBuf {
    // 配置文件位于可执行文件同级目录
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.json")
}

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API 密钥
    #[serde(default)]
    pub api_key: String,

    /// LLM API 基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,

    /// 温度参数 (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// 最大 token 数
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// 同时处理的文件数（1-10）
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// 回复不可用时的重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// 超过该行数的文件整文件生成
    #[serde(default = "default_line_threshold")]
    pub line_threshold: usize,

    /// 项目内文档输出目录名
    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_concurrency() -> usize {
    5
}

fn default_max_retries() -> usize {
    2
}

fn default_line_threshold() -> usize {
    300
}

fn default_output_dir_name() -> String {
    ".docs".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            line_threshold: default_line_threshold(),
            output_dir_name: default_output_dir_name(),
        }
    }
}

/// 全局配置单例
static CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(load_config_from_file().unwrap_or_default())
});

/// 从文件加载配置
fn load_config_from_file() -> Option<AppConfig> {
    let path = get_config_path();
    if path.exists() {
        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    } else {
        None
    }
}

/// 保存配置到文件
fn save_config_to_file(config: &AppConfig) -> Result<(), AppError> {
    let path = get_config_path();
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("failed to serialize config: {}", e)))?;
    fs::write(&path, content)
        .map_err(|e| AppError::Config(format!("failed to write config file: {}", e)))?;
    Ok(())
}

/// 获取当前配置（克隆）
pub fn get_config() -> AppConfig {
    CONFIG.read().clone()
}

/// 更新配置
///
/// 接收一个闭包来修改配置，修改后自动保存到文件
pub fn update_config<F>(updater: F) -> Result<AppConfig, AppError>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = CONFIG.write();
    updater(&mut config);
    save_config_to_file(&config)?;
    Ok(config.clone())
}

/// 重新从文件加载配置
pub fn reload_config() {
    if let Some(config) = load_config_from_file() {
        *CONFIG.write() = config;
    }
}
