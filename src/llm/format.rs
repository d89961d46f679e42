//! 请求端点解析
//!
//! 客户端创建时把 `(base_url, model)` 解析为一个 [`Endpoint`]，
//! 之后每次调用直接使用，不再重复拼接 URL。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::LlmError;

/// 线路协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// OpenAI Chat Completions API
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
}

impl ApiFormat {
    /// 按模型名选择：名称含 `claude` 的走 Anthropic，其余走 OpenAI 兼容接口
    pub fn for_model(model: &str) -> Self {
        if model.to_ascii_lowercase().contains("claude") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }

    /// 版本前缀之后的路径
    fn route(self) -> &'static str {
        match self {
            Self::OpenAi => "chat/completions",
            Self::Anthropic => "messages",
        }
    }
}

impl fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// 解析后的请求端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub format: ApiFormat,
    pub url: String,
}

impl Endpoint {
    /// 由配置中的 `base_url` 与模型名解析
    ///
    /// `base_url` 可以是服务根地址、带 `/v1` 的地址或完整端点。
    pub fn resolve(base_url: &str, model: &str) -> Result<Self, LlmError> {
        let format = ApiFormat::for_model(model);
        let trimmed = base_url.trim();

        let Some((scheme, rest)) = trimmed.split_once("://") else {
            return Err(LlmError::ConfigError(format!("base URL needs an http(s) scheme: {}", base_url)));
        };
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(LlmError::ConfigError(format!("unsupported base URL scheme: {}", scheme)));
        }

        // 合并重复斜杠，去掉末尾斜杠
        let path = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        if path.is_empty() {
            return Err(LlmError::ConfigError(format!("base URL has no host: {}", base_url)));
        }
        let mut url = format!("{}://{}", scheme, path.join("/"));

        let route = format.route();
        if !url.ends_with(route) {
            if !path.last().map_or(false, |s| s.eq_ignore_ascii_case("v1")) {
                url.push_str("/v1");
            }
            url.push('/');
            url.push_str(route);
        }

        Ok(Self { format, url })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(base: &str, model: &str) -> String {
        Endpoint::resolve(base, model).unwrap().url
    }

    #[test]
    fn test_format_follows_model_name() {
        assert_eq!(ApiFormat::for_model("gpt-4o"), ApiFormat::OpenAi);
        assert_eq!(ApiFormat::for_model("deepseek-coder"), ApiFormat::OpenAi);
        assert_eq!(ApiFormat::for_model("Claude-3-5-Sonnet"), ApiFormat::Anthropic);
    }

    #[test]
    fn test_resolve_openai_endpoints() {
        let expected = "https://api.openai.com/v1/chat/completions";
        assert_eq!(url("https://api.openai.com", "gpt-4o"), expected);
        assert_eq!(url("https://api.openai.com/v1/", "gpt-4o"), expected);
        assert_eq!(url(" https://api.openai.com//v1 ", "gpt-4o"), expected);
        assert_eq!(url(expected, "gpt-4o"), expected);
        // 本地兼容服务
        assert_eq!(
            url("http://localhost:11434/v1", "qwen2.5-coder"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_resolve_anthropic_endpoint() {
        let endpoint = Endpoint::resolve("https://api.anthropic.com", "claude-3-opus").unwrap();
        assert_eq!(endpoint.format, ApiFormat::Anthropic);
        assert_eq!(endpoint.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(
            url("https://proxy.example/v1/messages", "claude-3-opus"),
            "https://proxy.example/v1/messages"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        for base in ["", "api.openai.com", "ftp://api.openai.com", "https://", "https:///"] {
            assert!(
                matches!(Endpoint::resolve(base, "gpt-4o"), Err(LlmError::ConfigError(_))),
                "{}",
                base
            );
        }
    }
}
