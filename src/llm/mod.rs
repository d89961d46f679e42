//! LLM 模块
//!
//! 提供统一的 LLM 客户端，支持 OpenAI 和 Anthropic API 格式。
//! 文档流水线只依赖 [`ChatModel`] trait。

mod anthropic;
mod client;
mod format;
mod openai;
mod sse;
mod types;

pub use client::LlmClient;
pub use format::ApiFormat;
pub use types::*;
