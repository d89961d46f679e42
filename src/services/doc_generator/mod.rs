//! 文档生成器模块
//!
//! 调用 LLM 为源文件重写文档注释，并输出 Markdown / Word 文档
//!
//! # 功能
//!
//! - 扫描项目目录，收集支持的源文件
//! - 按文件选择整文件或逐函数生成
//! - 校验模型回复（重新解析代码），有限次重试
//! - 回写源码，输出文档产物
//! - 批次结束后输出汇总报告 `result.md`
//! - 并发处理，结果统一汇总
//!
//! # 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use docsynth::services::doc_generator::{generate_documentation, GenerationMethod, OutputFormats};
//! use docsynth::llm::LlmClient;
//!
//! let model = Arc::new(LlmClient::new("api_key", "https://api.openai.com/v1", "gpt-4o")?);
//! let outcomes = generate_documentation(
//!     model,
//!     vec!["src/main.py".into()],
//!     GenerationMethod::Quick,
//!     ".docs".into(),
//!     OutputFormats::default(),
//!     false,
//! )
//! .await;
//! ```

mod aggregator;
mod artifacts;
mod formatter;
mod generator;
mod processor;
pub mod prompts;
mod report;
mod response;
mod scanner;
mod splice;
pub mod types;

pub use aggregator::ResultAggregator;
pub use processor::{generate_documentation, DocumentationPipeline};
pub use scanner::{ScanError, SourceScanner};
pub use types::{DocRequest, FileOutcome, GenerationMethod, OutputFormats, PipelineConfig, Strategy};
