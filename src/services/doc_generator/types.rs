//! 文档生成器类型定义
//!
//! 批次请求、文件结果与流水线状态

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::config::AppConfig;

/// 生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    /// 有注释语法且文件不大时逐函数生成
    #[default]
    Quick,
    /// 始终整文件生成
    Slow,
}

/// 文件级生成策略（每个文件只决定一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    WholeFile,
    PerFunction,
}

/// 文档产物格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormats {
    #[serde(default = "default_true")]
    pub markdown: bool,
    #[serde(default)]
    pub document: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            markdown: true,
            document: false,
        }
    }
}

impl OutputFormats {
    pub fn any(&self) -> bool {
        self.markdown || self.document
    }
}

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Idle,
    Parsed,
    WholeFileGenerate,
    PerFunctionGenerate,
    Written,
    ArtifactEmitted,
    Done,
    Failed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Idle => "idle",
            FileState::Parsed => "parsed",
            FileState::WholeFileGenerate => "whole_file_generate",
            FileState::PerFunctionGenerate => "per_function_generate",
            FileState::Written => "written",
            FileState::ArtifactEmitted => "artifact_emitted",
            FileState::Done => "done",
            FileState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// 文件路径（相对项目根目录，若有）
    pub file: String,
    /// 整个文件失败的原因
    pub global_error: Option<String>,
    pub total_functions: usize,
    pub documented_functions: usize,
    /// 函数签名 -> 错误信息
    pub function_errors: BTreeMap<String, String>,
    pub strategy: Option<Strategy>,
    /// 写出的文档产物路径
    pub artifacts: Vec<String>,
}

impl FileOutcome {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            global_error: None,
            total_functions: 0,
            documented_functions: 0,
            function_errors: BTreeMap::new(),
            strategy: None,
            artifacts: Vec::new(),
        }
    }

    /// 标记整个文件失败
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.global_error = Some(error.into());
        self.documented_functions = 0;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.global_error.is_some()
    }
}

/// 批次请求
#[derive(Debug, Clone)]
pub struct DocRequest {
    /// 项目根目录，用于计算相对路径
    pub project_root: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    pub method: GenerationMethod,
    /// 文档产物输出目录
    pub output_dir: PathBuf,
    pub formats: OutputFormats,
    pub use_formatter: bool,
}

impl DocRequest {
    /// 文件相对项目根目录的路径；不在根目录下时只取文件名
    pub fn relative_path(&self, file: &Path) -> PathBuf {
        self.project_root
            .as_deref()
            .and_then(|root| file.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .or_else(|| file.file_name().map(PathBuf::from))
            .unwrap_or_else(|| file.to_path_buf())
    }

    /// 结果中展示的文件名
    pub fn display_path(&self, file: &Path) -> String {
        match &self.project_root {
            Some(_) => self.relative_path(file).to_string_lossy().replace('\\', "/"),
            None => file.to_string_lossy().to_string(),
        }
    }
}

/// 所有文件所在目录的最长公共祖先
///
/// 绝对路径与相对路径混用、没有公共部分时返回 `None`。
pub fn common_root(files: &[PathBuf]) -> Option<PathBuf> {
    let mut parents = files.iter().map(|f| f.parent().unwrap_or(Path::new("")));
    let mut root: Vec<Component> = parents.next()?.components().collect();
    for parent in parents {
        let shared = root
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        root.truncate(shared);
    }
    if root.is_empty() && files.iter().any(|f| f.has_root()) {
        return None;
    }
    Some(root.iter().collect())
}

/// 流水线参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 同时处理的文件数（1..=10）
    pub concurrency: usize,
    /// 首次调用之外的重试次数
    pub max_retries: usize,
    /// 超过该行数的文件整文件生成
    pub line_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 2,
            line_threshold: 300,
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.concurrency.clamp(1, 10),
            max_retries: config.max_retries,
            line_threshold: config.line_threshold,
        }
    }
}
