//! 文档生成 API 端点

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::get_config;
use crate::error::{AppError, AppResult};
use crate::llm::LlmClient;
use crate::services::doc_generator::{
    DocRequest, DocumentationPipeline, FileOutcome, GenerationMethod, OutputFormats, PipelineConfig,
    SourceScanner,
};
use crate::state::AppState;

/// 创建文档生成路由
pub fn docs_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/docs/generate", post(generate_docs))
}

/// 生成文档请求
#[derive(Debug, Deserialize)]
pub struct GenerateDocsRequest {
    /// 项目根目录
    pub project_path: String,
    /// 要处理的文件（相对项目根目录）；缺省时扫描整个项目
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub method: GenerationMethod,
    /// 文档输出目录（默认为项目下的 `output_dir_name`）
    pub output_dir: Option<String>,
    #[serde(default)]
    pub formats: OutputFormats,
    #[serde(default)]
    pub use_formatter: bool,
}

/// 生成文档响应
#[derive(Debug, Serialize)]
pub struct GenerateDocsResponse {
    pub success: bool,
    pub outcomes: Vec<FileOutcome>,
}

/// 请求中的文件必须是项目内的相对路径
fn project_file(project_root: &Path, file: &str) -> AppResult<PathBuf> {
    let relative = Path::new(file);
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes || relative.as_os_str().is_empty() {
        return Err(AppError::BadRequest(format!(
            "file must be a relative path inside the project: {}",
            file
        )));
    }
    Ok(project_root.join(relative))
}

/// 同步处理一个批次
async fn generate_docs(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateDocsRequest>,
) -> AppResult<Json<GenerateDocsResponse>> {
    info!("Received documentation request: project_path={}", req.project_path);

    let project_root = PathBuf::from(&req.project_path);
    if !project_root.is_dir() {
        return Err(AppError::BadRequest(format!(
            "project path is not a directory: {}",
            req.project_path
        )));
    }

    let config = get_config();
    let output_dir = req
        .output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| project_root.join(&config.output_dir_name));

    let files = match req.files {
        Some(files) => files
            .iter()
            .map(|f| project_file(&project_root, f))
            .collect::<AppResult<Vec<_>>>()?,
        None => SourceScanner::with_default_patterns()
            .skip_dir(output_dir.clone())
            .scan(&project_root)?,
    };

    let model = Arc::new(LlmClient::from_config(&config)?);
    let pipeline = DocumentationPipeline::new(model, PipelineConfig::from(&config), state.aggregator.clone());

    let outcomes = pipeline
        .run(DocRequest {
            project_root: Some(project_root),
            files,
            method: req.method,
            output_dir,
            formats: req.formats,
            use_formatter: req.use_formatter,
        })
        .await;

    Ok(Json(GenerateDocsResponse {
        success: outcomes.iter().all(|o| !o.is_failed()),
        outcomes,
    }))
}
