//! 批处理调度
//!
//! 多个文件并发处理（信号量限流），每个文件产生一个结果，
//! 全部完成后从汇总器一次性取出。

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::aggregator::ResultAggregator;
use super::generator::DocumentGenerator;
use super::report::write_report;
use super::types::{common_root, DocRequest, FileOutcome, GenerationMethod, OutputFormats, PipelineConfig};
use crate::config::get_config;
use crate::llm::ChatModel;

/// 文档生成流水线
pub struct DocumentationPipeline {
    generator: Arc<DocumentGenerator>,
    aggregator: Arc<ResultAggregator>,
    config: PipelineConfig,
    /// 并行控制信号量
    semaphore: Arc<Semaphore>,
}

impl DocumentationPipeline {
    pub fn new(model: Arc<dyn ChatModel>, config: PipelineConfig, aggregator: Arc<ResultAggregator>) -> Self {
        let concurrency = config.concurrency.clamp(1, 10);
        let config = PipelineConfig { concurrency, ..config };

        Self {
            generator: Arc::new(DocumentGenerator::new(model, config.clone())),
            aggregator,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            config,
        }
    }

    /// 处理一个批次，返回每个文件的结果
    ///
    /// 批次之间互斥；返回时汇总器为空
    pub async fn run(&self, request: DocRequest) -> Vec<FileOutcome> {
        let _batch = self.aggregator.begin_batch().await;
        let batch_id = Uuid::new_v4();

        self.run_batch(&request)
            .instrument(info_span!("batch", id = %batch_id))
            .await
    }

    async fn run_batch(&self, request: &DocRequest) -> Vec<FileOutcome> {
        info!(
            "Starting documentation batch: {} files, method={:?}, concurrency={}",
            request.files.len(),
            request.method,
            self.config.concurrency
        );

        stream::iter(request.files.iter())
            .for_each_concurrent(self.config.concurrency, |file| {
                let semaphore = self.semaphore.clone();
                let generator = self.generator.clone();
                let aggregator = self.aggregator.clone();

                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        error!("Semaphore closed before {} was processed", file.display());
                        aggregator.collect(FileOutcome::new(request.display_path(file)).fail("pipeline stopped"));
                        return;
                    };
                    let outcome = generator.process_file(file, request).await;
                    aggregator.collect(outcome);
                }
            })
            .await;

        let mut outcomes = self.aggregator.drain();
        outcomes.sort_by(|a, b| a.file.cmp(&b.file));

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let total: usize = outcomes.iter().map(|o| o.total_functions).sum();
        let documented: usize = outcomes.iter().map(|o| o.documented_functions).sum();
        info!(
            "Documentation batch finished: {} files ({} failed), {}/{} functions documented",
            outcomes.len(),
            failed,
            documented,
            total
        );

        if !outcomes.is_empty() {
            match write_report(&request.output_dir, &outcomes).await {
                Ok(path) => info!("Batch report written to {}", path.display()),
                Err(e) => warn!("{}", e),
            }
        }
        outcomes
    }
}

/// 批处理入口（使用当前应用配置）
pub async fn generate_documentation(
    model: Arc<dyn ChatModel>,
    files: Vec<PathBuf>,
    method: GenerationMethod,
    output_dir: PathBuf,
    formats: OutputFormats,
    use_formatter: bool,
) -> Vec<FileOutcome> {
    let config = PipelineConfig::from(&get_config());
    let pipeline = DocumentationPipeline::new(model, config, Arc::new(ResultAggregator::new()));
    // 同名文件按各自的相对路径输出，互不覆盖
    let project_root = common_root(&files);

    pipeline
        .run(DocRequest {
            project_root,
            files,
            method,
            output_dir,
            formats,
            use_formatter,
        })
        .await
}
