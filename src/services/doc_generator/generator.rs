//! 单文件文档生成
//!
//! 状态：`Idle → Parsed → {WholeFileGenerate | PerFunctionGenerate} → Written → ArtifactEmitted → Done`，
//! 任一状态都可能转入 `Failed`。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::artifacts::{title_line, write_artifacts};
use super::formatter::format_source;
use super::prompts::{format_function_prompt, format_whole_file_prompt};
use super::response::{accept_function_reply, accept_whole_file_reply, AcceptedFunction, AcceptedFile};
use super::splice::{dedented, splice, Segment};
use super::types::{DocRequest, FileOutcome, FileState, GenerationMethod, PipelineConfig, Strategy};
use crate::llm::ChatModel;
use crate::services::language::{DocLine, FunctionRecord, Language, LanguageAdapter, SourceKind};

/// 有限次重试的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: usize,
    pub max_attempts: usize,
    pub last_error: Option<String>,
}

impl RetryState {
    /// `max_retries` 为首次调用之外的重试次数
    pub fn new(max_retries: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_retries + 1,
            last_error: None,
        }
    }

    /// 开始下一次尝试；次数用完时返回 false
    pub fn next_attempt(&mut self) -> bool {
        if self.attempt >= self.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    pub fn record_failure(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    /// 最终错误信息
    pub fn into_error(self) -> String {
        self.last_error
            .unwrap_or_else(|| "the model did not return a usable reply".to_string())
    }
}

/// 生成器错误类型
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),
}

/// 文件级策略（每个文件只决定一次）
pub fn select_strategy(kind: SourceKind, method: GenerationMethod, line_count: usize, line_threshold: usize) -> Strategy {
    if method == GenerationMethod::Slow || line_count > line_threshold || kind.grammar().is_none() {
        Strategy::WholeFile
    } else {
        Strategy::PerFunction
    }
}

fn transition(file: &str, state: FileState) {
    match state {
        FileState::Failed => error!("[{}] -> {}", file, state),
        _ => info!("[{}] -> {}", file, state),
    }
}

/// 文档生成器
pub struct DocumentGenerator {
    model: Arc<dyn ChatModel>,
    config: PipelineConfig,
}

impl DocumentGenerator {
    pub fn new(model: Arc<dyn ChatModel>, config: PipelineConfig) -> Self {
        Self { model, config }
    }

    /// 处理单个文件；任何错误都记录在结果中，不向上传播
    pub async fn process_file(&self, path: &Path, request: &DocRequest) -> FileOutcome {
        let display_name = request.display_path(path);
        let outcome = FileOutcome::new(display_name.clone());
        transition(&display_name, FileState::Idle);

        let Some(kind) = SourceKind::from_path(path) else {
            transition(&display_name, FileState::Failed);
            return outcome.fail(GeneratorError::Unsupported(path.to_path_buf()).to_string());
        };

        let source = match fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) => {
                transition(&display_name, FileState::Failed);
                return outcome.fail(GeneratorError::Io(path.to_path_buf(), e).to_string());
            }
        };

        let outcome = self.generate(path, kind, &source, request, outcome).await;
        if outcome.is_failed() {
            transition(&display_name, FileState::Failed);
        } else {
            transition(&display_name, FileState::Done);
        }
        outcome
    }

    async fn generate(
        &self,
        path: &Path,
        kind: SourceKind,
        source: &str,
        request: &DocRequest,
        mut outcome: FileOutcome,
    ) -> FileOutcome {
        let display_name = outcome.file.clone();
        let strategy = select_strategy(kind, request.method, source.lines().count(), self.config.line_threshold);
        outcome.strategy = Some(strategy);
        debug!("[{}] {} file, strategy {:?}", display_name, kind.name(), strategy);

        let mut doc_lines = vec![title_line(&display_name)];
        let generated = match (strategy, kind.grammar()) {
            (Strategy::PerFunction, Some(language)) => {
                self.per_function(language, source, &mut outcome, &mut doc_lines).await
            }
            _ => self.whole_file(kind, source, &mut outcome, &mut doc_lines).await,
        };
        let Some(code) = generated else {
            return outcome;
        };

        let code = if request.use_formatter { format_source(&code) } else { code };
        if let Err(e) = fs::write(path, code).await {
            return outcome.fail(GeneratorError::Io(path.to_path_buf(), e).to_string());
        }
        transition(&display_name, FileState::Written);

        match write_artifacts(&doc_lines, &request.output_dir, &request.relative_path(path), request.formats).await {
            Ok(written) => {
                if !written.is_empty() {
                    transition(&display_name, FileState::ArtifactEmitted);
                }
                outcome.artifacts = written.iter().map(|p| p.to_string_lossy().to_string()).collect();
                outcome
            }
            Err(e) => {
                warn!("[{}] {}", display_name, e);
                // 已写回的源码不回滚
                if outcome.function_errors.is_empty() {
                    outcome.fail(e.to_string())
                } else {
                    outcome
                }
            }
        }
    }

    /// 整文件生成，成功时返回新的文件内容
    async fn whole_file(
        &self,
        kind: SourceKind,
        source: &str,
        outcome: &mut FileOutcome,
        doc_lines: &mut Vec<DocLine>,
    ) -> Option<String> {
        let display_name = outcome.file.clone();

        // 原文件无法解析时不调用模型
        if let Some(language) = kind.grammar() {
            match language.parse(source) {
                Ok(tree) => {
                    outcome.total_functions = language.find_all_functions(&tree).0.len();
                    transition(&display_name, FileState::Parsed);
                }
                Err(e) => {
                    outcome.global_error = Some(e.to_string());
                    return None;
                }
            }
        }
        transition(&display_name, FileState::WholeFileGenerate);

        let prompt = format_whole_file_prompt(kind.name(), kind.doc_style(), &display_name, source);
        let mut retry = RetryState::new(self.config.max_retries);

        while retry.next_attempt() {
            let result = match self.model.chat(&prompt).await {
                Ok(reply) => accept_whole_file_reply(&reply, kind).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(AcceptedFile { code, harvest }) => {
                    if let Some(harvest) = harvest {
                        outcome.total_functions = harvest.total;
                        outcome.documented_functions = harvest.documented;
                        outcome.function_errors = harvest.errors;
                        doc_lines.extend(harvest.lines);
                    }
                    return Some(code);
                }
                Err(message) => {
                    warn!("[{}] attempt {}/{}: {}", display_name, retry.attempt, retry.max_attempts, message);
                    retry.record_failure(message);
                }
            }
        }

        outcome.documented_functions = 0;
        outcome.global_error = Some(retry.into_error());
        None
    }

    /// 逐函数生成，返回拼接后的文件内容；原文件无法解析时返回 None
    async fn per_function(
        &self,
        language: Language,
        source: &str,
        outcome: &mut FileOutcome,
        doc_lines: &mut Vec<DocLine>,
    ) -> Option<String> {
        let display_name = outcome.file.clone();
        let tree = match language.parse(source) {
            Ok(tree) => tree,
            Err(e) => {
                outcome.global_error = Some(e.to_string());
                return None;
            }
        };
        transition(&display_name, FileState::Parsed);

        let (functions, _) = language.find_all_functions(&tree);
        outcome.total_functions = functions.len();
        transition(&display_name, FileState::PerFunctionGenerate);

        let mut segments = Vec::with_capacity(functions.len());
        for function in &functions {
            let replacement = match self.document_function(language, function, source, &display_name).await {
                Ok(AcceptedFunction { code, docs }) => {
                    outcome.documented_functions += 1;
                    doc_lines.extend(docs);
                    Some(code)
                }
                Err(message) => {
                    outcome.function_errors.insert(function.signature.clone(), message);
                    None
                }
            };
            segments.push(Segment {
                span: function.span(),
                replacement,
            });
        }

        Some(splice(source, &segments))
    }

    /// 单个函数的生成与校验（顺序重试）
    async fn document_function(
        &self,
        language: Language,
        function: &FunctionRecord,
        source: &str,
        display_name: &str,
    ) -> Result<AcceptedFunction, String> {
        let code = dedented(source, function.source_range.0..function.source_range.1);
        let prompt = format_function_prompt(language.name(), language.doc_style(), &code);
        let mut retry = RetryState::new(self.config.max_retries);

        while retry.next_attempt() {
            let result = match self.model.chat(&prompt).await {
                Ok(reply) => accept_function_reply(&reply, language, function).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(accepted) => return Ok(accepted),
                Err(message) => {
                    warn!(
                        "[{}] `{}` attempt {}/{}: {}",
                        display_name, function.signature, retry.attempt, retry.max_attempts, message
                    );
                    retry.record_failure(message);
                }
            }
        }
        Err(retry.into_error())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::services::doc_generator::types::OutputFormats;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    type Handler = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

    /// 按 prompt 返回脚本化回复的模型
    pub(crate) struct ScriptedModel {
        handler: Handler,
        pub calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub(crate) fn new(handler: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
            Self {
                handler: Box::new(handler),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.handler)(prompt)
        }
    }

    /// prompt 末尾代码块中的代码
    pub(crate) fn prompt_code(prompt: &str) -> &str {
        let body = prompt.trim_end().trim_end_matches("```").trim_end();
        body.rsplit_once("```\n").map_or("", |(_, code)| code)
    }

    /// 在 Python 函数首行后插入文档字符串
    pub(crate) fn document_python(prompt: &str) -> Result<String, LlmError> {
        let code = prompt_code(prompt);
        let (first, rest) = code.split_once('\n').unwrap_or((code, ""));
        Ok(format!(
            "Here is the documented function:\n```python\n{}\n    \"\"\"Documented.\n\n    Args:\n        x: value\n    \"\"\"\n{}\n```",
            first, rest
        ))
    }

    pub(crate) fn request(root: &Path, files: Vec<PathBuf>) -> DocRequest {
        DocRequest {
            project_root: Some(root.to_path_buf()),
            files,
            method: GenerationMethod::Quick,
            output_dir: root.join(".docs"),
            formats: OutputFormats::default(),
            use_formatter: false,
        }
    }

    const THREE_FUNCTIONS: &str = "import os\n\n\ndef one(a):\n    return a\n\n\ndef two(b):\n    return b\n\n\ndef three(c):\n    return c\n";

    #[test]
    fn test_retry_state() {
        let mut retry = RetryState::new(2);
        let mut attempts = 0;
        while retry.next_attempt() {
            attempts += 1;
            retry.record_failure(format!("bad {}", attempts));
        }
        assert_eq!(attempts, 3);
        assert_eq!(retry.into_error(), "bad 3");
    }

    #[test]
    fn test_select_strategy() {
        let python = SourceKind::Grammar(Language::Python);
        let js = SourceKind::from_path(Path::new("a.js")).unwrap();

        assert_eq!(select_strategy(python, GenerationMethod::Quick, 10, 300), Strategy::PerFunction);
        assert_eq!(select_strategy(python, GenerationMethod::Slow, 10, 300), Strategy::WholeFile);
        assert_eq!(select_strategy(python, GenerationMethod::Quick, 301, 300), Strategy::WholeFile);
        assert_eq!(select_strategy(js, GenerationMethod::Quick, 10, 300), Strategy::WholeFile);
    }

    #[tokio::test]
    async fn test_failed_function_keeps_original_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, THREE_FUNCTIONS).unwrap();

        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt_code(prompt).starts_with("def two") {
                Ok("I cannot document this.".to_string())
            } else {
                document_python(prompt)
            }
        }));
        let generator = DocumentGenerator::new(model.clone(), PipelineConfig::default());

        let outcome = generator.process_file(&path, &request(dir.path(), vec![path.clone()])).await;

        assert_eq!(outcome.total_functions, 3);
        assert_eq!(outcome.documented_functions, 2);
        assert_eq!(outcome.strategy, Some(Strategy::PerFunction));
        assert_eq!(
            outcome.function_errors.get("def two(b)").map(String::as_str),
            Some("could not find a code block in the model reply for the function")
        );
        // 函数 1、3 各一次，函数 2 共 3 次
        assert_eq!(model.calls.load(Ordering::SeqCst), 5);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("import os\n\n\ndef one(a):\n    \"\"\"Documented."));
        assert!(written.contains("\n\n\ndef two(b):\n    return b\n\n\ndef three(c):\n    \"\"\"Documented."));

        let markdown = std::fs::read_to_string(dir.path().join(".docs/calc.py.md")).unwrap();
        assert!(markdown.starts_with("# Documentation for calc.py"));
        assert!(markdown.contains("## Function: def one(a)"));
        assert!(!markdown.contains("## Function: def two(b)"));
    }

    #[tokio::test]
    async fn test_large_java_file_uses_one_whole_file_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Big.java");
        let mut source = String::from("public class Big {\n");
        for i in 0..498 {
            source.push_str(&format!("    int f{}() {{ return {}; }}\n", i, i));
        }
        source.push_str("}\n");
        assert_eq!(source.lines().count(), 500);
        std::fs::write(&path, &source).unwrap();

        let model = Arc::new(ScriptedModel::new(|prompt| {
            let code = prompt_code(prompt).replacen(
                "    int f0()",
                "    /**\n     * Returns zero.\n     * @return zero\n     */\n    int f0()",
                1,
            );
            Ok(format!("```java\n{}\n```", code))
        }));
        let generator = DocumentGenerator::new(model.clone(), PipelineConfig::default());

        let outcome = generator.process_file(&path, &request(dir.path(), vec![path.clone()])).await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.strategy, Some(Strategy::WholeFile));
        assert!(!outcome.is_failed());
        assert_eq!(outcome.total_functions, 498);
        assert_eq!(outcome.documented_functions, 1);
        assert!(std::fs::read_to_string(&path).unwrap().contains("Returns zero."));
    }

    #[tokio::test]
    async fn test_whole_file_retries_exhausted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, THREE_FUNCTIONS).unwrap();

        let model = Arc::new(ScriptedModel::new(|_| Err(LlmError::Unauthorized("invalid key".to_string()))));
        let generator = DocumentGenerator::new(model.clone(), PipelineConfig::default());
        let mut req = request(dir.path(), vec![path.clone()]);
        req.method = GenerationMethod::Slow;

        let outcome = generator.process_file(&path, &req).await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.global_error.as_deref(), Some("authentication failed: invalid key"));
        assert_eq!(outcome.total_functions, 3);
        assert_eq!(outcome.documented_functions, 0);
        // 源文件不变
        assert_eq!(std::fs::read_to_string(&path).unwrap(), THREE_FUNCTIONS);
    }

    #[tokio::test]
    async fn test_unparseable_file_fails_without_model_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.py");
        std::fs::write(&path, "def f(:\n    return '''never closed\n").unwrap();

        let model = Arc::new(ScriptedModel::new(document_python));
        let generator = DocumentGenerator::new(model.clone(), PipelineConfig::default());

        let outcome = generator.process_file(&path, &request(dir.path(), vec![path.clone()])).await;

        assert!(outcome.is_failed());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_and_unsupported_files() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new(document_python));
        let generator = DocumentGenerator::new(model, PipelineConfig::default());

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "hello").unwrap();
        let outcome = generator.process_file(&notes, &request(dir.path(), vec![])).await;
        assert!(outcome.global_error.unwrap().starts_with("unsupported file type"));

        let missing = dir.path().join("missing.py");
        let outcome = generator.process_file(&missing, &request(dir.path(), vec![])).await;
        assert!(outcome.global_error.unwrap().starts_with("I/O error"));
    }

    #[tokio::test]
    async fn test_formatter_applied_before_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.js");
        std::fs::write(&path, "function f() {}\n").unwrap();

        let model = Arc::new(ScriptedModel::new(|_| {
            Ok("```js\n/** Does nothing. */   \nfunction f() {}\n\n\n\n\n```".to_string())
        }));
        let generator = DocumentGenerator::new(model, PipelineConfig::default());
        let mut req = request(dir.path(), vec![path.clone()]);
        req.use_formatter = true;

        let outcome = generator.process_file(&path, &req).await;

        assert!(!outcome.is_failed());
        assert_eq!(outcome.total_functions, 0);
        // 只有标题行，不写出产物
        assert!(outcome.artifacts.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "/** Does nothing. */\nfunction f() {}\n"
        );
    }
}
