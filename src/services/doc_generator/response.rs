//! 模型回复解析
//!
//! 从回复中取出第一个代码块，并把其中的代码当作源码重新解析校验，
//! 不信任回复中的任何结构化内容。

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::services::language::{
    DocLine, Harvest, Language, LanguageAdapter, ParseError, SourceKind, FunctionRecord,
};

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```([\w#+.\-]*)[ \t]*\r?\n(.*?)```").unwrap());

/// 首行包含这些词时视为代码
const CODE_HINTS: &[&str] = &["import", "def", "class", "print"];

/// 回复所属的请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyContext {
    WholeFile,
    Function,
}

impl fmt::Display for ReplyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyContext::WholeFile => f.write_str("whole file"),
            ReplyContext::Function => f.write_str("function"),
        }
    }
}

/// 回复中的代码块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// 围栏后声明的语言
    pub declared_language: Option<String>,
    pub code: String,
    /// 代码块首行
    pub description: String,
}

/// 回复格式错误（触发重试）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseFormatError {
    #[error("could not find a code block in the model reply for the {0}")]
    MissingCodeBlock(ReplyContext),

    #[error("the code block has no `{0}` documentation comment")]
    MissingMarker(&'static str),

    #[error("the code in the model reply could not be parsed: {0}")]
    Unparseable(#[from] ParseError),

    #[error("the code in the model reply contains no function")]
    NoFunction,

    #[error("the documented function is unusable: {0}")]
    Undocumented(String),
}

/// 取出回复中的第一个代码块
///
/// 没有语言标记且首行不含代码特征词时，首行被当作说明文字从代码中移除。
pub fn extract_code_block(reply: &str, context: ReplyContext) -> Result<CodeBlock, ResponseFormatError> {
    let caps = RE_FENCE
        .captures(reply)
        .ok_or(ResponseFormatError::MissingCodeBlock(context))?;

    let tag = caps[1].trim();
    let declared_language = (!tag.is_empty()).then(|| tag.to_string());
    let body = caps[2].trim_end_matches(['\n', '\r']);
    let (first_line, rest) = match body.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (body, ""),
    };

    let looks_like_code = CODE_HINTS.iter().any(|hint| first_line.contains(hint));
    let code = if declared_language.is_none() && !looks_like_code {
        rest.to_string()
    } else {
        body.to_string()
    };

    Ok(CodeBlock {
        declared_language,
        code,
        description: first_line.trim_end_matches('\r').to_string(),
    })
}

/// 通过校验的单函数回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFunction {
    pub code: String,
    /// 以 `Subheader("Function: ...")` 开头
    pub docs: Vec<DocLine>,
}

/// 校验单函数回复：含注释标记、可解析、至少一个函数且该函数文档可用
pub fn accept_function_reply(
    reply: &str,
    language: Language,
    original: &FunctionRecord,
) -> Result<AcceptedFunction, ResponseFormatError> {
    let block = extract_code_block(reply, ReplyContext::Function)?;
    if !language.has_comment_marker(&block.code) {
        return Err(ResponseFormatError::MissingMarker(language.comment_marker()));
    }

    let tree = language.parse(&block.code)?;
    let (functions, _) = language.find_all_functions(&tree);
    let function = functions
        .iter()
        .find(|f| f.name == original.name)
        .or_else(|| functions.first())
        .ok_or(ResponseFormatError::NoFunction)?;

    let docs = language.document_function(function);
    if let Some((_, message)) = docs.error {
        return Err(ResponseFormatError::Undocumented(message));
    }

    Ok(AcceptedFunction {
        code: block.code,
        docs: docs.lines,
    })
}

/// 通过校验的整文件回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    pub code: String,
    /// 有注释语法的语言才有
    pub harvest: Option<Harvest>,
}

/// 校验整文件回复：含注释标记；有注释语法时必须能重新解析
pub fn accept_whole_file_reply(reply: &str, kind: SourceKind) -> Result<AcceptedFile, ResponseFormatError> {
    let block = extract_code_block(reply, ReplyContext::WholeFile)?;
    if !kind.has_comment_marker(&block.code) {
        return Err(ResponseFormatError::MissingMarker(kind.comment_marker()));
    }

    let harvest = match kind.grammar() {
        Some(language) => Some(language.harvest(&block.code)?),
        None => None,
    };
    Ok(AcceptedFile {
        code: block.code,
        harvest,
    })
}
