//! 语言适配层类型定义
//!
//! 结构记录（函数/类）、文档行以及解析错误

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// 函数/方法结构记录
///
/// 由结构提取器生成，生成后不再修改；按源码位置排序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// 函数名
    pub name: String,
    /// 规范化后的声明（不含注解/属性）
    pub signature: String,
    /// 函数体文本
    pub body: String,
    /// 函数在源码中的字节范围（签名起点到函数体结束）
    pub source_range: (usize, usize),
    /// 关联的文档注释原文，没有时为空串
    pub raw_comment: String,
    /// 文档注释的字节范围
    pub comment_range: Option<(usize, usize)>,
}

impl FunctionRecord {
    /// 函数自身文本（签名 + 函数体）
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.source_range.0..self.source_range.1]
    }

    /// 回写时被替换的字节范围
    ///
    /// 注释位于声明之前时从注释起点开始，否则与 `source_range` 相同
    pub fn span(&self) -> Range<usize> {
        let start = match self.comment_range {
            Some((comment_start, _)) if comment_start < self.source_range.0 => comment_start,
            _ => self.source_range.0,
        };
        start..self.source_range.1
    }

    pub fn has_comment(&self) -> bool {
        !self.raw_comment.is_empty()
    }
}

/// 类结构记录（仅作为边界标记）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub signature: String,
}

/// 规范化的文档行
///
/// 与渲染方式无关，顺序即输出顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DocLine {
    Title(String),
    Subheader(String),
    Bold(String),
    Text(String),
    Bullet(String),
    BulletList(Vec<String>),
}

impl DocLine {
    pub fn bold(text: impl Into<String>) -> Self {
        Self::Bold(text.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        Self::Bullet(text.into())
    }
}

/// 语法事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    /// 类/接口/模块头
    Class { name: String },
    /// 函数定义，`body_start` 为函数体起点
    Function { name: String, body_start: usize },
    /// 文档注释块
    DocComment,
}

/// 语法事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// 规范化后的声明文本
    pub signature: String,
    /// 节点字节范围
    pub range: (usize, usize),
}

/// 解析结果
///
/// 扫描器输出的扁平事件序列（按源码位置排序），
/// 由 `find_all_functions` 按作用域栈还原结构
#[derive(Debug, Clone)]
pub struct SourceTree {
    source: String,
    nodes: Vec<SyntaxNode>,
}

impl SourceTree {
    pub fn new(source: impl Into<String>, mut nodes: Vec<SyntaxNode>) -> Self {
        nodes.sort_by_key(|n| n.range.0);
        Self {
            source: source.into(),
            nodes,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[SyntaxNode] {
        &self.nodes
    }
}

/// 单个函数的文档提取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDocs {
    pub lines: Vec<DocLine>,
    /// (函数签名, 错误信息)
    pub error: Option<(String, String)>,
}

impl FunctionDocs {
    pub fn is_documented(&self) -> bool {
        self.error.is_none() && !self.lines.is_empty()
    }
}

/// 源码解析错误（整个文件失败）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{language}: unterminated {what} starting at byte {offset}")]
    Unterminated {
        language: &'static str,
        what: &'static str,
        offset: usize,
    },

    #[error("{language}: unbalanced `{token}` at byte {offset}")]
    Unbalanced {
        language: &'static str,
        token: &'static str,
        offset: usize,
    },

    #[error("{language}: {message} (line {line})")]
    Structure {
        language: &'static str,
        message: String,
        line: usize,
    },
}

/// 文档注释无法解析（单个函数失败）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not extract the documentation from the function: {reason}")]
pub struct DocExtractionError {
    pub reason: String,
}

impl DocExtractionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// 把多行声明压缩为单行
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 字节偏移对应的行号（从 1 开始）
pub fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source_range: (usize, usize), comment_range: Option<(usize, usize)>) -> FunctionRecord {
        FunctionRecord {
            name: "f".to_string(),
            signature: "f()".to_string(),
            body: String::new(),
            source_range,
            raw_comment: if comment_range.is_some() { "/** x */".to_string() } else { String::new() },
            comment_range,
        }
    }

    #[test]
    fn test_span_includes_leading_comment() {
        assert_eq!(record((20, 40), Some((5, 15))).span(), 5..40);
    }

    #[test]
    fn test_span_ignores_inner_docstring() {
        // Python 文档字符串位于函数体内部
        assert_eq!(record((20, 80), Some((30, 50))).span(), 20..80);
        assert_eq!(record((20, 80), None).span(), 20..80);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("def  add(a,\n        b)"), "def add(a, b)");
    }

    #[test]
    fn test_line_of() {
        assert_eq!(line_of("a\nb\nc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }
}
