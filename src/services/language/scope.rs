//! 作用域栈遍历
//!
//! 将扫描器输出的扁平事件序列还原为函数/类记录。
//! 每个打开的作用域持有自己的缓冲区，关闭时才生成记录，避免跨作用域串文本。

use super::types::{ClassRecord, FunctionRecord, SourceTree, SyntaxKind, SyntaxNode};

/// 文档注释的挂载位置（每种语言固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// 紧邻声明之前（Java / C# / Visual Basic）
    Preceding,
    /// 函数体的第一条语句（Python 文档字符串）
    FirstStatement,
}

/// 正在构建的函数记录
struct PendingFunction {
    name: String,
    signature: String,
    range: (usize, usize),
    body_start: usize,
    comment: Option<(usize, usize)>,
}

impl PendingFunction {
    fn flush(self, source: &str) -> FunctionRecord {
        let raw_comment = self
            .comment
            .map(|(start, end)| source[start..end].to_string())
            .unwrap_or_default();

        FunctionRecord {
            name: self.name,
            signature: self.signature,
            body: source[self.body_start..self.range.1].to_string(),
            source_range: self.range,
            raw_comment,
            comment_range: self.comment,
        }
    }
}

enum OpenScope {
    Class { end: usize },
    Function(PendingFunction),
    /// 嵌套在函数体内的定义，只占位不产出记录
    Nested { end: usize },
}

impl OpenScope {
    fn end(&self) -> usize {
        match self {
            OpenScope::Class { end } | OpenScope::Nested { end } => *end,
            OpenScope::Function(f) => f.range.1,
        }
    }
}

/// 从事件序列提取所有函数与类
///
/// 函数被展平到整个文件的列表中；嵌套在函数体内的定义属于外层函数体。
pub fn find_all_functions(
    tree: &SourceTree,
    attachment: Attachment,
) -> (Vec<FunctionRecord>, Vec<ClassRecord>) {
    let source = tree.source();
    let mut stack: Vec<OpenScope> = Vec::new();
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut pending_doc: Option<(usize, usize)> = None;

    for node in tree.nodes() {
        close_scopes(&mut stack, node.range.0, source, &mut functions);
        let inside_function = stack
            .iter()
            .any(|s| matches!(s, OpenScope::Function(_) | OpenScope::Nested { .. }));

        match &node.kind {
            SyntaxKind::DocComment => match attachment {
                Attachment::Preceding => {
                    if !inside_function {
                        pending_doc = Some(node.range);
                    }
                }
                Attachment::FirstStatement => {
                    if let Some(OpenScope::Function(f)) = stack.last_mut() {
                        if f.comment.is_none() && is_first_statement(source, f.body_start, node.range.0) {
                            f.comment = Some(node.range);
                        }
                    }
                }
            },
            SyntaxKind::Class { name } => {
                pending_doc = None;
                if inside_function {
                    stack.push(OpenScope::Nested { end: node.range.1 });
                    continue;
                }
                classes.push(ClassRecord {
                    name: name.clone(),
                    signature: node.signature.clone(),
                });
                stack.push(OpenScope::Class { end: node.range.1 });
            }
            SyntaxKind::Function { name, body_start } => {
                let doc = pending_doc.take();
                if inside_function {
                    stack.push(OpenScope::Nested { end: node.range.1 });
                    continue;
                }
                let comment = match (attachment, doc) {
                    (Attachment::Preceding, Some(range)) if is_adjacent(source, range.1, node.range.0) => {
                        Some(range)
                    }
                    _ => None,
                };
                stack.push(OpenScope::Function(PendingFunction {
                    name: name.clone(),
                    signature: node.signature.clone(),
                    range: node.range,
                    body_start: *body_start,
                    comment,
                }));
            }
        }
    }

    close_scopes(&mut stack, usize::MAX, source, &mut functions);
    functions.sort_by_key(|f| f.source_range.0);
    (functions, classes)
}

fn close_scopes(stack: &mut Vec<OpenScope>, position: usize, source: &str, out: &mut Vec<FunctionRecord>) {
    while stack.last().map_or(false, |s| s.end() <= position) {
        if let Some(OpenScope::Function(f)) = stack.pop() {
            out.push(f.flush(source));
        }
    }
}

/// 注释与声明之间只允许空白以及注解/属性行
fn is_adjacent(source: &str, comment_end: usize, decl_start: usize) -> bool {
    if comment_end > decl_start {
        return false;
    }
    source[comment_end..decl_start].lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('@') || line.starts_with('[') || line.starts_with('<')
    })
}

/// 函数体起点与文档字符串之间只有空白、冒号以及 `#` 行注释
fn is_first_statement(source: &str, body_start: usize, doc_start: usize) -> bool {
    if doc_start < body_start {
        return false;
    }
    let mut in_comment = false;
    source[body_start..doc_start].chars().all(|c| match c {
        '\n' => {
            in_comment = false;
            true
        }
        _ if in_comment => true,
        '#' => {
            in_comment = true;
            true
        }
        c => c.is_whitespace() || c == ':',
    })
}

/// 事件构造辅助
pub fn function_node(name: &str, signature: String, range: (usize, usize), body_start: usize) -> SyntaxNode {
    SyntaxNode {
        kind: SyntaxKind::Function {
            name: name.to_string(),
            body_start,
        },
        signature,
        range,
    }
}

pub fn class_node(name: &str, signature: String, range: (usize, usize)) -> SyntaxNode {
    SyntaxNode {
        kind: SyntaxKind::Class {
            name: name.to_string(),
        },
        signature,
        range,
    }
}

pub fn doc_node(range: (usize, usize)) -> SyntaxNode {
    SyntaxNode {
        kind: SyntaxKind::DocComment,
        signature: String::new(),
        range,
    }
}
