//! 源码拼接
//!
//! 文件 = 前导部分 + 各函数片段（替换或原样） + 尾部。
//! 替换代码按原函数所在行的缩进重新缩进。

use std::ops::Range;

/// 一个函数片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 被替换的字节范围
    pub span: Range<usize>,
    /// 新代码；`None` 时保留原文
    pub replacement: Option<String>,
}

/// 按片段重新拼接源码
///
/// 片段必须按位置排序且互不重叠。
pub fn splice(source: &str, segments: &[Segment]) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 2);
    let mut cursor = 0;

    for segment in segments {
        let span = segment.span.clone();
        if span.start < cursor || span.end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..span.start]);
        match &segment.replacement {
            Some(code) => out.push_str(&reindent(code, line_indent(source, span.start))),
            None => out.push_str(&source[span.clone()]),
        }
        cursor = span.end;
    }

    out.push_str(&source[cursor..]);
    out
}

/// `offset` 所在行在 `offset` 之前的空白
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..offset];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

/// 取出一段源码并去掉公共缩进（用于构造单函数 Prompt）
pub fn dedented(source: &str, span: Range<usize>) -> String {
    let text = format!("{}{}", line_indent(source, span.start), &source[span]);
    reindent(&text, "")
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// 去掉公共缩进，除首行外加上 `indent`
///
/// 首行的缩进已经在前导文本中。
pub fn reindent(code: &str, indent: &str) -> String {
    let code = code.trim_matches(['\n', '\r']);
    let common = code
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(leading_whitespace)
        .min()
        .unwrap_or(0);

    code.lines()
        .enumerate()
        .map(|(i, line)| {
            let line = line.trim_end();
            if line.is_empty() {
                return String::new();
            }
            let stripped = &line[common.min(leading_whitespace(line))..];
            if i == 0 {
                stripped.to_string()
            } else {
                format!("{}{}", indent, stripped)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::language::{Language, LanguageAdapter};

    const SOURCE: &str = "import os\n\nclass A:\n    def one(self):\n        return 1\n\n    def two(self):\n        return 2\n\nprint('done')\n";

    fn spans(source: &str) -> Vec<Range<usize>> {
        let tree = Language::Python.parse(source).unwrap();
        let (functions, _) = Language::Python.find_all_functions(&tree);
        functions.iter().map(|f| f.span()).collect()
    }

    #[test]
    fn test_untouched_segments_reconstruct_source() {
        let segments: Vec<_> = spans(SOURCE)
            .into_iter()
            .map(|span| Segment { span, replacement: None })
            .collect();
        assert_eq!(splice(SOURCE, &segments), SOURCE);
    }

    #[test]
    fn test_replacement_is_reindented() {
        let mut segments: Vec<_> = spans(SOURCE)
            .into_iter()
            .map(|span| Segment { span, replacement: None })
            .collect();
        segments[1].replacement =
            Some("def two(self):\n    \"\"\"Return two.\"\"\"\n    return 2\n".to_string());

        let result = splice(SOURCE, &segments);
        assert_eq!(
            result,
            "import os\n\nclass A:\n    def one(self):\n        return 1\n\n    def two(self):\n        \"\"\"Return two.\"\"\"\n        return 2\n\nprint('done')\n"
        );
        // 函数数量不变，未替换的函数原样保留
        assert_eq!(spans(&result).len(), 2);
        assert!(result.contains("    def one(self):\n        return 1\n"));
    }

    #[test]
    fn test_dedented_method() {
        let span = spans(SOURCE)[0].clone();
        assert_eq!(dedented(SOURCE, span), "def one(self):\n    return 1");
    }

    #[test]
    fn test_reindent_strips_common_indent() {
        let code = "\n    /** Doc. */\n    void f() {\n\n        run();\n    }\n";
        assert_eq!(reindent(code, "  "), "/** Doc. */\n  void f() {\n\n      run();\n  }");
    }
}
