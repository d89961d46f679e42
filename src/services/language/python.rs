//! Python 适配
//!
//! 扫描分两步：先把源码切成逻辑行（处理括号续行、反斜杠续行与三引号字符串），
//! 再按缩进栈还原 `def` / `class` 的范围。文档字符串是函数体的第一条语句。

use once_cell::sync::Lazy;
use regex::Regex;

use super::java::labelled;
use super::scope::{class_node, doc_node, function_node};
use super::types::{collapse_whitespace, line_of, DocExtractionError, DocLine, ParseError, SourceTree, SyntaxNode};

pub const COMMENT_MARKER: &str = "\"\"\"";

pub const DOC_STYLE: &str = r#""""Brief description of what the function does.

Args:
    name (type): Description of the parameter.

Returns:
    type: Description of the returned value.

Raises:
    ExceptionType: When the exception is raised.
""""#;

const LANGUAGE: &str = "Python";

static RE_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:async\s+)?def\s+(\w+)").unwrap());
static RE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^class\s+(\w+)").unwrap());

/// 逻辑行
#[derive(Debug)]
struct LogicalLine {
    start: usize,
    /// 最后一个代码字符之后（不含行尾注释）
    end: usize,
    indent: usize,
    /// 括号外的第一个冒号
    colon: Option<usize>,
    /// 整行只有一个字符串字面量时的范围
    lone_string: Option<(usize, usize)>,
}

pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
    let lines = logical_lines(source)?;
    let nodes = build_nodes(source, &lines)?;
    Ok(SourceTree::new(source, nodes))
}

fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, ParseError> {
    let bytes = source.as_bytes();
    let mut lines = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let mut indent = 0;
        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\x0c' | b'\r') {
            indent = if bytes[i] == b'\t' { (indent / 8 + 1) * 8 } else { indent + 1 };
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'\n' {
            i += 1;
            continue;
        }
        if bytes[i] == b'#' {
            i = skip_to_newline(bytes, i);
            continue;
        }

        let start = i;
        let prefix = string_prefix_len(&bytes[start..]);
        let mut brackets: Vec<(u8, usize)> = Vec::new();
        let mut colon = None;
        let mut first_string = None;
        let mut last_code = start;

        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'\n' if brackets.is_empty() => break,
                b'\\' if matches!(bytes.get(i + 1), Some(b'\n') | Some(b'\r')) => {
                    i = skip_to_newline(bytes, i) + 1;
                    continue;
                }
                b'#' => {
                    i = skip_to_newline(bytes, i);
                    continue;
                }
                b'"' | b'\'' => {
                    let string_start = i;
                    i = skip_string(bytes, i)?;
                    if string_start == start + prefix && first_string.is_none() {
                        first_string = Some((start, i));
                    }
                    last_code = i;
                    continue;
                }
                b'(' | b'[' | b'{' => brackets.push((c, i)),
                b')' | b']' | b'}' => {
                    if brackets.pop().is_none() {
                        return Err(ParseError::Unbalanced {
                            language: LANGUAGE,
                            token: bracket_token(c),
                            offset: i,
                        });
                    }
                }
                b':' if brackets.is_empty() && colon.is_none() => colon = Some(i),
                _ => {}
            }
            if !c.is_ascii_whitespace() {
                last_code = i + 1;
            }
            i += 1;
        }

        if let Some(&(opener, offset)) = brackets.last() {
            return Err(ParseError::Unbalanced {
                language: LANGUAGE,
                token: bracket_token(opener),
                offset,
            });
        }

        lines.push(LogicalLine {
            start,
            end: last_code,
            indent,
            colon,
            lone_string: first_string.filter(|&(_, end)| end == last_code),
        });
    }
    Ok(lines)
}

fn skip_to_newline(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |rel| from + rel)
}

/// `r"` `b'` `rb"""` 之类的前缀长度，后面不是引号时为 0
fn string_prefix_len(rest: &[u8]) -> usize {
    let letters = rest
        .iter()
        .take(2)
        .take_while(|b| matches!(b, b'r' | b'R' | b'b' | b'B' | b'u' | b'U' | b'f' | b'F'))
        .count();
    match rest.get(letters) {
        Some(b'"') | Some(b'\'') => letters,
        _ => 0,
    }
}

fn bracket_token(c: u8) -> &'static str {
    match c {
        b'(' => "(",
        b'[' => "[",
        b'{' => "{",
        b')' => ")",
        b']' => "]",
        _ => "}",
    }
}

/// 返回字符串字面量之后的位置
fn skip_string(bytes: &[u8], start: usize) -> Result<usize, ParseError> {
    let quote = bytes[start];
    let triple = bytes.len() >= start + 3 && bytes[start + 1] == quote && bytes[start + 2] == quote;

    if triple {
        let mut j = start + 3;
        while j < bytes.len() {
            if bytes[j] == b'\\' {
                j += 2;
            } else if j + 2 < bytes.len() && bytes[j] == quote && bytes[j + 1] == quote && bytes[j + 2] == quote {
                return Ok(j + 3);
            } else {
                j += 1;
            }
        }
        return Err(ParseError::Unterminated {
            language: LANGUAGE,
            what: "triple-quoted string",
            offset: start,
        });
    }

    let mut j = start + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' => break,
            c if c == quote => return Ok(j + 1),
            _ => j += 1,
        }
    }
    Err(ParseError::Unterminated {
        language: LANGUAGE,
        what: "string literal",
        offset: start,
    })
}

/// 缩进栈中打开的 `def` / `class`
struct OpenBlock {
    is_function: bool,
    indent: usize,
    start: usize,
    last_end: usize,
    name: String,
    signature: String,
    body_start: usize,
    awaiting_body: bool,
}

impl OpenBlock {
    fn close(self) -> SyntaxNode {
        let range = (self.start, self.last_end);
        if self.is_function {
            function_node(&self.name, self.signature, range, self.body_start)
        } else {
            class_node(&self.name, self.signature, range)
        }
    }
}

fn build_nodes(source: &str, lines: &[LogicalLine]) -> Result<Vec<SyntaxNode>, ParseError> {
    let mut nodes = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut decorators: Option<usize> = None;

    for line in lines {
        while stack.last().map_or(false, |b| b.indent >= line.indent) {
            if let Some(block) = stack.pop() {
                nodes.push(block.close());
            }
        }

        if let Some(top) = stack.last_mut() {
            if top.awaiting_body {
                top.awaiting_body = false;
                if let (true, Some(range)) = (top.is_function, line.lone_string) {
                    nodes.push(doc_node(range));
                }
            }
        }
        for block in stack.iter_mut() {
            block.last_end = line.end;
        }

        let text = &source[line.start..line.end];
        if text.starts_with('@') {
            decorators.get_or_insert(line.start);
            continue;
        }
        let start = decorators.take().unwrap_or(line.start);

        let (is_function, caps) = match (RE_DEF.captures(text), RE_CLASS.captures(text)) {
            (Some(caps), _) => (true, caps),
            (None, Some(caps)) => (false, caps),
            (None, None) => continue,
        };

        let Some(colon) = line.colon else {
            return Err(ParseError::Structure {
                language: LANGUAGE,
                message: format!("missing `:` after `{}`", &caps[1]),
                line: line_of(source, line.start),
            });
        };

        stack.push(OpenBlock {
            is_function,
            indent: line.indent,
            start,
            last_end: line.end,
            name: caps[1].to_string(),
            signature: collapse_whitespace(&source[line.start..colon]),
            body_start: colon + 1,
            // `def f(): return 1` 单行定义没有独立的函数体
            awaiting_body: colon + 1 >= line.end,
        });
    }

    while let Some(block) = stack.pop() {
        nodes.push(block.close());
    }
    Ok(nodes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Arguments,
    Returns,
    Raises,
}

fn section_header(line: &str) -> Option<Section> {
    match line {
        "Args:" | "Arguments:" | "Parameters:" => Some(Section::Arguments),
        "Returns:" | "Return:" => Some(Section::Returns),
        "Raises:" => Some(Section::Raises),
        _ => None,
    }
}

/// 解析 Google 风格的文档字符串
pub fn extract_doc_block(raw: &str) -> Result<Vec<DocLine>, DocExtractionError> {
    let trimmed = raw.trim();
    let body = trimmed.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    let quote = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        return Ok(Vec::new());
    };
    if body.len() < 6 || !body.ends_with(quote) {
        return Err(DocExtractionError::new("unterminated docstring"));
    }
    let content = &body[3..body.len() - 3];

    let mut description: Vec<&str> = Vec::new();
    let mut description_done = false;
    let mut current: Option<Section> = None;
    let mut entry_indent: Option<usize> = None;
    let mut arguments: Vec<String> = Vec::new();
    let mut returns: Vec<String> = Vec::new();
    let mut raises: Vec<String> = Vec::new();

    for line in content.lines() {
        let text = line.trim();
        if text.is_empty() {
            if current.is_none() && !description.is_empty() {
                description_done = true;
            }
            continue;
        }
        if let Some(section) = section_header(text) {
            current = Some(section);
            entry_indent = None;
            continue;
        }

        let Some(section) = current else {
            if !description_done {
                description.push(text);
            }
            continue;
        };
        if text == "None" || text == "None." {
            continue;
        }

        let bullets = match section {
            Section::Arguments => &mut arguments,
            Section::Returns => &mut returns,
            Section::Raises => &mut raises,
        };
        let indent = line.len() - line.trim_start().len();
        let first = *entry_indent.get_or_insert(indent);

        match text.split_once(':') {
            Some((name, desc)) if indent <= first => {
                bullets.push(labelled(name.trim(), desc.trim()));
            }
            _ => match bullets.last_mut() {
                Some(previous) => {
                    previous.push('\n');
                    previous.push_str(text);
                }
                None => bullets.push(text.to_string()),
            },
        }
    }

    let mut lines = Vec::new();
    if !description.is_empty() {
        lines.push(DocLine::bold("Description:"));
        lines.push(DocLine::text(description.join("\n")));
    }
    for (label, bullets) in [("Arguments:", arguments), ("Returns:", returns), ("Raises:", raises)] {
        if !bullets.is_empty() {
            lines.push(DocLine::bold(label));
            lines.push(DocLine::BulletList(bullets));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::language::scope::{find_all_functions, Attachment};

    const SAMPLE: &str = r#"import os


@cache
def add(a,
        b) -> int:
    """Add two numbers.

    Args:
        a (int): first operand
        b (int): second operand
            that wraps

    Returns:
        int: the sum
    """
    def helper():
        return 1
    return a + b + helper()


class Greeter:
    greeting = "hi: there"

    async def greet(self, name):
        # not a docstring
        return f"{self.greeting} {name}"


def one_liner(): return 42
"#;

    #[test]
    fn test_functions_and_ranges() {
        let tree = parse(SAMPLE).unwrap();
        let (functions, classes) = find_all_functions(&tree, Attachment::FirstStatement);

        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "greet", "one_liner"]);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].signature, "class Greeter");

        let add = &functions[0];
        assert_eq!(add.signature, "def add(a, b) -> int");
        assert!(add.text(SAMPLE).starts_with("@cache\ndef add"));
        assert!(add.text(SAMPLE).ends_with("return a + b + helper()"));
        assert!(add.raw_comment.starts_with("\"\"\"Add two numbers."));

        assert_eq!(functions[1].signature, "async def greet(self, name)");
        assert_eq!(functions[1].raw_comment, "");
        assert_eq!(functions[2].text(SAMPLE), "def one_liner(): return 42");
    }

    #[test]
    fn test_docstring_after_header_comment() {
        let source = "def f(x):  # helper\n    # keeps x\n    \"\"\"Doc.\"\"\"\n    return x\n";
        let tree = parse(source).unwrap();
        let (functions, _) = find_all_functions(&tree, Attachment::FirstStatement);

        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].raw_comment, "\"\"\"Doc.\"\"\"");
    }

    #[test]
    fn test_docstring_grammar() {
        let tree = parse(SAMPLE).unwrap();
        let (functions, _) = find_all_functions(&tree, Attachment::FirstStatement);
        let lines = extract_doc_block(&functions[0].raw_comment).unwrap();

        assert_eq!(
            lines,
            vec![
                DocLine::bold("Description:"),
                DocLine::text("Add two numbers."),
                DocLine::bold("Arguments:"),
                DocLine::BulletList(vec![
                    "a (int). first operand".to_string(),
                    "b (int). second operand\nthat wraps".to_string(),
                ]),
                DocLine::bold("Returns:"),
                DocLine::BulletList(vec!["int. the sum".to_string()]),
            ]
        );
    }

    #[test]
    fn test_none_entries_and_plain_text() {
        let raw = "\"\"\"Do it.\n\nReturns:\n    None\n\nRaises:\n    ValueError: if bad\n\"\"\"";
        let lines = extract_doc_block(raw).unwrap();
        assert_eq!(
            lines,
            vec![
                DocLine::bold("Description:"),
                DocLine::text("Do it."),
                DocLine::bold("Raises:"),
                DocLine::BulletList(vec!["ValueError. if bad".to_string()]),
            ]
        );

        assert!(extract_doc_block("# comment").unwrap().is_empty());
        assert!(extract_doc_block("").unwrap().is_empty());
        assert!(extract_doc_block("\"\"\"never closed").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("def f():\n    s = \"\"\"open\n"),
            Err(ParseError::Unterminated { what: "triple-quoted string", .. })
        ));
        assert!(matches!(
            parse("def f(a, b:\n    pass\n"),
            Err(ParseError::Unbalanced { token: "(", .. })
        ));
        assert!(matches!(
            parse("def f()\n    pass\n"),
            Err(ParseError::Structure { line: 1, .. })
        ));
    }
}
