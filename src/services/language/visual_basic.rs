//! Visual Basic 适配
//!
//! 按行扫描：`Function`/`Sub` 与对应的 `End` 成对出现，
//! 文档注释是由横幅行（`'====...`）包围的注释块。

use once_cell::sync::Lazy;
use regex::Regex;

use super::scope::{class_node, doc_node, function_node};
use super::types::{collapse_whitespace, DocExtractionError, DocLine, ParseError, SourceTree, SyntaxNode};

pub const COMMENT_MARKER: &str = "'===============================================";

pub const DOC_STYLE: &str = r#"'===============================================
' Description: Brief description of what the procedure does.
' Parameters:
'   name - Description of the parameter (Type)
' Returns: Type - Description of the returned value.
' Error Handling:
'   How errors are handled, or None.
'==============================================="#;

const LANGUAGE: &str = "Visual Basic";

const MODIFIERS: &str = r"(?:(?:Public|Private|Protected|Friend|Shared|Overrides|Overridable|Overloads|Async|Static|Shadows|NotOverridable|Partial|Iterator|MustOverride|MustInherit|NotInheritable)\s+)*";

static RE_PROCEDURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:<[^>]*>\s*)*({MODIFIERS})(Function|Sub)\s+(\w+)")).unwrap()
});
static RE_END_PROCEDURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*End\s+(Function|Sub)\b").unwrap());
static RE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:<[^>]*>\s*)*({MODIFIERS})(Class|Module|Structure|Interface)\s+(\w+)")).unwrap()
});
static RE_END_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*End\s+(Class|Module|Structure|Interface)\b").unwrap());
static RE_LAMBDA_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(Function|Sub)\s*\(").unwrap());
static RE_LAMBDA_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:As\s+[\w.]+(?:\s*\(\s*Of\s+[^)]*\))?)?\s*$").unwrap());
static RE_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:<[^>]*>\s*)+").unwrap());

static RE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)\s*-\s*(.*?)\s*\((\w+)\)\s*$").unwrap());
static RE_RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Returns:\s*(\w+)\s*-\s*(.*)$").unwrap());

/// 带偏移的物理行
struct Line<'a> {
    /// 第一个非空白字符的位置
    start: usize,
    /// 去掉行尾空白后的结束位置
    end: usize,
    text: &'a str,
}

fn physical_lines(source: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    source
        .split_inclusive('\n')
        .map(|raw| {
            let text = raw.trim_end();
            let line = Line {
                start: offset + (text.len() - text.trim_start().len()),
                end: offset + text.len(),
                text,
            };
            offset += raw.len();
            line
        })
        .collect()
}

/// 横幅行：`'` 后跟至少 10 个 `=`
pub fn is_banner(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix('\'') else {
        return false;
    };
    let rest = rest.trim();
    rest.len() >= 10 && rest.chars().all(|c| c == '=')
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('\'')
        || trimmed
            .split_whitespace()
            .next()
            .map_or(false, |word| word.eq_ignore_ascii_case("rem"))
}

/// 去掉行尾 `'` 注释（字符串内的 `'` 不算）
fn code_part(text: &str) -> &str {
    let mut in_string = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '\'' if !in_string => return &text[..i],
            _ => {}
        }
    }
    text
}

/// 多行 lambda 的起始行：`Function(...)` / `Sub(...)` 之后没有语句体
///
/// 单行 lambda（`Function(x) x * 2`）不计入。
fn opens_lambda(text: &str) -> Option<String> {
    let code = code_part(text);
    for caps in RE_LAMBDA_HEAD.captures_iter(code) {
        let open = caps.get(0)?.end() - 1;
        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in code[open..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else { continue };
        if RE_LAMBDA_TAIL.is_match(&code[close + 1..]) {
            return Some(caps[1].to_string());
        }
    }
    None
}

struct OpenProcedure {
    line: usize,
    kind: String,
    name: String,
    start: usize,
    header: String,
    body_start: usize,
}

struct OpenType {
    line: usize,
    name: String,
    signature: String,
    start: usize,
    is_interface: bool,
}

fn structure_error(message: String, index: usize) -> ParseError {
    ParseError::Structure {
        language: LANGUAGE,
        message,
        line: index + 1,
    }
}

pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
    let lines = physical_lines(source);
    let mut nodes: Vec<SyntaxNode> = Vec::new();
    let mut types: Vec<OpenType> = Vec::new();
    let mut procedure: Option<OpenProcedure> = None;
    // 当前过程内尚未闭合的多行 lambda
    let mut lambdas: Vec<String> = Vec::new();
    let mut banner_start: Option<usize> = None;
    let mut index = 0;

    while index < lines.len() {
        let line = &lines[index];

        if is_banner(line.text) {
            match banner_start.take() {
                Some(start) => nodes.push(doc_node((start, line.end))),
                None => banner_start = Some(line.start),
            }
            index += 1;
            continue;
        }
        if is_comment(line.text) || line.text.trim().is_empty() {
            index += 1;
            continue;
        }
        // 横幅块中出现代码，说明不是文档注释
        banner_start = None;

        if let Some(caps) = RE_END_PROCEDURE.captures(line.text) {
            if lambdas.last().map_or(false, |kind| kind.eq_ignore_ascii_case(&caps[1])) {
                lambdas.pop();
                index += 1;
                continue;
            }
            let Some(open) = procedure.take() else {
                return Err(structure_error(format!("stray `End {}`", &caps[1]), index));
            };
            if !open.kind.eq_ignore_ascii_case(&caps[1]) {
                return Err(structure_error(
                    format!("`End {}` closes `{} {}`", &caps[1], open.kind, open.name),
                    index,
                ));
            }
            nodes.push(function_node(&open.name, open.header, (open.start, line.end), open.body_start));
            index += 1;
            continue;
        }

        if procedure.is_some() && !RE_PROCEDURE.is_match(line.text) {
            if let Some(kind) = opens_lambda(line.text) {
                lambdas.push(kind);
            }
            index += 1;
            continue;
        }

        if let Some(caps) = RE_PROCEDURE.captures(line.text) {
            let abstract_member = caps[1].to_ascii_lowercase().contains("mustoverride");
            let in_interface = types.last().map_or(false, |t| t.is_interface);

            // 续行：以 ` _` 结尾
            let mut last = index;
            while lines[last].text.ends_with(" _") && last + 1 < lines.len() {
                last += 1;
            }

            if !abstract_member && !in_interface {
                if let Some(open) = &procedure {
                    return Err(structure_error(
                        format!("`{}` declared inside `{} {}`", &caps[3], open.kind, open.name),
                        index,
                    ));
                }
                let header_text = lines[index..=last]
                    .iter()
                    .map(|l| l.text.trim_end_matches('_'))
                    .collect::<Vec<_>>()
                    .join(" ");
                procedure = Some(OpenProcedure {
                    line: index,
                    kind: caps[2].to_string(),
                    name: caps[3].to_string(),
                    start: line.start,
                    header: collapse_whitespace(&RE_ATTRIBUTES.replace(&header_text, "")),
                    body_start: lines[last].end,
                });
            }
            index = last + 1;
            continue;
        }

        if procedure.is_none() {
            if let Some(caps) = RE_TYPE.captures(line.text) {
                types.push(OpenType {
                    line: index,
                    name: caps[3].to_string(),
                    signature: collapse_whitespace(&RE_ATTRIBUTES.replace(line.text, "")),
                    start: line.start,
                    is_interface: caps[2].eq_ignore_ascii_case("interface"),
                });
            } else if let Some(caps) = RE_END_TYPE.captures(line.text) {
                let Some(open) = types.pop() else {
                    return Err(structure_error(format!("stray `End {}`", &caps[1]), index));
                };
                nodes.push(class_node(&open.name, open.signature, (open.start, line.end)));
            }
        }
        index += 1;
    }

    if let Some(open) = procedure {
        return Err(structure_error(
            format!("`{} {}` has no `End {}`", open.kind, open.name, open.kind),
            open.line,
        ));
    }
    if let Some(open) = types.last() {
        return Err(structure_error(format!("`{}` is never closed", open.name), open.line));
    }

    Ok(SourceTree::new(source, nodes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Start,
    Description,
    Parameters,
    ErrorHandling,
}

/// 以句号结尾
fn sentence(text: &str) -> String {
    let text = text.trim().trim_end_matches('.');
    format!("{}.", text)
}

/// 解析横幅包围的注释块
pub fn extract_doc_block(raw: &str) -> Result<Vec<DocLine>, DocExtractionError> {
    let banners = raw.lines().filter(|l| is_banner(l)).count();
    if banners == 0 {
        return Ok(Vec::new());
    }
    if banners < 2 {
        return Err(DocExtractionError::new("documentation banner is never closed"));
    }

    let mut mode = Mode::Start;
    let mut description: Vec<String> = Vec::new();
    let mut parameters: Vec<String> = Vec::new();
    let mut returns: Option<String> = None;
    let mut errors: Vec<String> = Vec::new();

    for line in raw.lines() {
        if is_banner(line) {
            continue;
        }
        let text = line.trim().trim_start_matches('\'').trim();
        if text.is_empty() {
            continue;
        }

        if let Some(rest) = text.strip_prefix("Description:") {
            mode = Mode::Description;
            if !rest.trim().is_empty() {
                description.push(rest.trim().to_string());
            }
        } else if text.starts_with("Parameters:") {
            mode = Mode::Parameters;
        } else if text.starts_with("Returns:") {
            mode = Mode::Start;
            if let Some(caps) = RE_RETURN.captures(text) {
                returns = Some(format!("({}). {}", &caps[1], sentence(&caps[2])));
            }
        } else if let Some(rest) = text.strip_prefix("Error Handling:") {
            mode = Mode::ErrorHandling;
            if !rest.trim().is_empty() && rest.trim() != "None" {
                errors.push(rest.trim().to_string());
            }
        } else {
            match mode {
                Mode::Description => description.push(text.to_string()),
                Mode::Parameters => {
                    if let Some(caps) = RE_PARAM.captures(text) {
                        parameters.push(format!("{} ({}). {}", &caps[1], &caps[3], sentence(&caps[2])));
                    }
                }
                Mode::ErrorHandling => {
                    if text != "None" && text != "None." {
                        errors.push(text.to_string());
                    }
                }
                Mode::Start => {}
            }
        }
    }

    let mut lines = Vec::new();
    if !description.is_empty() {
        lines.push(DocLine::bold("Description:"));
        lines.push(DocLine::text(description.join("\n")));
    }
    if !parameters.is_empty() {
        lines.push(DocLine::bold("Arguments:"));
        lines.push(DocLine::BulletList(parameters));
    }
    if let Some(returns) = returns {
        lines.push(DocLine::bold("Return:"));
        lines.push(DocLine::Text(returns));
    }
    if !errors.is_empty() {
        lines.push(DocLine::bold("Error Handling:"));
        lines.extend(errors.into_iter().map(DocLine::Text));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::language::scope::{find_all_functions, Attachment};

    const SAMPLE: &str = r#"Public Class Calculator

    '===============================================
    ' Description: Adds two integers.
    ' Parameters:
    '   a - The first operand (Integer)
    '   b - The second operand. (Integer)
    ' Returns: Integer - The sum
    ' Error Handling:
    '   Throws OverflowException on overflow
    '===============================================
    <Obsolete("use AddChecked")>
    Public Function Add(a As Integer, _
                        b As Integer) As Integer
        Return a + b
    End Function

    ' plain comment
    Private Sub Reset()
        total = 0
    End Sub

End Class
"#;

    #[test]
    fn test_procedures_and_banner() {
        let tree = parse(SAMPLE).unwrap();
        let (functions, classes) = find_all_functions(&tree, Attachment::Preceding);

        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].signature, "Public Class Calculator");
        assert_eq!(functions.len(), 2);

        let add = &functions[0];
        assert_eq!(add.signature, "Public Function Add(a As Integer, b As Integer) As Integer");
        assert!(add.text(SAMPLE).ends_with("End Function"));
        assert!(add.raw_comment.contains("Description: Adds two integers."));
        assert!(add.span().start < add.source_range.0);

        assert_eq!(functions[1].signature, "Private Sub Reset()");
        assert!(!functions[1].has_comment());
    }

    #[test]
    fn test_banner_grammar() {
        let tree = parse(SAMPLE).unwrap();
        let (functions, _) = find_all_functions(&tree, Attachment::Preceding);
        let lines = extract_doc_block(&functions[0].raw_comment).unwrap();

        assert_eq!(
            lines,
            vec![
                DocLine::bold("Description:"),
                DocLine::text("Adds two integers."),
                DocLine::bold("Arguments:"),
                DocLine::BulletList(vec![
                    "a (Integer). The first operand.".to_string(),
                    "b (Integer). The second operand.".to_string(),
                ]),
                DocLine::bold("Return:"),
                DocLine::text("(Integer). The sum."),
                DocLine::bold("Error Handling:"),
                DocLine::text("Throws OverflowException on overflow"),
            ]
        );
    }

    #[test]
    fn test_grammar_edge_cases() {
        assert!(extract_doc_block("' just a comment").unwrap().is_empty());
        assert!(extract_doc_block("").unwrap().is_empty());
        assert!(extract_doc_block("'===============\n' Description: open").is_err());
    }

    #[test]
    fn test_structure_errors() {
        assert!(matches!(
            parse("Public Sub A()\n    x = 1\n"),
            Err(ParseError::Structure { line: 1, .. })
        ));
        assert!(matches!(
            parse("Module M\nEnd Sub\nEnd Module\n"),
            Err(ParseError::Structure { line: 2, .. })
        ));
        assert!(matches!(
            parse("Public Sub A()\nPublic Function B() As Integer\nEnd Function\nEnd Sub\n"),
            Err(ParseError::Structure { line: 2, .. })
        ));
    }

    #[test]
    fn test_multiline_lambdas_stay_inside_procedure() {
        let source = r#"Public Module M
    Public Sub Run()
        Dim f = Function(x As Integer)
                    Return x + 1
                End Function
        AddHandler button.Click, Sub(s, e) ' click
                                     Console.WriteLine(f(1))
                                 End Sub
        Dim g = Function(x) Twice(x)
    End Sub
End Module
"#;
        let tree = parse(source).unwrap();
        let (functions, classes) = find_all_functions(&tree, Attachment::Preceding);

        assert_eq!(classes.len(), 1);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "Run");
        let text = functions[0].text(source);
        assert!(text.contains("End Function"));
        assert!(text.trim_end().ends_with("    End Sub"));
    }

    #[test]
    fn test_lambda_openers() {
        assert_eq!(opens_lambda("Dim f = Function(x As Integer)").as_deref(), Some("Function"));
        assert_eq!(opens_lambda("Dim f = Async Function(x) As Task(Of Integer)").as_deref(), Some("Function"));
        assert_eq!(opens_lambda("items.ForEach(Sub(item)").as_deref(), Some("Sub"));
        assert_eq!(opens_lambda("Dim g = Function(x) x * 2"), None);
        assert_eq!(opens_lambda("Call(Sub() Console.WriteLine(1))"), None);
        assert_eq!(opens_lambda("Dim s = \"Sub(\" ' Function(x)"), None);
    }

    #[test]
    fn test_interface_members_have_no_body() {
        let source = "Public Interface IShape\n    Function Area() As Double\nEnd Interface\n";
        let tree = parse(source).unwrap();
        let (functions, classes) = find_all_functions(&tree, Attachment::Preceding);
        assert!(functions.is_empty());
        assert_eq!(classes[0].name, "IShape");
    }
}
