//! Java 适配：Javadoc 注释语法

use once_cell::sync::Lazy;
use regex::Regex;

use super::c_family::{self, JAVA};
use super::types::{DocExtractionError, DocLine, ParseError, SourceTree};

pub const COMMENT_MARKER: &str = "/**";

/// 提示词中展示给模型的注释格式
pub const DOC_STYLE: &str = r#"/**
 * Brief description of what the method does.
 *
 * @param name Description of the parameter.
 * @return Description of the returned value.
 * @throws ExceptionType When the exception is thrown.
 */"#;

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@(\w+)\s*(.*)$").unwrap());

pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
    c_family::parse(source, JAVA)
}

/// 当前续行归属
enum Section {
    Description,
    Param(usize),
    Return(usize),
    Throws(usize),
    Ignored,
}

/// 解析 `/** ... */` 注释为文档行
pub fn extract_doc_block(raw: &str) -> Result<Vec<DocLine>, DocExtractionError> {
    let Some(open) = raw.find("/**") else {
        return Ok(Vec::new());
    };
    let inner = &raw[open + 3..];
    let Some(close) = inner.rfind("*/") else {
        return Err(DocExtractionError::new("unterminated `/**` comment"));
    };

    let mut description: Vec<String> = Vec::new();
    let mut params: Vec<(String, String)> = Vec::new();
    let mut returns: Vec<String> = Vec::new();
    let mut throws: Vec<(String, String)> = Vec::new();
    let mut section = Section::Description;

    for line in inner[..close].lines() {
        let line = line.trim();
        let line = line.strip_prefix('*').unwrap_or(line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = RE_TAG.captures(line) {
            let rest = caps[2].trim();
            section = match &caps[1] {
                "param" => {
                    let (name, desc) = split_first_word(rest);
                    if name.is_empty() {
                        Section::Ignored
                    } else {
                        params.push((name.to_string(), desc.to_string()));
                        Section::Param(params.len() - 1)
                    }
                }
                "return" | "returns" => {
                    returns.push(rest.to_string());
                    Section::Return(returns.len() - 1)
                }
                "throws" | "exception" => {
                    let (ty, desc) = split_first_word(rest);
                    if ty.is_empty() {
                        Section::Ignored
                    } else {
                        throws.push((ty.to_string(), desc.to_string()));
                        Section::Throws(throws.len() - 1)
                    }
                }
                _ => Section::Ignored,
            };
            continue;
        }

        match section {
            Section::Description => description.push(line.to_string()),
            Section::Param(i) => append_word(&mut params[i].1, line),
            Section::Return(i) => append_word(&mut returns[i], line),
            Section::Throws(i) => append_word(&mut throws[i].1, line),
            Section::Ignored => {}
        }
    }

    let mut lines = Vec::new();
    if !description.is_empty() {
        lines.push(DocLine::bold("Description:"));
        lines.push(DocLine::text(description.join("\n")));
    }
    if !params.is_empty() {
        lines.push(DocLine::bold("Arguments:"));
        lines.extend(params.iter().map(|(name, desc)| DocLine::bullet(labelled(name, desc))));
    }
    let returns: Vec<_> = returns.into_iter().filter(|r| !r.is_empty()).collect();
    if !returns.is_empty() {
        lines.push(DocLine::bold("Return:"));
        lines.extend(returns.into_iter().map(DocLine::Bullet));
    }
    if !throws.is_empty() {
        lines.push(DocLine::bold("Exceptions:"));
        lines.extend(throws.iter().map(|(ty, desc)| DocLine::bullet(labelled(ty, desc))));
    }
    Ok(lines)
}

fn split_first_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (text, ""),
    }
}

fn append_word(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(line);
}

/// `name. description`
pub(super) fn labelled(name: &str, desc: &str) -> String {
    if desc.is_empty() {
        format!("{}.", name)
    } else {
        format!("{}. {}", name, desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_javadoc() {
        let raw = r#"/**
     * Adds two numbers.
     * Overflow wraps.
     *
     * @param a the first operand
     * @param b the second operand,
     *          which may span lines
     * @return the sum
     * @throws ArithmeticException on overflow
     * @since 1.2
     */"#;
        let lines = extract_doc_block(raw).unwrap();

        assert_eq!(
            lines,
            vec![
                DocLine::bold("Description:"),
                DocLine::text("Adds two numbers.\nOverflow wraps."),
                DocLine::bold("Arguments:"),
                DocLine::bullet("a. the first operand"),
                DocLine::bullet("b. the second operand, which may span lines"),
                DocLine::bold("Return:"),
                DocLine::bullet("the sum"),
                DocLine::bold("Exceptions:"),
                DocLine::bullet("ArithmeticException. on overflow"),
            ]
        );
    }

    #[test]
    fn test_plain_or_empty_comment_yields_nothing() {
        assert_eq!(extract_doc_block("").unwrap(), Vec::new());
        assert_eq!(extract_doc_block("// just a note").unwrap(), Vec::new());
        assert_eq!(extract_doc_block("/**\n *\n */").unwrap(), Vec::new());
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        assert!(extract_doc_block("/** dangling\n * @param x").is_err());
    }

    #[test]
    fn test_parse_finds_methods() {
        let tree = parse("class A {\n  /** Doc. */\n  int f(int x) { return x; }\n}\n").unwrap();
        assert_eq!(tree.nodes().len(), 3);
    }
}
