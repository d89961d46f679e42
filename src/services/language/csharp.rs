//! C# 适配：XML 文档注释语法

use once_cell::sync::Lazy;
use regex::Regex;

use super::c_family::{self, CSHARP};
use super::java::labelled;
use super::types::{collapse_whitespace, DocExtractionError, DocLine, ParseError, SourceTree};

pub const COMMENT_MARKER: &str = "///";

pub const DOC_STYLE: &str = r#"/// <summary>
/// Brief description of what the method does.
/// </summary>
/// <param name="name">Description of the parameter.</param>
/// <returns>Description of the returned value.</returns>
/// <exception cref="ExceptionType">When the exception is thrown.</exception>"#;

static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap());
static RE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<param\s+name\s*=\s*"([^"]*)"\s*>(.*?)</param>"#).unwrap());
static RE_RETURNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<returns>(.*?)</returns>").unwrap());
static RE_EXCEPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<exception\s+cref\s*=\s*"([^"]*)"\s*>(.*?)</exception>"#).unwrap());

pub fn parse(source: &str) -> Result<SourceTree, ParseError> {
    c_family::parse(source, CSHARP)
}

/// 解析连续 `///` 行为文档行
pub fn extract_doc_block(raw: &str) -> Result<Vec<DocLine>, DocExtractionError> {
    if !raw.contains(COMMENT_MARKER) {
        return Ok(Vec::new());
    }

    let text = raw
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(COMMENT_MARKER).unwrap_or(line).trim()
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.contains("<summary>") && !text.contains("</summary>") {
        return Err(DocExtractionError::new("unterminated <summary> element"));
    }

    let mut lines = Vec::new();
    let mut remainder = text.as_str();
    let stripped;

    if let Some(caps) = RE_SUMMARY.captures(&text) {
        let description = caps[1]
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !description.is_empty() {
            lines.push(DocLine::bold("Description:"));
            lines.push(DocLine::text(description));
        }
        stripped = RE_SUMMARY.replace(&text, "").into_owned();
        remainder = &stripped;
    }

    let params: Vec<String> = RE_PARAM
        .captures_iter(remainder)
        .map(|c| labelled(c[1].trim(), &collapse_whitespace(&c[2])))
        .collect();
    if !params.is_empty() {
        lines.push(DocLine::bold("Arguments:"));
        lines.extend(params.into_iter().map(DocLine::Bullet));
    }

    let returns: Vec<String> = RE_RETURNS
        .captures_iter(remainder)
        .map(|c| collapse_whitespace(&c[1]))
        .filter(|r| !r.is_empty())
        .collect();
    if !returns.is_empty() {
        lines.push(DocLine::bold("Return:"));
        lines.extend(returns.into_iter().map(DocLine::Bullet));
    }

    let exceptions: Vec<String> = RE_EXCEPTION
        .captures_iter(remainder)
        .map(|c| labelled(c[1].trim(), &collapse_whitespace(&c[2])))
        .collect();
    if !exceptions.is_empty() {
        lines.push(DocLine::bold("Exceptions:"));
        lines.extend(exceptions.into_iter().map(DocLine::Bullet));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_doc_comment() {
        let raw = r#"/// <summary>
    /// Divides two numbers.
    /// </summary>
    /// <param name="a">The dividend.</param>
    /// <param name="b">The divisor,
    /// never zero.</param>
    /// <returns>The quotient.</returns>
    /// <exception cref="DivideByZeroException">When b is zero.</exception>"#;
        let lines = extract_doc_block(raw).unwrap();

        assert_eq!(
            lines,
            vec![
                DocLine::bold("Description:"),
                DocLine::text("Divides two numbers."),
                DocLine::bold("Arguments:"),
                DocLine::bullet("a. The dividend."),
                DocLine::bullet("b. The divisor, never zero."),
                DocLine::bold("Return:"),
                DocLine::bullet("The quotient."),
                DocLine::bold("Exceptions:"),
                DocLine::bullet("DivideByZeroException. When b is zero."),
            ]
        );
    }

    #[test]
    fn test_marker_less_comment_yields_nothing() {
        assert!(extract_doc_block("// regular comment").unwrap().is_empty());
        assert!(extract_doc_block("   ").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_summary() {
        assert!(extract_doc_block("/// <summary>\n/// never closed").is_err());
    }
}
