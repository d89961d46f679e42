//! 语言适配层
//!
//! 每种语言提供结构提取（函数/类/文档注释）与注释语法解析。
//! 有注释语法的语言是封闭枚举 [`Language`]，其余语言只支持整文件生成。

mod c_family;
mod csharp;
mod java;
mod python;
mod scope;
pub mod types;
mod visual_basic;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

pub use scope::Attachment;
pub use types::{
    ClassRecord, DocExtractionError, DocLine, FunctionDocs, FunctionRecord, ParseError, SourceTree,
};

/// 函数没有可用文档
pub const NO_DOCUMENTATION: &str = "could not extract documentation";
/// 注释语法解析失败
pub const EXTRACTION_FAILED: &str = "could not extract the documentation from the function";

/// 语言适配器
pub trait LanguageAdapter {
    fn name(&self) -> &'static str;

    fn extensions(&self) -> &'static [&'static str];

    /// 文档注释的起始标记
    fn comment_marker(&self) -> &'static str;

    /// 展示给模型的注释格式示例
    fn doc_style(&self) -> &'static str;

    /// 代码中是否出现文档注释标记
    fn has_comment_marker(&self, code: &str) -> bool {
        code.contains(self.comment_marker())
    }

    /// 解析源码；字符串/注释未闭合、括号不平衡等视为整个文件失败
    fn parse(&self, source: &str) -> Result<SourceTree, ParseError>;

    /// 按源码顺序列出所有函数与类
    fn find_all_functions(&self, tree: &SourceTree) -> (Vec<FunctionRecord>, Vec<ClassRecord>);

    /// 注释语法解析
    fn extract_doc_block(&self, raw_comment: &str) -> Result<Vec<DocLine>, DocExtractionError>;

    /// 单个函数的文档：`Subheader("Function: <签名>")` 加上注释语法产出的行
    fn document_function(&self, function: &FunctionRecord) -> FunctionDocs {
        let failed = |message: &str| FunctionDocs {
            lines: Vec::new(),
            error: Some((function.signature.clone(), message.to_string())),
        };

        if !function.has_comment() {
            return failed(NO_DOCUMENTATION);
        }
        match self.extract_doc_block(&function.raw_comment) {
            Err(e) => {
                debug!("{} `{}`: {}", self.name(), function.signature, e);
                failed(EXTRACTION_FAILED)
            }
            Ok(lines) if lines.is_empty() => failed(NO_DOCUMENTATION),
            Ok(lines) => {
                let mut out = Vec::with_capacity(lines.len() + 1);
                out.push(DocLine::Subheader(format!("Function: {}", function.signature)));
                out.extend(lines);
                FunctionDocs { lines: out, error: None }
            }
        }
    }

    /// 收集整个文件的函数文档
    fn harvest(&self, source: &str) -> Result<Harvest, ParseError> {
        let tree = self.parse(source)?;
        let (functions, _) = self.find_all_functions(&tree);
        let mut harvest = Harvest {
            total: functions.len(),
            ..Harvest::default()
        };

        for function in &functions {
            let docs = self.document_function(function);
            match docs.error {
                Some((signature, message)) => {
                    harvest.errors.insert(signature, message);
                }
                None => {
                    harvest.documented += 1;
                    harvest.lines.extend(docs.lines);
                }
            }
        }
        Ok(harvest)
    }
}

/// 整个文件的文档收集结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub lines: Vec<DocLine>,
    /// 签名 -> 错误信息
    pub errors: BTreeMap<String, String>,
    pub total: usize,
    pub documented: usize,
}

/// 支持注释语法的语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Java,
    CSharp,
    VisualBasic,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Python, Language::Java, Language::CSharp, Language::VisualBasic];

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL.into_iter().find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    pub fn attachment(&self) -> Attachment {
        match self {
            Language::Python => Attachment::FirstStatement,
            _ => Attachment::Preceding,
        }
    }
}

impl LanguageAdapter for Language {
    fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Java => "Java",
            Language::CSharp => "C#",
            Language::VisualBasic => "Visual Basic",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::VisualBasic => &["vb"],
        }
    }

    fn comment_marker(&self) -> &'static str {
        match self {
            Language::Python => python::COMMENT_MARKER,
            Language::Java => java::COMMENT_MARKER,
            Language::CSharp => csharp::COMMENT_MARKER,
            Language::VisualBasic => visual_basic::COMMENT_MARKER,
        }
    }

    fn doc_style(&self) -> &'static str {
        match self {
            Language::Python => python::DOC_STYLE,
            Language::Java => java::DOC_STYLE,
            Language::CSharp => csharp::DOC_STYLE,
            Language::VisualBasic => visual_basic::DOC_STYLE,
        }
    }

    fn has_comment_marker(&self, code: &str) -> bool {
        match self {
            // 横幅长度不固定
            Language::VisualBasic => code.lines().any(visual_basic::is_banner),
            _ => code.contains(self.comment_marker()),
        }
    }

    fn parse(&self, source: &str) -> Result<SourceTree, ParseError> {
        match self {
            Language::Python => python::parse(source),
            Language::Java => java::parse(source),
            Language::CSharp => csharp::parse(source),
            Language::VisualBasic => visual_basic::parse(source),
        }
    }

    fn find_all_functions(&self, tree: &SourceTree) -> (Vec<FunctionRecord>, Vec<ClassRecord>) {
        scope::find_all_functions(tree, self.attachment())
    }

    fn extract_doc_block(&self, raw_comment: &str) -> Result<Vec<DocLine>, DocExtractionError> {
        if raw_comment.trim().is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Language::Python => python::extract_doc_block(raw_comment),
            Language::Java => java::extract_doc_block(raw_comment),
            Language::CSharp => csharp::extract_doc_block(raw_comment),
            Language::VisualBasic => visual_basic::extract_doc_block(raw_comment),
        }
    }
}

/// 只支持整文件生成的语言
#[derive(Debug, PartialEq, Eq)]
pub struct PlainLanguage {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub comment_marker: &'static str,
    pub doc_style: &'static str,
}

const JSDOC_STYLE: &str = r#"/**
 * Brief description of what the function does.
 *
 * @param {Type} name - Description of the parameter.
 * @returns {Type} Description of the returned value.
 * @throws {ErrorName} When the error is thrown.
 */"#;

const DOXYGEN_STYLE: &str = r#"/**
 * @brief Brief description of what the function does.
 * @param name Description of the parameter.
 * @return Description of the returned value.
 */"#;

pub const PLAIN_LANGUAGES: &[PlainLanguage] = &[
    PlainLanguage {
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs"],
        comment_marker: "/**",
        doc_style: JSDOC_STYLE,
    },
    PlainLanguage {
        name: "TypeScript",
        extensions: &["ts", "tsx"],
        comment_marker: "/**",
        doc_style: JSDOC_STYLE,
    },
    PlainLanguage {
        name: "C",
        extensions: &["c", "h"],
        comment_marker: "/**",
        doc_style: DOXYGEN_STYLE,
    },
    PlainLanguage {
        name: "C++",
        extensions: &["cpp", "cc", "cxx", "hpp"],
        comment_marker: "/**",
        doc_style: DOXYGEN_STYLE,
    },
    PlainLanguage {
        name: "PHP",
        extensions: &["php"],
        comment_marker: "/**",
        doc_style: r#"/**
 * Brief description of what the function does.
 *
 * @param Type $name Description of the parameter.
 * @return Type Description of the returned value.
 * @throws ExceptionType When the exception is thrown.
 */"#,
    },
    PlainLanguage {
        name: "Go",
        extensions: &["go"],
        comment_marker: "//",
        doc_style: "// Name does something; the comment starts with the function name.\n// Parameters and results are described in full sentences.",
    },
    PlainLanguage {
        name: "Ruby",
        extensions: &["rb"],
        comment_marker: "#",
        doc_style: "# Brief description of what the method does.\n#\n# @param name [Type] Description of the parameter.\n# @return [Type] Description of the returned value.",
    },
    PlainLanguage {
        name: "Swift",
        extensions: &["swift"],
        comment_marker: "///",
        doc_style: "/// Brief description of what the function does.\n///\n/// - Parameter name: Description of the parameter.\n/// - Returns: Description of the returned value.\n/// - Throws: When an error is thrown.",
    },
    PlainLanguage {
        name: "Lua",
        extensions: &["lua"],
        comment_marker: "---",
        doc_style: "--- Brief description of what the function does.\n-- @param name Description of the parameter.\n-- @return Description of the returned value.",
    },
    PlainLanguage {
        name: "Shell",
        extensions: &["sh"],
        comment_marker: "#",
        doc_style: "# Brief description of what the function does.\n# Arguments:\n#   $1 - Description of the argument.\n# Outputs:\n#   Description of what is printed.",
    },
];

/// 源文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 有注释语法，可逐函数生成
    Grammar(Language),
    /// 只能整文件生成
    Plain(&'static PlainLanguage),
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if let Some(lang) = Language::from_extension(&ext) {
            return Some(SourceKind::Grammar(lang));
        }
        PLAIN_LANGUAGES
            .iter()
            .find(|plain| plain.extensions.contains(&ext.as_str()))
            .map(SourceKind::Plain)
    }

    /// 路径是否为支持的源文件
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_some()
    }

    pub fn grammar(&self) -> Option<Language> {
        match self {
            SourceKind::Grammar(lang) => Some(*lang),
            SourceKind::Plain(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Grammar(lang) => lang.name(),
            SourceKind::Plain(plain) => plain.name,
        }
    }

    pub fn comment_marker(&self) -> &'static str {
        match self {
            SourceKind::Grammar(lang) => lang.comment_marker(),
            SourceKind::Plain(plain) => plain.comment_marker,
        }
    }

    pub fn doc_style(&self) -> &'static str {
        match self {
            SourceKind::Grammar(lang) => lang.doc_style(),
            SourceKind::Plain(plain) => plain.doc_style,
        }
    }

    pub fn has_comment_marker(&self, code: &str) -> bool {
        match self {
            SourceKind::Grammar(lang) => lang.has_comment_marker(code),
            SourceKind::Plain(plain) => code.contains(plain.comment_marker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(raw_comment: &str) -> FunctionRecord {
        FunctionRecord {
            name: "add".to_string(),
            signature: "public int add(int a, int b)".to_string(),
            body: "{ return a + b; }".to_string(),
            source_range: (0, 10),
            raw_comment: raw_comment.to_string(),
            comment_range: if raw_comment.is_empty() { None } else { Some((0, 0)) },
        }
    }

    #[test]
    fn test_source_kind_from_path() {
        assert_eq!(
            SourceKind::from_path(Path::new("src/App.JAVA")),
            Some(SourceKind::Grammar(Language::Java))
        );
        assert_eq!(SourceKind::from_path(Path::new("a/b.vb")).and_then(|k| k.grammar()), Some(Language::VisualBasic));
        assert_eq!(SourceKind::from_path(Path::new("web/app.ts")).map(|k| k.name()), Some("TypeScript"));
        assert!(SourceKind::from_path(Path::new("README.md")).is_none());
        assert!(SourceKind::from_path(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_document_function_outcomes() {
        let lang = Language::Java;

        let missing = lang.document_function(&record(""));
        assert_eq!(
            missing.error,
            Some(("public int add(int a, int b)".to_string(), NO_DOCUMENTATION.to_string()))
        );

        let broken = lang.document_function(&record("/** never closed"));
        assert_eq!(broken.error.map(|(_, m)| m), Some(EXTRACTION_FAILED.to_string()));

        let empty = lang.document_function(&record("/**\n */"));
        assert_eq!(empty.error.map(|(_, m)| m), Some(NO_DOCUMENTATION.to_string()));

        let ok = lang.document_function(&record("/** Adds. */"));
        assert!(ok.is_documented());
        assert_eq!(
            ok.lines,
            vec![
                DocLine::Subheader("Function: public int add(int a, int b)".to_string()),
                DocLine::bold("Description:"),
                DocLine::text("Adds."),
            ]
        );
    }

    #[test]
    fn test_harvest_counts() {
        let source = "public class A {\n  /** One. */\n  void one() {}\n\n  void two() {}\n}\n";
        let harvest = Language::Java.harvest(source).unwrap();

        assert_eq!(harvest.total, 2);
        assert_eq!(harvest.documented, 1);
        assert_eq!(harvest.errors.get("void two()").map(String::as_str), Some(NO_DOCUMENTATION));
        assert_eq!(harvest.lines[0], DocLine::Subheader("Function: void one()".to_string()));
    }

    #[test]
    fn test_visual_basic_marker_accepts_any_banner_length() {
        let code = "'==========\n' Description: x\n'==========\nSub A()\nEnd Sub\n";
        assert!(Language::VisualBasic.has_comment_marker(code));
        assert!(!Language::VisualBasic.has_comment_marker("Sub A()\nEnd Sub\n"));
        assert!(Language::Java.has_comment_marker("/** x */ void f() {}"));
    }

    #[test]
    fn test_blank_comment_is_empty_for_every_language() {
        for lang in Language::ALL {
            assert_eq!(lang.extract_doc_block("   \n ").unwrap(), Vec::new());
        }
    }
}
