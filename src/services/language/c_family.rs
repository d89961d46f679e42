//! C 系语言（Java / C#）花括号扫描器
//!
//! 逐字节扫描，跳过字符串与注释，维护一个显式的作用域栈：
//! - 每遇到边界（`;` `{` `}`）之后的第一个代码字符开始累积声明头
//! - `{` 时按声明头分类，声明头随作用域入栈，累积器复位
//! - `}` 时出栈，函数/类作用域在关闭时才生成事件
//!
//! 仅识别根、命名空间或类直接包含的方法；函数体内部的一切都属于函数体。

use super::scope::{class_node, doc_node, function_node};
use super::types::{collapse_whitespace, ParseError, SourceTree, SyntaxNode};

/// 文档注释形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCommentStyle {
    /// `/** ... */`
    Javadoc,
    /// 连续的 `///` 行
    TripleSlash,
}

/// 扫描器的语言差异
#[derive(Debug, Clone, Copy)]
pub struct CFamilySyntax {
    pub language: &'static str,
    pub doc_style: DocCommentStyle,
    /// C# 的 `[Attribute]` 与 `@"verbatim"` 字符串
    pub csharp: bool,
}

pub const JAVA: CFamilySyntax = CFamilySyntax {
    language: "Java",
    doc_style: DocCommentStyle::Javadoc,
    csharp: false,
};

pub const CSHARP: CFamilySyntax = CFamilySyntax {
    language: "C#",
    doc_style: DocCommentStyle::TripleSlash,
    csharp: true,
};

/// 类型声明关键字
const TYPE_KEYWORDS: &[&str] = &["class", "interface", "@interface", "enum", "struct", "record"];

/// 后面可以跟括号但不是方法名的关键字
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "foreach", "while", "do", "switch", "catch", "try", "finally",
    "synchronized", "using", "lock", "fixed", "return", "throw", "new", "when", "await",
    "yield", "typeof", "sizeof", "nameof", "checked", "unchecked", "default",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Namespace,
    Class,
    Function,
    Block,
    /// 括号内的花括号（注解数组、lambda 参数），关闭后恢复外层声明头
    Inline,
}

/// 打开的作用域，持有自己的声明头
struct Scope {
    kind: ScopeKind,
    start: usize,
    brace: usize,
    name: String,
    signature: String,
    saved_header: Option<usize>,
    saved_parens: usize,
}

enum Header {
    Namespace,
    Class { name: String, signature: String },
    Function { name: String, signature: String },
    Block,
}

struct Scanner<'a> {
    syntax: CFamilySyntax,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    header_start: Option<usize>,
    parens: usize,
    stack: Vec<Scope>,
    nodes: Vec<SyntaxNode>,
    doc_run: Option<(usize, usize)>,
}

/// 扫描源码，生成事件序列
pub fn parse(source: &str, syntax: CFamilySyntax) -> Result<SourceTree, ParseError> {
    let mut scanner = Scanner {
        syntax,
        source,
        bytes: source.as_bytes(),
        pos: 0,
        header_start: None,
        parens: 0,
        stack: Vec::new(),
        nodes: Vec::new(),
        doc_run: None,
    };
    scanner.run()?;
    Ok(SourceTree::new(source, scanner.nodes))
}

impl<'a> Scanner<'a> {
    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            let next = self.bytes.get(self.pos + 1).copied();

            match (c, next) {
                (b'/', Some(b'/')) => self.line_comment(),
                (b'/', Some(b'*')) => self.block_comment()?,
                (b'"', _) => {
                    self.mark_header();
                    self.string()?;
                }
                (b'\'', _) => {
                    self.mark_header();
                    self.char_literal()?;
                }
                (b'@', Some(b'"')) if self.syntax.csharp => {
                    self.mark_header();
                    self.pos += 1;
                    self.verbatim_string()?;
                }
                (b'@', Some(b'$')) if self.syntax.csharp && self.bytes.get(self.pos + 2) == Some(&b'"') => {
                    self.mark_header();
                    self.pos += 2;
                    self.verbatim_string()?;
                }
                (b'{', _) => {
                    self.open();
                    self.pos += 1;
                }
                (b'}', _) => {
                    self.close()?;
                    self.pos += 1;
                }
                (b';', _) => {
                    if self.parens == 0 {
                        self.header_start = None;
                    }
                    self.pos += 1;
                }
                (b'(', _) => {
                    self.mark_header();
                    self.parens += 1;
                    self.pos += 1;
                }
                (b')', _) => {
                    self.parens = self.parens.saturating_sub(1);
                    self.pos += 1;
                }
                (c, _) if c.is_ascii_whitespace() => self.pos += 1,
                _ => {
                    self.mark_header();
                    self.pos += 1;
                }
            }
        }

        self.flush_doc_run();
        if let Some(scope) = self.stack.last() {
            return Err(ParseError::Unbalanced {
                language: self.syntax.language,
                token: "{",
                offset: scope.brace,
            });
        }
        Ok(())
    }

    fn mark_header(&mut self) {
        if self.header_start.is_none() {
            self.header_start = Some(self.pos);
        }
    }

    fn unterminated(&self, what: &'static str, offset: usize) -> ParseError {
        ParseError::Unterminated {
            language: self.syntax.language,
            what,
            offset,
        }
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        let rest = &self.source[start..];
        let end = rest.find('\n').map_or(self.bytes.len(), |rel| start + rel);

        if self.syntax.doc_style == DocCommentStyle::TripleSlash
            && rest.starts_with("///")
            && !rest.starts_with("////")
        {
            self.extend_doc_run(start, end);
        }
        self.pos = end;
    }

    fn extend_doc_run(&mut self, start: usize, end: usize) {
        match self.doc_run {
            Some((run_start, run_end)) if is_line_gap(&self.source[run_end..start]) => {
                self.doc_run = Some((run_start, end));
            }
            _ => {
                self.flush_doc_run();
                self.doc_run = Some((start, end));
            }
        }
    }

    fn flush_doc_run(&mut self) {
        if let Some(range) = self.doc_run.take() {
            self.nodes.push(doc_node(range));
        }
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let Some(rel) = self.source[start + 2..].find("*/") else {
            return Err(self.unterminated("block comment", start));
        };
        let end = start + 2 + rel + 2;

        // `/**/` 是空注释
        if self.syntax.doc_style == DocCommentStyle::Javadoc
            && self.source[start..].starts_with("/**")
            && end - start > 4
        {
            self.nodes.push(doc_node((start, end)));
        }
        self.pos = end;
        Ok(())
    }

    fn string(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        if self.source[start..].starts_with("\"\"\"") {
            return match self.source[start + 3..].find("\"\"\"") {
                Some(rel) => {
                    self.pos = start + 3 + rel + 3;
                    Ok(())
                }
                None => Err(self.unterminated("text block", start)),
            };
        }
        self.quoted(b'"', "string literal")
    }

    fn char_literal(&mut self) -> Result<(), ParseError> {
        self.quoted(b'\'', "character literal")
    }

    /// 普通引号字面量，支持反斜杠转义，不允许跨行
    fn quoted(&mut self, quote: u8, what: &'static str) -> Result<(), ParseError> {
        let start = self.pos;
        let mut i = start + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => break,
                c if c == quote => {
                    self.pos = i + 1;
                    return Ok(());
                }
                _ => i += 1,
            }
        }
        Err(self.unterminated(what, start))
    }

    /// C# `@"..."`，`""` 表示一个引号，可跨行
    fn verbatim_string(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut i = start + 1;
        while i < self.bytes.len() {
            if self.bytes[i] == b'"' {
                if self.bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                self.pos = i + 1;
                return Ok(());
            }
            i += 1;
        }
        Err(self.unterminated("verbatim string", start))
    }

    fn open(&mut self) {
        let brace = self.pos;

        if self.parens > 0 {
            self.stack.push(Scope {
                kind: ScopeKind::Inline,
                start: brace,
                brace,
                name: String::new(),
                signature: String::new(),
                saved_header: self.header_start.take(),
                saved_parens: self.parens,
            });
            self.parens = 0;
            return;
        }

        let start = self.header_start.take().unwrap_or(brace);
        let declarations_allowed = matches!(
            self.stack.last().map(|s| s.kind),
            None | Some(ScopeKind::Namespace) | Some(ScopeKind::Class)
        );

        let (kind, name, signature) = match classify(&self.source[start..brace], self.syntax.csharp) {
            Header::Namespace if declarations_allowed => (ScopeKind::Namespace, String::new(), String::new()),
            Header::Class { name, signature } if declarations_allowed => (ScopeKind::Class, name, signature),
            Header::Function { name, signature } if declarations_allowed => {
                (ScopeKind::Function, name, signature)
            }
            _ => (ScopeKind::Block, String::new(), String::new()),
        };

        self.stack.push(Scope {
            kind,
            start,
            brace,
            name,
            signature,
            saved_header: None,
            saved_parens: 0,
        });
    }

    fn close(&mut self) -> Result<(), ParseError> {
        let Some(scope) = self.stack.pop() else {
            return Err(ParseError::Unbalanced {
                language: self.syntax.language,
                token: "}",
                offset: self.pos,
            });
        };
        let end = self.pos + 1;

        match scope.kind {
            ScopeKind::Function => {
                self.nodes
                    .push(function_node(&scope.name, scope.signature, (scope.start, end), scope.brace));
            }
            ScopeKind::Class => {
                self.nodes.push(class_node(&scope.name, scope.signature, (scope.start, end)));
            }
            ScopeKind::Inline => {
                self.header_start = scope.saved_header;
                self.parens = scope.saved_parens;
                return Ok(());
            }
            ScopeKind::Namespace | ScopeKind::Block => {}
        }

        self.header_start = None;
        self.parens = 0;
        Ok(())
    }
}

/// 两段 `///` 之间只有换行和缩进
fn is_line_gap(gap: &str) -> bool {
    gap.chars().all(char::is_whitespace) && gap.matches('\n').count() <= 1
}

/// 按声明头判断作用域类型
fn classify(header: &str, csharp: bool) -> Header {
    let signature = collapse_whitespace(&strip_annotations(header, csharp));
    if signature.is_empty() {
        return Header::Block;
    }

    let pre_paren = signature.split('(').next().unwrap_or_default();
    let words: Vec<&str> = pre_paren.split_whitespace().collect();

    if let Some(idx) = words.iter().position(|w| TYPE_KEYWORDS.contains(w)) {
        let name = words[idx + 1..]
            .iter()
            .find(|w| !TYPE_KEYWORDS.contains(*w))
            .map(|w| identifier_prefix(w));
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            return Header::Class { name, signature };
        }
    }

    if words.contains(&"namespace") {
        return Header::Namespace;
    }

    match method_name(&signature) {
        Some(name) => Header::Function { name, signature },
        None => Header::Block,
    }
}

/// 方法声明：`修饰符 类型 名称(参数) [throws ...|where ...|: base(...)]`
fn method_name(signature: &str) -> Option<String> {
    let open = signature.find('(')?;
    let close = matching_paren(signature, open)?;

    let tail = signature[close + 1..].trim();
    let tail_ok = tail.is_empty() || tail.starts_with("throws") || tail.starts_with("where") || tail.starts_with(':');
    if !tail_ok {
        return None;
    }

    let pre = signature[..open].trim_end();
    if pre.contains('=') || pre.contains("->") {
        return None;
    }
    let words: Vec<&str> = pre.split_whitespace().collect();
    if words.contains(&"new") {
        return None;
    }

    // 泛型方法 `Foo<T>`，显式接口实现 `IFoo.Bar`
    let last = words.last()?;
    let last = last.split('<').next().unwrap_or_default();
    let name = last.rsplit('.').next().unwrap_or_default();

    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && !CONTROL_KEYWORDS.contains(&name);
    valid.then(|| name.to_string())
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn identifier_prefix(word: &str) -> String {
    word.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

/// 去掉 Java 注解（`@Name(...)`）与 C# 特性（`[Attr(...)]`）
fn strip_annotations(header: &str, csharp: bool) -> String {
    let chars: Vec<char> = header.chars().collect();
    let mut out = String::with_capacity(header.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '@' && chars.get(i + 1).map_or(false, |n| n.is_alphabetic()) {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.') {
                j += 1;
            }
            let word: String = chars[i + 1..j].iter().collect();
            if word == "interface" {
                out.push_str("@interface");
                i = j;
                continue;
            }
            let mut k = j;
            while k < chars.len() && chars[k].is_whitespace() {
                k += 1;
            }
            if k < chars.len() && chars[k] == '(' {
                j = skip_balanced(&chars, k, '(', ')');
            }
            out.push(' ');
            i = j;
            continue;
        }

        if csharp && c == '[' {
            let attribute_position = out
                .trim_end()
                .chars()
                .last()
                .map_or(true, |p| matches!(p, '(' | ','));
            if attribute_position {
                i = skip_balanced(&chars, i, '[', ']');
                out.push(' ');
                continue;
            }
        }

        out.push(c);
        i += 1;
    }
    out
}

/// 返回匹配的闭合符号之后的位置
fn skip_balanced(chars: &[char], start: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return i + 1;
            }
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::language::types::SyntaxKind;

    fn functions(tree: &SourceTree) -> Vec<(String, String)> {
        tree.nodes()
            .iter()
            .filter_map(|n| match &n.kind {
                SyntaxKind::Function { name, .. } => Some((name.clone(), n.signature.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_java_methods_and_class() {
        let source = r#"
package demo;

public class Calculator {
    private int total = 0;

    @Override
    public String toString() {
        return "{" + total + "}";
    }

    public static <T> List<T> wrap(T item,
                                  int count) throws IOException {
        if (count > 0) {
            Runnable r = () -> { count--; };
        }
        return null;
    }
}
"#;
        let tree = parse(source, JAVA).unwrap();
        let found = functions(&tree);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ("toString".to_string(), "public String toString()".to_string()));
        assert_eq!(found[1].0, "wrap");
        assert_eq!(
            found[1].1,
            "public static <T> List<T> wrap(T item, int count) throws IOException"
        );

        let classes: Vec<_> = tree
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind, SyntaxKind::Class { .. }))
            .collect();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].signature, "public class Calculator");
    }

    #[test]
    fn test_annotation_range_is_part_of_function() {
        let source = "class A {\n    @SuppressWarnings({\"a\", \"b\"})\n    void f() {}\n}\n";
        let tree = parse(source, JAVA).unwrap();
        let node = tree
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, SyntaxKind::Function { .. }))
            .unwrap();

        assert!(source[node.range.0..node.range.1].starts_with("@SuppressWarnings"));
        assert_eq!(node.signature, "void f()");
    }

    #[test]
    fn test_anonymous_class_methods_are_not_top_level() {
        let source = "class A {\n    Runnable r = new Runnable() {\n        public void run() {}\n    };\n    void g() {}\n}\n";
        let tree = parse(source, JAVA).unwrap();
        let names: Vec<_> = functions(&tree).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["g"]);
    }

    #[test]
    fn test_csharp_triple_slash_runs_merge() {
        let source = "namespace N {\n  class C {\n    /// <summary>\n    /// Adds.\n    /// </summary>\n    [Pure]\n    public int Add(int a, int b) { return a + b; }\n  }\n}\n";
        let tree = parse(source, CSHARP).unwrap();
        let docs: Vec<_> = tree
            .nodes()
            .iter()
            .filter(|n| n.kind == SyntaxKind::DocComment)
            .collect();

        assert_eq!(docs.len(), 1);
        let text = &source[docs[0].range.0..docs[0].range.1];
        assert!(text.starts_with("/// <summary>"));
        assert!(text.ends_with("/// </summary>"));
        assert_eq!(functions(&tree)[0].1, "public int Add(int a, int b)");
    }

    #[test]
    fn test_csharp_verbatim_string_and_constructor_chain() {
        let source = "class D : Base {\n  public D(int x) : base(x) { var p = @\"C:\\dir\\\"\"{\"; }\n}\n";
        let tree = parse(source, CSHARP).unwrap();
        assert_eq!(functions(&tree)[0].0, "D");
    }

    #[test]
    fn test_properties_are_not_functions() {
        let source = "class P {\n  public int X { get; set; }\n  public int Y { get { return 1; } }\n}\n";
        let tree = parse(source, CSHARP).unwrap();
        assert!(functions(&tree).is_empty());
    }

    #[test]
    fn test_unbalanced_and_unterminated() {
        assert!(matches!(
            parse("class A {\n void f() {\n}\n", JAVA),
            Err(ParseError::Unbalanced { token: "{", .. })
        ));
        assert!(matches!(
            parse("class A {}\n}\n", JAVA),
            Err(ParseError::Unbalanced { token: "}", .. })
        ));
        assert!(matches!(
            parse("class A { /* open\n", JAVA),
            Err(ParseError::Unterminated { what: "block comment", .. })
        ));
        assert!(matches!(
            parse("class A { String s = \"abc\n; }", JAVA),
            Err(ParseError::Unterminated { what: "string literal", .. })
        ));
    }
}
