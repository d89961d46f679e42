//! LLM Prompt 模板
//!
//! 整文件文档生成与单函数文档生成两类 Prompt

/// 整文件文档生成 Prompt
pub const WHOLE_FILE_PROMPT: &str = r#"You are a professional coding and documentation assistant.
You will be given a code file written in {language} and your job is to generate and add the appropriate documentation for it.

Create a comprehensive documentation for each function.
You MUST respond with a single code block that contains both the generated documentation and the given code.

Each function must be documented with:
- Purpose of the function with a detailed description of what the function does.
- Descriptions of input parameters if any.
- Return values if any.
- Exceptions handled in the function if any.

ALWAYS use this documentation style for the functions:
{doc_style}

Rules:
- DO NOT omit any function or the body of any function.
- DO NOT alter the code; only add the documentation.
- DO NOT document classes.
- DO NOT add 'Example usage' sections.
- DO NOT write observations outside the code block.
- RETURN ONLY ONE CODE BLOCK.

File: {file_path}

This is the code to document:
```
{code}
```"#;

/// 单函数文档生成 Prompt
pub const FUNCTION_PROMPT: &str = r#"You are a professional coding and documentation assistant.
You will be given a function written in {language}, and your job is to generate the appropriate documentation for it.

ALWAYS use this documentation style:
{doc_style}

The documentation should include:
- Purpose of the function with a detailed description of what the function does.
- Descriptions of input parameters.
- Return values.
- Exceptions handled in the function.

Rules:
- The documentation MUST be inside the code block and written in natural language.
- Return a code block with the function and its documentation.
- DO NOT omit or alter the function; only add the documentation.
- DO NOT add anything else to the code block.
- RETURN ONLY ONE CODE BLOCK.

This is the function to document:
```
{code}
```"#;

/// 格式化整文件 Prompt
pub fn format_whole_file_prompt(language: &str, doc_style: &str, file_path: &str, code: &str) -> String {
    WHOLE_FILE_PROMPT
        .replace("{language}", language)
        .replace("{doc_style}", doc_style)
        .replace("{file_path}", file_path)
        .replace("{code}", code)
}

/// 格式化单函数 Prompt（`code` 为签名 + 函数体）
pub fn format_function_prompt(language: &str, doc_style: &str, code: &str) -> String {
    FUNCTION_PROMPT
        .replace("{language}", language)
        .replace("{doc_style}", doc_style)
        .replace("{code}", code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_whole_file_prompt() {
        let result = format_whole_file_prompt("Python", "\"\"\"Doc.\"\"\"", "src/main.py", "print('hello')");
        assert!(result.contains("written in Python"));
        assert!(result.contains("src/main.py"));
        assert!(result.contains("print('hello')"));
        assert!(!result.contains("{code}"));
    }

    #[test]
    fn test_code_placeholders_are_not_expanded() {
        // 代码中恰好出现占位符文本时保持原样
        let result = format_function_prompt("Java", "/** */", "String s = \"{language}\";");
        assert!(result.contains("String s = \"{language}\";"));
    }
}
