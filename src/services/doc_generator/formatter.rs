//! 空白规范化
//!
//! 去掉行尾空白，连续空行最多保留两行，文件以单个换行结尾

/// 连续空行上限
const MAX_BLANK_LINES: usize = 2;

/// 规范化源码空白
pub fn format_source(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut blank_run = 0;

    for line in code.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_LINES {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out.push('\n');
    out
}
