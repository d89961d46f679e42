//! SSE 行缓冲
//!
//! 网络分块可能在任意位置截断一行，按换行切分后只返回完整的 `data:` 负载

/// SSE 流结束标记
pub const DONE: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块字节，返回其中完整行的 `data:` 负载
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}
