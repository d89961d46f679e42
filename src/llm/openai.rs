//! OpenAI Chat Completions API 流式实现

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tracing::{debug, error};

use super::sse::{SseBuffer, DONE};
use super::types::{ChatChunk, ChatMessage, ChatOptions, LlmError};

/// OpenAI 请求载荷
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// OpenAI SSE 响应块
#[derive(Deserialize, Debug)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAiChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiDelta {
    content: Option<String>,
}

/// 解析一条 SSE 数据
fn parse_chunk(data: &str) -> Option<ChatChunk> {
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk.choices.into_iter().next().map(|choice| ChatChunk {
            content: choice.delta.content,
            finish_reason: choice.finish_reason,
        }),
        Err(e) => {
            debug!("Failed to parse OpenAI response: {}, data: {}", e, data);
            None
        }
    }
}

/// 流式调用 OpenAI API
pub fn stream_openai(
    client: &Client,
    api_key: &str,
    endpoint: &str,
    messages: Vec<ChatMessage>,
    model: &str,
    options: &ChatOptions,
) -> Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>> {
    let endpoint = endpoint.to_string();
    let api_key = api_key.to_string();
    let model = model.to_string();
    let options = options.clone();
    let client = client.clone();

    Box::pin(try_stream! {
        let payload = OpenAiRequest {
            model: model.clone(),
            messages,
            stream: true,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!("OpenAI API request: endpoint={}, model={}", endpoint, model);

        let response = client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI API error: status={}, body={}", status_code, error_text.chars().take(500).collect::<String>());
            Err::<(), LlmError>(LlmError::from_status(status_code, error_text))?;
            return;
        }

        let mut sse = SseBuffer::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let bytes = chunk_result?;
            for data in sse.push(&bytes) {
                if data == DONE {
                    return;
                }
                if let Some(chunk) = parse_chunk(&data) {
                    yield chunk;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#).unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hi"));
        assert!(chunk.finish_reason.is_none());

        assert!(parse_chunk(r#"{"choices":[]}"#).is_none());
        assert!(parse_chunk("not json").is_none());
    }
}
