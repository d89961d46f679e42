//! Anthropic Messages API 流式实现

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tracing::{debug, error};

use super::sse::{SseBuffer, DONE};
use super::types::{ChatChunk, ChatMessage, ChatOptions, LlmError};

/// Anthropic 请求载荷
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Anthropic SSE 事件
#[derive(Deserialize, Debug)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
}

#[derive(Deserialize, Debug)]
struct AnthropicDelta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
    stop_reason: Option<String>,
}

/// 解析一条 SSE 事件
fn parse_event(data: &str) -> Option<ChatChunk> {
    let event = match serde_json::from_str::<AnthropicEvent>(data) {
        Ok(event) => event,
        Err(e) => {
            debug!("Failed to parse Anthropic response: {}, data: {}", e, data);
            return None;
        }
    };

    match event.event_type.as_str() {
        "content_block_delta" => {
            let delta = event.delta?;
            if delta.delta_type.as_deref() != Some("text_delta") {
                return None;
            }
            delta.text.map(|text| ChatChunk {
                content: Some(text),
                finish_reason: None,
            })
        }
        "message_delta" => event.delta?.stop_reason.map(|reason| ChatChunk {
            content: None,
            finish_reason: Some(reason),
        }),
        "message_stop" => Some(ChatChunk {
            content: None,
            finish_reason: Some("stop".to_string()),
        }),
        _ => None,
    }
}

/// 流式调用 Anthropic API
pub fn stream_anthropic(
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
        // 分离系统消息
        let mut system_content: Option<String> = None;
        let mut anthropic_messages: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            if msg.role == "system" {
                system_content = Some(msg.content);
            } else {
                anthropic_messages.push(AnthropicMessage {
                    role: msg.role,
                    content: msg.content,
                });
            }
        }

        let payload = AnthropicRequest {
            model: model.clone(),
            messages: anthropic_messages,
            system: system_content,
            stream: true,
            max_tokens: options.max_tokens.unwrap_or(4096),
            temperature: options.temperature,
        };

        debug!("Anthropic API request: endpoint={}, model={}", endpoint, model);

        let response = client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key.as_str())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error: status={}, body={}", status_code, error_text.chars().take(500).collect::<String>());
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
                if let Some(chunk) = parse_event(&data) {
                    yield chunk;
                }
            }
        }
    })
}
