//! Anthropic Messages API client (streaming only).

use async_trait::async_trait;
use futures::StreamExt;
use logoreel_core::direction::{Message, Role};
use serde::Deserialize;
use tracing::debug;

use super::model::{ChatModel, ModelError, ModelRequest, TextStream};
use super::sse::{SseDecoder, SseFrame};

/// Current API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Build the request body for a streamed call.
///
/// The system prompt goes in a structured block carrying an ephemeral
/// `cache_control` hint so repeated turns of one session reuse the prefix.
pub fn build_request_body(request: &ModelRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(message_to_claude)
        .collect();

    serde_json::json!({
        "model": request.settings.model,
        "max_tokens": request.settings.max_tokens,
        "temperature": request.settings.temperature,
        "stream": true,
        "system": [{
            "type": "text",
            "text": request.system_prompt,
            "cache_control": { "type": "ephemeral" }
        }],
        "messages": messages,
    })
}

fn message_to_claude(message: &Message) -> serde_json::Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    serde_json::json!({
        "role": role,
        "content": message.content,
    })
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

/// Map one SSE frame to a text delta, an error, or nothing.
pub fn frame_to_text(frame: &SseFrame) -> Option<Result<String, ModelError>> {
    let event: StreamEvent = match serde_json::from_str(&frame.data) {
        Ok(event) => event,
        Err(e) => return Some(Err(ModelError::Stream(format!("unparseable event: {e}")))),
    };
    match event.kind.as_str() {
        "content_block_delta" => {
            let delta = event.delta?;
            if delta.kind.as_deref().is_some_and(|k| k != "text_delta") {
                return None;
            }
            delta.text.filter(|t| !t.is_empty()).map(Ok)
        }
        "error" => {
            let error = event.error.unwrap_or(ApiErrorBody { kind: None, message: None });
            Some(Err(ModelError::Stream(format!(
                "{}: {}",
                error.kind.unwrap_or_else(|| "error".into()),
                error.message.unwrap_or_default()
            ))))
        }
        _ => None,
    }
}

fn parse_http_error(status: u16, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    ModelError::Api { status, message }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn stream(&self, request: ModelRequest) -> Result<TextStream, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::NotConfigured)?;
        let body = build_request_body(&request);

        debug!(
            model = %request.settings.model,
            phase = request.settings.phase.number(),
            messages = request.messages.len(),
            "starting model stream"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body_text));
        }

        let stream = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items: Vec<Result<String, ModelError>> = match chunk {
                    Ok(bytes) => decoder.push(&bytes).iter().filter_map(frame_to_text).collect(),
                    Err(e) => vec![Err(ModelError::Network(e.to_string()))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}
