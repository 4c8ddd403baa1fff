/// LLM Client — the single point of entry for all Claude API calls in Parley.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// The pipeline and its stages depend on the `TextGenerator` trait, never on
/// this client's concrete type, so tests can substitute scripted generators.
///
/// Model: claude-sonnet-4-5 (hardcoded — do not make configurable to prevent drift)
use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Parley.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

/// A finite, non-restartable sequence of text deltas from the generator.
pub type TextChunkStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// The text-generation capability the pipeline depends on.
///
/// `generate` is a blocking request/response call; `generate_stream` yields
/// text deltas as the model produces them. Both may fail — callers contain
/// failures per stage rather than aborting the pipeline.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError>;

    async fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<TextChunkStream, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by every pipeline stage in Parley.
/// Wraps the Anthropic Messages API with retry logic and a streaming variant.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Sends the request, retrying on 429 (rate limit), 5xx, and transport
    /// errors with exponential backoff. Returns the raw successful response;
    /// callers decide whether to read it as JSON or as an SSE byte stream.
    async fn send_with_retry(
        &self,
        prompt: &str,
        system: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                // Try to parse error message
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.send_with_retry(prompt, system, false).await?;
        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    /// Streams text deltas from the Messages API. Only the initial request is
    /// retried; once deltas start flowing the stream is not restartable.
    async fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<TextChunkStream, LlmError> {
        let response = self.send_with_retry(prompt, system, true).await?;
        let decoder = SseDecoder::new(response.bytes_stream().boxed());

        let stream = futures::stream::unfold(decoder, |mut decoder| async move {
            decoder.next_delta().await.map(|item| (item, decoder))
        });

        Ok(stream.boxed())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SSE decoding
// ────────────────────────────────────────────────────────────────────────────

enum SseEvent {
    Delta(String),
    Stop,
    Ignore,
}

/// Classifies one SSE line from the streaming Messages API.
/// Text arrives as `content_block_delta` events with a `text_delta` payload.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data.trim()) else {
        return SseEvent::Ignore;
    };
    match value.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => match value.pointer("/delta/text").and_then(|t| t.as_str())
        {
            Some(text) => SseEvent::Delta(text.to_string()),
            None => SseEvent::Ignore,
        },
        Some("message_stop") => SseEvent::Stop,
        _ => SseEvent::Ignore,
    }
}

/// Incrementally decodes an SSE byte stream into text deltas.
/// Bytes are buffered until a full line is available; a transport error ends
/// the stream after surfacing the error once.
struct SseDecoder {
    inner: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: String,
    ready: VecDeque<Result<String, LlmError>>,
    done: bool,
}

impl SseDecoder {
    fn new(inner: BoxStream<'static, reqwest::Result<bytes::Bytes>>) -> Self {
        Self {
            inner,
            buffer: String::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }

    async fn next_delta(&mut self) -> Option<Result<String, LlmError>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(pos) = self.buffer.find('\n') {
                        let line = self.buffer[..pos].trim_end_matches('\r').to_string();
                        self.buffer.drain(..=pos);
                        match parse_sse_line(&line) {
                            SseEvent::Delta(text) => self.ready.push_back(Ok(text)),
                            SseEvent::Stop => self.done = true,
                            SseEvent::Ignore => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.ready.push_back(Err(LlmError::Http(e)));
                }
                None => self.done = true,
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Structured-output helpers
// ────────────────────────────────────────────────────────────────────────────

/// Parses generator output that was prompted to be JSON, tolerating markdown
/// code fences. Callers keep the raw text so they can fall back to treating
/// it as unstructured content when parsing fails.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_json_fences(text))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_structured_through_fences() {
        #[derive(Deserialize)]
        struct Payload {
            insights: Vec<String>,
        }
        let input = "```json\n{\"insights\": [\"ships Rust services\"]}\n```";
        let payload: Payload = parse_structured(input).unwrap();
        assert_eq!(payload.insights, vec!["ships Rust services"]);
    }

    #[test]
    fn test_parse_sse_line_text_delta() {
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
        match parse_sse_line(line) {
            SseEvent::Delta(text) => assert_eq!(text, "Hello"),
            _ => panic!("expected a delta"),
        }
    }

    #[test]
    fn test_parse_sse_line_message_stop() {
        let line = r#"data: {"type":"message_stop"}"#;
        assert!(matches!(parse_sse_line(line), SseEvent::Stop));
    }

    #[test]
    fn test_parse_sse_line_ignores_event_names_and_pings() {
        assert!(matches!(
            parse_sse_line("event: content_block_delta"),
            SseEvent::Ignore
        ));
        assert!(matches!(
            parse_sse_line(r#"data: {"type":"ping"}"#),
            SseEvent::Ignore
        ));
        assert!(matches!(parse_sse_line(""), SseEvent::Ignore));
    }
}
