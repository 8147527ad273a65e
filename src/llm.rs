//! Claude API integration for coaching text
//!
//! Two call shapes: a small non-streaming completion for the one-line coach
//! note on the plain-text brief, and a streaming completion that feeds the
//! morning-suggestion relay token by token.

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::mem;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-sonnet-4-6";
const API_VERSION: &str = "2023-06-01";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  messages: Vec<ClaudeMessage>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  stream: bool,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// One event from the streaming messages API. Anything other than a text
/// delta, a stop, or an error (pings, block starts) is skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
  #[serde(rename = "content_block_delta")]
  ContentBlockDelta { delta: ContentDelta },
  #[serde(rename = "message_stop")]
  MessageStop,
  #[serde(rename = "error")]
  Error { error: ClaudeErrorDetail },
  #[serde(other)]
  Other,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
  #[serde(default)]
  text: Option<String>,
}

/// ---------------------------------------------------------------------------
/// SSE Line Buffering
/// ---------------------------------------------------------------------------

/// Accumulates raw bytes and yields complete `data:` payloads. TCP chunks do
/// not align with SSE event boundaries, so a payload split across two chunks
/// stays buffered until its terminating newline arrives.
#[derive(Debug, Default)]
struct SseLineBuffer {
  buffer: String,
}

impl SseLineBuffer {
  fn new() -> Self {
    Self::default()
  }

  /// Append a chunk and return every complete `data:` payload it finished
  fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
    self.buffer.push_str(&String::from_utf8_lossy(bytes));

    let mut payloads = Vec::new();
    while let Some(newline) = self.buffer.find('\n') {
      let line = self.buffer[..newline].trim_end_matches('\r').to_string();
      self.buffer = self.buffer[newline + 1..].to_string();

      // event:/id:/comment lines and blank separators carry no payload
      if let Some(data) = line.trim().strip_prefix("data: ") {
        if !data.trim().is_empty() {
          payloads.push(data.to_string());
        }
      }
    }
    payloads
  }

  /// Drain a trailing payload that arrived without a final newline
  fn flush(&mut self) -> Option<String> {
    let remaining = mem::take(&mut self.buffer);
    let data = remaining.trim().strip_prefix("data: ")?;
    if data.trim().is_empty() {
      None
    } else {
      Some(data.to_string())
    }
  }
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ClaudeClient {
  client: Client,
  api_key: String,
  api_url: String,
}

impl ClaudeClient {
  /// Create a new Claude client, loading the API key from the environment
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;

    Ok(Self {
      client: Client::new(),
      api_key,
      api_url: CLAUDE_API_URL.to_string(),
    })
  }

  #[cfg(test)]
  fn with_endpoint(api_key: &str, api_url: &str) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.to_string(),
      api_url: api_url.to_string(),
    }
  }

  fn request_body(prompt: &str, max_tokens: u32, stream: bool) -> ClaudeRequest {
    ClaudeRequest {
      model: CLAUDE_MODEL.to_string(),
      max_tokens,
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
      }],
      stream,
    }
  }

  /// One-shot completion, returning the first text block
  pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
    let response = self
      .client
      .post(&self.api_url)
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&Self::request_body(prompt, max_tokens, false))
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))
  }

  /// Streaming completion. Yields text deltas as they arrive; the stream ends
  /// after `message_stop`, or after a single Err item if the API reports a
  /// failure mid-stream. Request setup failures also surface as a single Err
  /// item so the caller's already-open SSE response can carry them.
  pub fn complete_stream(
    &self,
    prompt: String,
    max_tokens: u32,
  ) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static {
    let client = self.client.clone();
    let api_key = self.api_key.clone();
    let api_url = self.api_url.clone();

    stream! {
      let response = match client
        .post(&api_url)
        .header("x-api-key", &api_key)
        .header("anthropic-version", API_VERSION)
        .header("content-type", "application/json")
        .json(&Self::request_body(&prompt, max_tokens, true))
        .send()
        .await
      {
        Ok(response) => response,
        Err(e) => {
          yield Err(LlmError::Request(e.to_string()));
          return;
        }
      };

      let status = response.status();
      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ClaudeErrorResponse>(&body) {
          Ok(error_resp) => error_resp.error.message,
          Err(_) => format!("HTTP {}: {}", status, body),
        };
        yield Err(LlmError::Api(message));
        return;
      }

      let mut bytes = response.bytes_stream();
      let mut lines = SseLineBuffer::new();

      while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
          Ok(chunk) => chunk,
          Err(e) => {
            yield Err(LlmError::Request(e.to_string()));
            return;
          }
        };

        for payload in lines.feed(&chunk) {
          match serde_json::from_str::<StreamEvent>(&payload) {
            Ok(StreamEvent::ContentBlockDelta { delta }) => {
              if let Some(text) = delta.text {
                if !text.is_empty() {
                  yield Ok(text);
                }
              }
            }
            Ok(StreamEvent::MessageStop) => return,
            Ok(StreamEvent::Error { error }) => {
              yield Err(LlmError::Api(error.message));
              return;
            }
            Ok(StreamEvent::Other) => {}
            // Unparseable payloads are dropped; the stop event still ends
            // the stream cleanly
            Err(_) => {}
          }
        }
      }

      if let Some(payload) = lines.flush() {
        if let Ok(StreamEvent::ContentBlockDelta { delta }) =
          serde_json::from_str::<StreamEvent>(&payload)
        {
          if let Some(text) = delta.text {
            if !text.is_empty() {
              yield Ok(text);
            }
          }
        }
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use futures_util::StreamExt;

  #[test]
  fn test_line_buffer_multiple_events_per_chunk() {
    let mut buffer = SseLineBuffer::new();
    let payloads = buffer.feed(
      b"event: content_block_delta\ndata: {\"a\":1}\n\nevent: message_stop\ndata: {\"b\":2}\n\n",
    );
    assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
  }

  #[test]
  fn test_line_buffer_payload_split_across_chunks() {
    let mut buffer = SseLineBuffer::new();
    assert!(buffer.feed(b"data: {\"text\":\"hel").is_empty());
    let payloads = buffer.feed(b"lo\"}\n");
    assert_eq!(payloads, vec!["{\"text\":\"hello\"}"]);
  }

  #[test]
  fn test_line_buffer_flush_trailing_payload() {
    let mut buffer = SseLineBuffer::new();
    assert!(buffer.feed(b"data: {\"x\":1}").is_empty());
    assert_eq!(buffer.flush(), Some("{\"x\":1}".to_string()));
    assert_eq!(buffer.flush(), None);
  }

  #[test]
  fn test_stream_event_parsing() {
    let delta: StreamEvent =
      serde_json::from_str(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#)
        .unwrap();
    assert!(matches!(
      delta,
      StreamEvent::ContentBlockDelta { delta: ContentDelta { text: Some(ref t) } } if t == "Hi"
    ));

    let stop: StreamEvent = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
    assert!(matches!(stop, StreamEvent::MessageStop));

    let ping: StreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert!(matches!(ping, StreamEvent::Other));
  }

  #[tokio::test]
  async fn test_complete_returns_first_text_block() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/")
      .match_header("x-api-key", "test-key")
      .match_header("anthropic-version", API_VERSION)
      .with_status(200)
      .with_body(r#"{"content":[{"type":"text","text":"Solid day to push."}]}"#)
      .create_async()
      .await;

    let client = ClaudeClient::with_endpoint("test-key", &server.url());
    let text = client.complete("prompt", 100).await.unwrap();

    assert_eq!(text, "Solid day to push.");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_complete_surfaces_api_error_message() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/")
      .with_status(401)
      .with_body(r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
      .create_async()
      .await;

    let client = ClaudeClient::with_endpoint("bad-key", &server.url());
    let err = client.complete("prompt", 100).await.unwrap_err();

    assert!(matches!(err, LlmError::Api(ref msg) if msg == "invalid x-api-key"));
  }

  #[tokio::test]
  async fn test_complete_stream_yields_deltas_until_stop() {
    let body = concat!(
      "event: content_block_delta\n",
      "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Good \"}}\n\n",
      "event: content_block_delta\n",
      "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"morning\"}}\n\n",
      "event: message_stop\n",
      "data: {\"type\":\"message_stop\"}\n\n",
    );

    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/")
      .with_status(200)
      .with_body(body)
      .create_async()
      .await;

    let client = ClaudeClient::with_endpoint("test-key", &server.url());
    let items: Vec<_> = client
      .complete_stream("prompt".to_string(), 400)
      .collect()
      .await;

    let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(texts, vec!["Good ", "morning"]);
  }

  #[tokio::test]
  async fn test_complete_stream_mid_stream_error_is_terminal() {
    let body = concat!(
      "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Good\"}}\n\n",
      "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
      "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"ignored\"}}\n\n",
    );

    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/")
      .with_status(200)
      .with_body(body)
      .create_async()
      .await;

    let client = ClaudeClient::with_endpoint("test-key", &server.url());
    let items: Vec<_> = client
      .complete_stream("prompt".to_string(), 400)
      .collect()
      .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Good");
    assert!(matches!(items[1], Err(LlmError::Api(ref msg)) if msg == "Overloaded"));
  }

  #[tokio::test]
  async fn test_complete_stream_http_error_yields_single_err() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/")
      .with_status(529)
      .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
      .create_async()
      .await;

    let client = ClaudeClient::with_endpoint("test-key", &server.url());
    let items: Vec<_> = client
      .complete_stream("prompt".to_string(), 400)
      .collect()
      .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(LlmError::Api(ref msg)) if msg == "Overloaded"));
  }
}
