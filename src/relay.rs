//! Relay from an upstream completion stream onto the client-facing SSE wire
//!
//! The relay normalizes whatever the upstream does into a sequence the client
//! can rely on: zero or more text units, then exactly one terminal. A clean
//! upstream end terminates with Done; the first upstream failure terminates
//! with a single Error and nothing follows it.

use async_stream::stream;
use futures_util::{pin_mut, Stream, StreamExt};
use serde_json::json;

use crate::llm::LlmError;

/// One unit on the client-facing stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUnit {
  Text(String),
  Error(String),
  Done,
}

impl StreamUnit {
  /// The SSE `data:` payload for this unit. Text and Error are JSON objects
  /// so the client can tell them apart; Done is the bare [DONE] sentinel.
  pub fn sse_data(&self) -> String {
    match self {
      StreamUnit::Text(text) => json!({ "text": text }).to_string(),
      StreamUnit::Error(message) => json!({ "error": message }).to_string(),
      StreamUnit::Done => "[DONE]".to_string(),
    }
  }
}

/// Forward upstream text onto the wire, closing with exactly one terminal
/// unit. Nothing is ever emitted after Error or Done.
pub fn relay(
  upstream: impl Stream<Item = Result<String, LlmError>> + Send + 'static,
) -> impl Stream<Item = StreamUnit> + Send + 'static {
  stream! {
    pin_mut!(upstream);

    while let Some(item) = upstream.next().await {
      match item {
        Ok(text) => yield StreamUnit::Text(text),
        Err(e) => {
          yield StreamUnit::Error(e.to_string());
          return;
        }
      }
    }

    yield StreamUnit::Done;
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
