//! Minimal Anthropic Claude API client.
//!
//! This crate provides a focused streaming client for Claude's Messages API:
//! - Server-sent event parsing that tolerates events split across chunks
//! - A text-only view of the stream for callers that only want the prose

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// A stream of parsed server-sent events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A stream of generated text fragments, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Errors that can occur when using the Claude client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        // No overall request timeout: a long reply streams for as long as it needs.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        if api_key.trim().is_empty() {
            return Err(Error::NoApiKey);
        }
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The model used when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a request and stream the response as parsed events.
    pub async fn stream(&self, request: Request) -> Result<EventStream, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;

        tracing::debug!(
            model = %api_request.model,
            messages = api_request.messages.len(),
            "opening message stream"
        );

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "message stream rejected");
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        // Raw bytes are buffered until a full line arrives, so multi-byte
        // characters split across network chunks decode intact. The trailing
        // `None` marks the end of the body so the buffer can be flushed.
        let stream = response
            .bytes_stream()
            .map(Some)
            .chain(futures::stream::once(futures::future::ready(None)))
            .scan(Vec::<u8>::new(), |buffer, chunk| {
                let events = match chunk {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        parse_sse_events_buffered(buffer)
                    }
                    Some(Err(e)) => vec![Err(Error::Network(e.to_string()))],
                    None => flush_sse_buffer(buffer),
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// Send a request and stream only the generated text.
    pub async fn stream_text(&self, request: Request) -> Result<TextStream, Error> {
        let events = self.stream(request).await?;
        Ok(text_fragments(events))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages,
            temperature: request.temperature,
            stream: true,
        }
    }
}

/// Reduce an event stream to its text deltas.
///
/// Service-side `error` events end the useful part of the stream and surface
/// as `Error::Stream`. So does an event stream that runs out before
/// `message_stop`, since the reply it carried is incomplete.
pub fn text_fragments<S>(events: S) -> TextStream
where
    S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
{
    let fragments = events
        .map(Some)
        .chain(futures::stream::once(futures::future::ready(None)))
        .scan(false, |ended, event| {
            let item = match event {
                Some(Ok(StreamEvent::TextDelta { text, .. })) if !text.is_empty() => Some(Ok(text)),
                Some(Ok(StreamEvent::MessageStop)) => {
                    *ended = true;
                    None
                }
                Some(Ok(StreamEvent::Error { message })) => {
                    *ended = true;
                    Some(Err(Error::Stream(message)))
                }
                Some(Ok(StreamEvent::MessageDelta {
                    stop_reason: Some(StopReason::MaxTokens),
                })) => {
                    tracing::warn!("reply truncated at max_tokens");
                    None
                }
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    *ended = true;
                    Some(Err(e))
                }
                None if !*ended => {
                    tracing::warn!("message stream closed before message_stop");
                    Some(Err(Error::Stream("stream ended before message_stop".to_string())))
                }
                None => None,
            };
            futures::future::ready(Some(item))
        })
        .filter_map(futures::future::ready);

    Box::pin(fragments)
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request to send to Claude.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    fn parse(s: &str) -> Self {
        match s {
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

// ============================================================================
// Streaming types
// ============================================================================

/// Events from a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart { id: String, model: String },
    ContentBlockStart { index: usize, content_type: String },
    TextDelta { index: usize, text: String },
    ContentBlockStop { index: usize },
    MessageDelta { stop_reason: Option<StopReason> },
    MessageStop,
    Ping,
    Error { message: String },
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiStreamEvent {
    MessageStart {
        message: ApiMessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: ApiContentBlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: ApiDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: ApiMessageDelta,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ApiMessageStart {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlockStart {
    r#type: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Parse SSE events from a byte buffer, consuming complete lines and leaving
/// any trailing partial line for the next chunk.
fn parse_sse_events_buffered(buffer: &mut Vec<u8>) -> Vec<Result<StreamEvent, Error>> {
    let mut events = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches(['\r', '\n']);

        // event:, id: and blank separator lines carry nothing we need
        let Some(json_str) = line.strip_prefix("data:") else {
            continue;
        };
        let json_str = json_str.trim_start();

        if json_str == "[DONE]" {
            events.push(Ok(StreamEvent::MessageStop));
        } else if !json_str.is_empty() {
            match serde_json::from_str::<ApiStreamEvent>(json_str) {
                Ok(event) => {
                    if let Some(event) = convert_stream_event(event) {
                        events.push(Ok(event));
                    }
                }
                Err(e) => events.push(Err(Error::Parse(format!("SSE parse error: {e}")))),
            }
        }
    }

    events
}

/// Parse whatever is left once the body has ended. A final line without its
/// newline is still parsed, so a cut-off `data:` line surfaces as a parse error.
fn flush_sse_buffer(buffer: &mut Vec<u8>) -> Vec<Result<StreamEvent, Error>> {
    if buffer.iter().all(u8::is_ascii_whitespace) {
        buffer.clear();
        return Vec::new();
    }
    buffer.push(b'\n');
    parse_sse_events_buffered(buffer)
}

fn convert_stream_event(event: ApiStreamEvent) -> Option<StreamEvent> {
    let event = match event {
        ApiStreamEvent::MessageStart { message } => StreamEvent::MessageStart {
            id: message.id,
            model: message.model,
        },
        ApiStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => StreamEvent::ContentBlockStart {
            index,
            content_type: content_block.r#type,
        },
        ApiStreamEvent::ContentBlockDelta { index, delta } => match delta {
            ApiDelta::TextDelta { text } => StreamEvent::TextDelta { index, text },
            ApiDelta::Other => return None,
        },
        ApiStreamEvent::ContentBlockStop { index } => StreamEvent::ContentBlockStop { index },
        ApiStreamEvent::MessageDelta { delta } => StreamEvent::MessageDelta {
            stop_reason: delta.stop_reason.as_deref().map(StopReason::parse),
        },
        ApiStreamEvent::MessageStop => StreamEvent::MessageStop,
        ApiStreamEvent::Ping => StreamEvent::Ping,
        ApiStreamEvent::Error { error } => StreamEvent::Error {
            message: error.message,
        },
        ApiStreamEvent::Unknown => return None,
    };
    Some(event)
}
