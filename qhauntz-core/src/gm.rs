//! Game-master assistant chat.
//!
//! A [`ChatSession`] keeps the transcript of one conversation with a
//! [`TextSource`]. Each prompt adds a user message, then the reply is built
//! up fragment by fragment as it streams in. If the stream fails, the partial
//! reply is removed and the session records a single error string.

use async_trait::async_trait;
use claude::Claude;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// System prompt used when the config does not supply one.
pub const DEFAULT_GM_SYSTEM_PROMPT: &str = "You are a game master's assistant for Qhauntz, \
a tabletop roleplaying game built on Fate Core. Qhauntz is a world where magic flows as Aether \
and a character's Status (Fyemyn, Ayrmyn, Tyrmyn, Fyrmyn, Ayxmyn or Nyhmyn) decides how they \
can touch it. Help the GM with vivid locations, memorable NPCs, plot hooks and rulings. Keep \
answers focused and usable at the table, and format them in markdown.";

/// Starter prompts offered on an empty transcript.
pub const PRESET_PROMPTS: [&str; 4] = [
    "Describe a bustling market in a Fyemyn city.",
    "Create a Tyrmyn engineer NPC with a problematic secret.",
    "A magical experiment goes wrong. What happens?",
    "Generate three interesting plot hooks for a new campaign.",
];

/// Generated text, one fragment at a time, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, SourceError>> + Send>>;

/// Failures from a text source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0}")]
    NotConfigured(String),

    /// The stream could not be opened.
    #[error("{0}")]
    Request(String),

    /// The stream broke after it was opened.
    #[error("{0}")]
    Stream(String),
}

impl From<claude::Error> for SourceError {
    fn from(e: claude::Error) -> Self {
        match e {
            claude::Error::NoApiKey | claude::Error::Config(_) => {
                SourceError::NotConfigured(e.to_string())
            }
            claude::Error::Stream(_) => SourceError::Stream(e.to_string()),
            other => SourceError::Request(other.to_string()),
        }
    }
}

/// Something that turns a prompt into a stream of text.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Open a reply stream for `prompt`. The stream is finite and can only
    /// be consumed once.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, SourceError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Generation settings for the assistant.
#[derive(Debug, Clone)]
pub struct GmConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens for a reply.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Replaces [`DEFAULT_GM_SYSTEM_PROMPT`].
    pub custom_system_prompt: Option<String>,
}

impl Default for GmConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: Some(0.9),
            custom_system_prompt: None,
        }
    }
}

impl GmConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_system_prompt = Some(prompt.into());
        self
    }

    /// The system prompt that will be sent.
    pub fn system_prompt(&self) -> &str {
        self.custom_system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_GM_SYSTEM_PROMPT)
    }
}

/// [`TextSource`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeSource {
    client: Claude,
    config: GmConfig,
}

impl ClaudeSource {
    pub fn new(client: Claude, config: GmConfig) -> Self {
        Self { client, config }
    }

    /// Build from `ANTHROPIC_API_KEY`.
    pub fn from_env(config: GmConfig) -> Result<Self, SourceError> {
        let client = Claude::from_env()?;
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &GmConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str) -> claude::Request {
        let mut request = claude::Request::new(vec![claude::Message::user(prompt)])
            .with_max_tokens(self.config.max_tokens)
            .with_system(self.config.system_prompt());

        if let Some(model) = &self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl TextSource for ClaudeSource {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, SourceError> {
        let text = self.client.stream_text(self.build_request(prompt)).await?;
        Ok(fragment_stream(text))
    }

    fn name(&self) -> &str {
        "claude"
    }
}

fn fragment_stream(text: claude::TextStream) -> FragmentStream {
    Box::pin(text.map(|fragment| fragment.map_err(SourceError::from)))
}

// ============================================================================
// Transcript
// ============================================================================

/// Identifies a message within one session. Later messages have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    /// True while fragments are still arriving.
    pub is_streaming: bool,
}

/// Where a session is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingFirstChunk,
    Streaming,
}

/// Progress notifications from [`ChatSession::send_message_with`].
///
/// Messages are borrowed from the transcript as it stands when the event
/// fires, so an in-flight reply shows `is_streaming == true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent<'a> {
    /// The user message was added and a reply was requested.
    Sent(&'a Message),
    /// The first fragment arrived and the reply was added to the transcript.
    ReplyStarted(&'a Message),
    /// `text` was appended to `reply`.
    Fragment { text: &'a str, reply: &'a Message },
    ReplyFinished(&'a Message),
    /// The reply was discarded. Carries the session's error string.
    Failed(&'a str),
}

impl ChatEvent<'_> {
    /// The session state at the moment the event is delivered.
    pub fn state(&self) -> ChatState {
        match self {
            ChatEvent::Sent(_) => ChatState::AwaitingFirstChunk,
            ChatEvent::ReplyStarted(_) | ChatEvent::Fragment { .. } => ChatState::Streaming,
            ChatEvent::ReplyFinished(_) | ChatEvent::Failed(_) => ChatState::Idle,
        }
    }
}

/// Errors from sending a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Error generating response: {0}")]
    Generation(#[source] SourceError),
}

/// A single conversation with a text source.
///
/// Sending takes `&mut self`, so at most one reply is in flight per session.
pub struct ChatSession<S> {
    source: S,
    messages: Vec<Message>,
    state: ChatState,
    error: Option<String>,
    next_id: u64,
}

impl<S: TextSource> ChatSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            messages: Vec::new(),
            state: ChatState::Idle,
            error: None,
            next_id: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The transcript, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state != ChatState::Idle
    }

    /// Error from the most recent send, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Send `prompt` and wait for the full reply.
    ///
    /// Returns the id of the model message on success.
    pub async fn send_message(&mut self, prompt: &str) -> Result<MessageId, ChatError> {
        self.send_message_with(prompt, |_| {}).await
    }

    /// Like [`ChatSession::send_message`], reporting progress to `observer`
    /// as it happens.
    ///
    /// The user message stays in the transcript whatever happens to the
    /// reply. A reply that fails, or whose future is dropped before it
    /// finishes, is removed.
    pub async fn send_message_with<F>(
        &mut self,
        prompt: &str,
        mut observer: F,
    ) -> Result<MessageId, ChatError>
    where
        F: FnMut(ChatEvent<'_>),
    {
        if prompt.trim().is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        self.error = None;
        let user_id = self.allocate_id();
        self.messages.push(Message {
            id: user_id,
            role: Role::User,
            text: prompt.to_string(),
            is_streaming: false,
        });
        self.state = ChatState::AwaitingFirstChunk;
        observer(ChatEvent::Sent(&self.messages[self.messages.len() - 1]));

        let reply_id = self.allocate_id();
        tracing::debug!(
            source = self.source.name(),
            user = %user_id,
            reply = %reply_id,
            "sending prompt"
        );

        let mut turn = Turn {
            messages: &mut self.messages,
            state: &mut self.state,
            reply: reply_id,
            started: false,
            finished: false,
        };

        match stream_reply(&self.source, &mut turn, prompt, &mut observer).await {
            Ok(()) => {
                turn.finish();
                drop(turn);
                if let Some(reply) = self.message(reply_id) {
                    observer(ChatEvent::ReplyFinished(reply));
                }
                Ok(reply_id)
            }
            Err(e) => {
                drop(turn);
                let err = ChatError::Generation(e);
                let text = err.to_string();
                tracing::warn!(error = %text, "reply failed");
                observer(ChatEvent::Failed(&text));
                self.error = Some(text);
                Err(err)
            }
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<S> fmt::Debug for ChatSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("messages", &self.messages.len())
            .field("state", &self.state)
            .field("error", &self.error)
            .finish()
    }
}

async fn stream_reply<S, F>(
    source: &S,
    turn: &mut Turn<'_>,
    prompt: &str,
    observer: &mut F,
) -> Result<(), SourceError>
where
    S: TextSource,
    F: FnMut(ChatEvent<'_>),
{
    let mut fragments = source.stream(prompt).await?;

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if !turn.started {
            turn.start();
            if let Some(reply) = turn.reply() {
                observer(ChatEvent::ReplyStarted(reply));
            }
        }
        turn.append(&fragment);
        if let Some(reply) = turn.reply() {
            observer(ChatEvent::Fragment {
                text: &fragment,
                reply,
            });
        }
    }

    Ok(())
}

/// The reply being streamed into the transcript.
///
/// Unless [`Turn::finish`] runs, dropping it removes the partial reply and
/// puts the session back to idle.
struct Turn<'a> {
    messages: &'a mut Vec<Message>,
    state: &'a mut ChatState,
    reply: MessageId,
    started: bool,
    finished: bool,
}

impl Turn<'_> {
    fn start(&mut self) {
        self.messages.push(Message {
            id: self.reply,
            role: Role::Model,
            text: String::new(),
            is_streaming: true,
        });
        self.started = true;
        *self.state = ChatState::Streaming;
    }

    fn reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == self.reply)
    }

    fn reply_mut(&mut self) -> Option<&mut Message> {
        let id = self.reply;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    fn append(&mut self, fragment: &str) {
        if let Some(reply) = self.reply_mut() {
            reply.text.push_str(fragment);
        }
    }

    /// Seal the reply. A stream that ended without text still leaves an
    /// empty model message.
    fn finish(&mut self) {
        if !self.started {
            self.start();
        }
        if let Some(reply) = self.reply_mut() {
            reply.is_streaming = false;
        }
        *self.state = ChatState::Idle;
        self.finished = true;
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let id = self.reply;
        self.messages.retain(|m| m.id != id);
        *self.state = ChatState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fragments_concatenate_in_order() {
        let mut chat = ChatSession::new(ScriptedSource::new(["Hello", ", ", "world"]));

        let reply = chat.send_message("Greet me").await.unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Greet me");
        assert_eq!(messages[1].id, reply);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].text, "Hello, world");
        assert!(!messages[1].is_streaming);
        assert_eq!(chat.state(), ChatState::Idle);
        assert!(chat.error().is_none());
    }

    #[tokio::test]
    async fn test_failure_mid_stream_discards_partial_reply() {
        let source =
            ScriptedSource::new(["Hello", ", ", "world"]).failing_after(1, "connection reset");
        let mut chat = ChatSession::new(source);

        let err = chat.send_message("Greet me").await.unwrap_err();

        assert_eq!(
            err,
            ChatError::Generation(SourceError::Stream("connection reset".to_string()))
        );
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, Role::User);
        assert_eq!(
            chat.error(),
            Some("Error generating response: connection reset")
        );
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_failure_on_open_keeps_user_message() {
        let source = ScriptedSource::new(["never"]).failing_on_open("service unavailable");
        let mut chat = ChatSession::new(source);

        assert!(chat.send_message("Anyone there?").await.is_err());
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].text, "Anyone there?");
        assert_eq!(
            chat.error(),
            Some("Error generating response: service unavailable")
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_changes_nothing() {
        let source = ScriptedSource::new(["unused"]);
        let mut chat = ChatSession::new(source);

        assert_eq!(chat.send_message("  \n").await, Err(ChatError::EmptyPrompt));
        assert!(chat.messages().is_empty());
        assert!(chat.source().prompts().is_empty());
    }

    #[tokio::test]
    async fn test_clear_error() {
        let mut chat = ChatSession::new(ScriptedSource::new(["ok"]).failing_after(0, "boom"));
        chat.send_message("first").await.unwrap_err();
        assert!(chat.error().is_some());

        chat.clear_error();
        assert!(chat.error().is_none());
    }

    #[tokio::test]
    async fn test_ids_increase_across_turns() {
        let mut chat = ChatSession::new(ScriptedSource::new(["a"]));
        let first = chat.send_message("one").await.unwrap();
        let second = chat.send_message("two").await.unwrap();

        assert!(second > first);
        let ids: Vec<_> = chat.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(chat.source().prompts(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_observer_sees_events_in_order() {
        let mut chat = ChatSession::new(ScriptedSource::new(["The ", "market ", "hums."]));
        let mut seen = Vec::new();

        let reply = chat
            .send_message_with(PRESET_PROMPTS[0], |event| {
                seen.push(match event {
                    ChatEvent::Sent(_) => "sent".to_string(),
                    ChatEvent::ReplyStarted(_) => "start".to_string(),
                    ChatEvent::Fragment { text, .. } => text.to_string(),
                    ChatEvent::ReplyFinished(_) => "end".to_string(),
                    ChatEvent::Failed(e) => format!("failed: {e}"),
                })
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["sent", "start", "The ", "market ", "hums.", "end"]);
        assert_eq!(
            chat.message(reply).map(|m| m.text.as_str()),
            Some("The market hums.")
        );
    }

    #[tokio::test]
    async fn test_observer_sees_reply_while_streaming() {
        let mut chat = ChatSession::new(ScriptedSource::new(["Glass", "wind"]));
        let mut seen = Vec::new();

        chat.send_message_with("Name an affinity", |event| {
            let reply = match event {
                ChatEvent::Sent(message) => {
                    assert_eq!(message.role, Role::User);
                    None
                }
                ChatEvent::ReplyStarted(reply)
                | ChatEvent::Fragment { reply, .. }
                | ChatEvent::ReplyFinished(reply) => Some((reply.text.clone(), reply.is_streaming)),
                ChatEvent::Failed(e) => panic!("unexpected failure: {e}"),
            };
            seen.push((event.state(), reply));
        })
        .await
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (ChatState::AwaitingFirstChunk, None),
                (ChatState::Streaming, Some((String::new(), true))),
                (ChatState::Streaming, Some(("Glass".to_string(), true))),
                (ChatState::Streaming, Some(("Glasswind".to_string(), true))),
                (ChatState::Idle, Some(("Glasswind".to_string(), false))),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_event_follows_discarded_reply() {
        let source = ScriptedSource::new(["Half", "way"]).failing_after(1, "reset");
        let mut chat = ChatSession::new(source);
        let mut states = Vec::new();

        chat.send_message_with("Go on", |event| states.push(event.state()))
            .await
            .unwrap_err();

        assert_eq!(
            states,
            vec![
                ChatState::AwaitingFirstChunk,
                ChatState::Streaming,
                ChatState::Streaming,
                ChatState::Idle,
            ]
        );
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn test_empty_stream_leaves_empty_reply() {
        let mut chat = ChatSession::new(ScriptedSource::new(Vec::<String>::new()));
        let reply = chat.send_message("silence").await.unwrap();

        let message = chat.message(reply).unwrap();
        assert_eq!(message.text, "");
        assert!(!message.is_streaming);
    }

    /// Replays service events through the same adapter [`ClaudeSource`] uses.
    struct ReplaySource(Vec<claude::StreamEvent>);

    #[async_trait]
    impl TextSource for ReplaySource {
        async fn stream(&self, _prompt: &str) -> Result<FragmentStream, SourceError> {
            let events = futures::stream::iter(self.0.clone().into_iter().map(Ok));
            Ok(fragment_stream(claude::text_fragments(events)))
        }

        fn name(&self) -> &str {
            "replay"
        }
    }

    fn opening_events(text: &str) -> Vec<claude::StreamEvent> {
        vec![
            claude::StreamEvent::MessageStart {
                id: "msg_1".to_string(),
                model: "claude-test".to_string(),
            },
            claude::StreamEvent::TextDelta {
                index: 0,
                text: text.to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_reply_without_message_stop_is_discarded() {
        let mut chat = ChatSession::new(ReplaySource(opening_events("Hel")));

        let err = chat.send_message("Greet me").await.unwrap_err();

        assert!(matches!(err, ChatError::Generation(SourceError::Stream(_))));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, Role::User);
        assert_eq!(
            chat.error(),
            Some("Error generating response: Stream interrupted: stream ended before message_stop")
        );
    }

    #[tokio::test]
    async fn test_reply_with_message_stop_is_kept() {
        let mut events = opening_events("Hello");
        events.push(claude::StreamEvent::MessageStop);
        let mut chat = ChatSession::new(ReplaySource(events));

        let reply = chat.send_message("Greet me").await.unwrap();

        assert_eq!(chat.message(reply).map(|m| m.text.as_str()), Some("Hello"));
        assert!(chat.error().is_none());
    }

    struct StallingSource;

    #[async_trait]
    impl TextSource for StallingSource {
        async fn stream(&self, _prompt: &str) -> Result<FragmentStream, SourceError> {
            let head = futures::stream::iter(vec![Ok("Once upon".to_string())]);
            Ok(Box::pin(head.chain(futures::stream::pending())))
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_send_removes_partial_reply() {
        let mut chat = ChatSession::new(StallingSource);

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), chat.send_message("Tell a story")).await;

        assert!(outcome.is_err());
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, Role::User);
        assert_eq!(chat.state(), ChatState::Idle);
    }

    #[test]
    fn test_config_defaults_and_builders() {
        let config = GmConfig::default();
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.temperature, Some(0.9));
        assert_eq!(config.system_prompt(), DEFAULT_GM_SYSTEM_PROMPT);

        let config = config
            .with_model("claude-haiku")
            .with_temperature(1.7)
            .with_system_prompt("Be brief.");
        assert_eq!(config.model.as_deref(), Some("claude-haiku"));
        assert_eq!(config.temperature, Some(1.0));
        assert_eq!(config.system_prompt(), "Be brief.");
    }

    #[test]
    fn test_claude_errors_map_to_source_errors() {
        assert!(matches!(
            SourceError::from(claude::Error::NoApiKey),
            SourceError::NotConfigured(_)
        ));
        assert_eq!(
            SourceError::from(claude::Error::Stream("overloaded".into())),
            SourceError::Stream("Stream interrupted: overloaded".into())
        );
        assert!(matches!(
            SourceError::from(claude::Error::Network("dns".into())),
            SourceError::Request(_)
        ));
    }

    #[test]
    fn test_claude_request_uses_config() {
        let source = ClaudeSource::new(
            Claude::new("test-key"),
            GmConfig::default().with_model("claude-test").with_max_tokens(512),
        );
        let request = source.build_request("Describe a rune golem.");

        assert_eq!(request.model.as_deref(), Some("claude-test"));
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.system.as_deref(), Some(DEFAULT_GM_SYSTEM_PROMPT));
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "Describe a rune golem.");
    }
}
