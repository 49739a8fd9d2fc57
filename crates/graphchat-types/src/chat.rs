//! Chat request / response bodies and the streamed chunk frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ── Messages ─────────────────────────────────────────────────────────────────

/// Author of a [`ChatMessage`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single turn of a conversation.
///
/// Messages are values: they are cloned into and out of the conversation
/// store and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: MessageRole,
    /// The text of the message.
    pub content: String,
    /// When the message was created, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

// ── Gateway bodies ───────────────────────────────────────────────────────────

fn default_stream() -> bool {
    true
}

/// Request body for `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message.
    pub message: ChatMessage,
    /// Existing conversation to continue; a new id is minted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Informational only; the endpoint path decides the response shape.
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Response body for `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    /// The assistant's answer.
    pub message: ChatMessage,
    /// The conversation this turn was recorded under.
    pub conversation_id: String,
    /// Reserved for source attribution.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

// ── Retrieval tier body ──────────────────────────────────────────────────────

/// Request body the gateway sends to the retrieval tier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseChatRequest {
    /// The question being asked.
    pub query: ChatMessage,
    /// Prior turns of the conversation, oldest first.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

// ── Stream frame ─────────────────────────────────────────────────────────────

/// One frame of an incremental answer.
///
/// Exactly one frame of a stream has `done == true`; it terminates the stream.
/// A terminal frame with `error` set reports a failure that happened after
/// response headers were already committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamChunk {
    /// A non-terminal frame carrying answer text.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            done: false,
            error: None,
        }
    }

    /// The terminal frame of a successful stream.
    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
            error: None,
        }
    }

    /// The terminal frame of a failed stream.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            done: true,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
