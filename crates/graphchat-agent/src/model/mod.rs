//! Language-model access.

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use graphchat_types::{ChatMessage, MessageRole};

use crate::error::ModelError;
use crate::tool::{AgentToolCall, ToolDescriptor};

/// Incremental text produced by [`LanguageModel::stream`].
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// A message of the running agent transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptMessage {
    System(String),
    User(String),
    /// An assistant turn: either text, tool calls, or both.
    Assistant {
        content: Option<String>,
        tool_calls: Vec<AgentToolCall>,
    },
    /// Output of a tool, answering the call with the same id.
    Tool { call_id: String, content: String },
}

impl From<&ChatMessage> for TranscriptMessage {
    fn from(message: &ChatMessage) -> Self {
        match message.role {
            MessageRole::User => TranscriptMessage::User(message.content.clone()),
            MessageRole::System => TranscriptMessage::System(message.content.clone()),
            MessageRole::Assistant => TranscriptMessage::Assistant {
                content: Some(message.content.clone()),
                tool_calls: Vec::new(),
            },
        }
    }
}

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    ToolCalls(Vec<AgentToolCall>),
    Text(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One non-streamed completion, offering `tools` to the model.
    async fn complete(
        &self,
        transcript: &[TranscriptMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelTurn, ModelError>;

    /// Stream a plain-text completion.
    async fn stream(&self, transcript: &[TranscriptMessage]) -> Result<TokenStream, ModelError>;

    /// A plain-text completion with no tools on offer.
    async fn generate(&self, transcript: &[TranscriptMessage]) -> Result<String, ModelError> {
        match self.complete(transcript, &[]).await? {
            ModelTurn::Text(text) => Ok(text),
            ModelTurn::ToolCalls(_) => Err(ModelError::Malformed(
                "tool call returned where text was expected".into(),
            )),
        }
    }
}
