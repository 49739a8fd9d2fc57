//! OpenAI-compatible chat-completions client built on `async-openai`.
//!
//! Works against OpenAI itself, Azure OpenAI deployments (set `api_version`;
//! `base_url` is then the resource endpoint and `model` the deployment id) and
//! local servers exposing the same API.

use std::time::Duration;

use async_openai::config::{AzureConfig, OpenAIConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseMessage, ChatCompletionResponseStream, ChatCompletionTool,
    ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    CreateChatCompletionStreamResponse, FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use tracing::debug;

use super::{LanguageModel, ModelTurn, TokenStream, TranscriptMessage};
use crate::error::ModelError;
use crate::tool::{AgentToolCall, ToolDescriptor};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// e.g. `https://api.openai.com/v1`, or `https://<resource>.openai.azure.com`
    /// for Azure.
    pub base_url: String,
    pub api_key: String,
    /// Model name, or the deployment id on Azure.
    pub model: String,
    /// Azure `api-version`; switches to Azure addressing and authentication.
    pub api_version: Option<String>,
    /// Deadline for a completion and for each streamed delta, so a streamed
    /// answer may run longer while tokens keep arriving.
    pub timeout: Duration,
}

enum Backend {
    OpenAi(Client<OpenAIConfig>),
    Azure(Client<AzureConfig>),
}

impl Backend {
    async fn create(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, OpenAIError> {
        match self {
            Backend::OpenAi(client) => client.chat().create(request).await,
            Backend::Azure(client) => client.chat().create(request).await,
        }
    }

    async fn create_stream(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatCompletionResponseStream, OpenAIError> {
        match self {
            Backend::OpenAi(client) => client.chat().create_stream(request).await,
            Backend::Azure(client) => client.chat().create_stream(request).await,
        }
    }
}

pub struct OpenAiCompatModel {
    backend: Backend,
    config: OpenAiConfig,
}

impl std::fmt::Debug for OpenAiCompatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatModel")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("azure", &self.config.api_version.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
        if config.base_url.trim().is_empty() {
            return Err(ModelError::Rejected("language model base URL is empty".into()));
        }
        let base_url = config.base_url.trim_end_matches('/');
        let backend = match &config.api_version {
            Some(version) => Backend::Azure(Client::with_config(
                AzureConfig::new()
                    .with_api_base(base_url)
                    .with_api_key(config.api_key.as_str())
                    .with_deployment_id(config.model.as_str())
                    .with_api_version(version.as_str()),
            )),
            None => Backend::OpenAi(Client::with_config(
                OpenAIConfig::new()
                    .with_api_base(base_url)
                    .with_api_key(config.api_key.as_str()),
            )),
        };
        Ok(Self { backend, config })
    }

    fn request(
        &self,
        transcript: &[TranscriptMessage],
        tools: &[ToolDescriptor],
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, ModelError> {
        let messages = transcript
            .iter()
            .map(request_message)
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.config.model.as_str()).messages(messages);
        if !tools.is_empty() {
            args.tools(
                tools
                    .iter()
                    .map(request_tool)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        if stream {
            args.stream(true);
        }
        args.build().map_err(model_error)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    async fn complete(
        &self,
        transcript: &[TranscriptMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelTurn, ModelError> {
        let request = self.request(transcript, tools, false)?;
        let response = tokio::time::timeout(self.config.timeout, self.backend.create(request))
            .await
            .map_err(|_| ModelError::Unavailable("completion timed out".into()))?
            .map_err(model_error)?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ModelError::Malformed("response has no choices".into()))?;
        let turn = model_turn(message)?;
        debug!(
            tool_calls = matches!(turn, ModelTurn::ToolCalls(_)),
            "model completion received"
        );
        Ok(turn)
    }

    async fn stream(&self, transcript: &[TranscriptMessage]) -> Result<TokenStream, ModelError> {
        let request = self.request(transcript, &[], true)?;
        let events =
            tokio::time::timeout(self.config.timeout, self.backend.create_stream(request))
                .await
                .map_err(|_| ModelError::Unavailable("completion timed out".into()))?
                .map_err(model_error)?;
        Ok(Box::pin(tokens(events, self.config.timeout)))
    }
}

fn model_error(e: OpenAIError) -> ModelError {
    match e {
        OpenAIError::Reqwest(e) => ModelError::Unavailable(e.to_string()),
        OpenAIError::StreamError(e) => ModelError::Unavailable(e),
        OpenAIError::ApiError(e) => ModelError::Rejected(e.message),
        OpenAIError::JSONDeserialize(e) => ModelError::Malformed(e.to_string()),
        other => ModelError::Rejected(other.to_string()),
    }
}

// ── Request / response mapping ───────────────────────────────────────────────

fn request_message(message: &TranscriptMessage) -> Result<ChatCompletionRequestMessage, ModelError> {
    let message = match message {
        TranscriptMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.as_str())
            .build()
            .map(ChatCompletionRequestMessage::System),
        TranscriptMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
            .content(content.as_str())
            .build()
            .map(ChatCompletionRequestMessage::User),
        TranscriptMessage::Assistant { content, tool_calls } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = content {
                args.content(content.as_str());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(tool_calls.iter().map(request_tool_call).collect::<Vec<_>>());
            }
            args.build().map(ChatCompletionRequestMessage::Assistant)
        }
        TranscriptMessage::Tool { call_id, content } => {
            ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(call_id.as_str())
                .content(content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::Tool)
        }
    };
    message.map_err(model_error)
}

fn request_tool_call(call: &AgentToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.tool.name().to_owned(),
            arguments: call.tool.arguments().to_string(),
        },
    }
}

fn request_tool(tool: &ToolDescriptor) -> Result<ChatCompletionTool, ModelError> {
    let function = FunctionObjectArgs::default()
        .name(tool.name)
        .description(tool.description)
        .parameters(tool.parameters.clone())
        .build()
        .map_err(model_error)?;
    ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(function)
        .build()
        .map_err(model_error)
}

fn model_turn(message: ChatCompletionResponseMessage) -> Result<ModelTurn, ModelError> {
    if let Some(calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
        let calls = calls
            .into_iter()
            .map(|call| AgentToolCall::parse(call.id, &call.function.name, &call.function.arguments))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ModelTurn::ToolCalls(calls));
    }

    match message.content {
        Some(text) if !text.trim().is_empty() => Ok(ModelTurn::Text(text)),
        _ => Err(ModelError::Malformed(
            "completion has neither text nor tool calls".into(),
        )),
    }
}

fn delta_text(event: CreateChatCompletionStreamResponse) -> Option<String> {
    event
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
}

/// Text deltas of a streamed completion.
///
/// Ends after the first error, including a delta that took longer than
/// `timeout` to arrive.
fn tokens<S>(events: S, timeout: Duration) -> impl Stream<Item = Result<String, ModelError>> + Send
where
    S: Stream<Item = Result<CreateChatCompletionStreamResponse, OpenAIError>> + Send + Unpin,
{
    stream::unfold(Some(events), move |state| async move {
        let mut events = state?;
        loop {
            match tokio::time::timeout(timeout, events.next()).await {
                Err(_) => {
                    let e = ModelError::Unavailable("no token within the deadline".into());
                    return Some((Err(e), None));
                }
                Ok(None) => return None,
                Ok(Some(Err(e))) => return Some((Err(model_error(e)), None)),
                Ok(Some(Ok(event))) => {
                    if let Some(text) = delta_text(event) {
                        return Some((Ok(text), Some(events)));
                    }
                }
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
