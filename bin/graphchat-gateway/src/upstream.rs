//! HTTP client for the retrieval tier.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use graphchat_types::endpoints::{API_KEY_HEADER, DATABASE_CHAT_STREAM, DATABASE_PREFIX};
use graphchat_types::{DatabaseChatRequest, FrameDecoder, FrameError, StreamChunk};
use reqwest::Client;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::debug;

use crate::relay::{ChunkProducer, ChunkStream};

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, timeout before response headers.
    #[error("retrieval tier unreachable: {0}")]
    Unavailable(String),

    #[error("retrieval tier returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body failed mid-stream.
    #[error("retrieval stream interrupted: {0}")]
    Transport(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl UpstreamError {
    /// Message placed in the terminal error chunk sent to clients.
    pub fn client_message(&self) -> String {
        match self {
            UpstreamError::Unavailable(_) => "retrieval service unavailable".to_owned(),
            UpstreamError::Status { status, .. } => {
                format!("retrieval service returned HTTP {status}")
            }
            UpstreamError::Transport(_) => "retrieval stream interrupted".to_owned(),
            UpstreamError::Frame(_) => "invalid frame from retrieval service".to_owned(),
        }
    }
}

/// Opens `POST {base}/database/chat/stream` on the retrieval tier.
pub struct RetrievalClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for RetrievalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RetrievalClient {
    /// `timeout` bounds connecting and every read, so a long answer may
    /// stream for longer as long as frames keep arriving.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(concat!("graphchat-gateway/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{DATABASE_PREFIX}{DATABASE_CHAT_STREAM}",
                base_url.trim_end_matches('/')
            ),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChunkProducer for RetrievalClient {
    async fn open(&self, request: DatabaseChatRequest) -> Result<ChunkStream, UpstreamError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(endpoint = %self.endpoint, "retrieval stream opened");
        Ok(frames(Box::pin(response.bytes_stream())).boxed())
    }
}

struct FrameState<S> {
    bytes: S,
    decoder: FrameDecoder,
    pending: VecDeque<StreamChunk>,
    finished: bool,
}

/// Decode an SSE byte stream into [`StreamChunk`]s.
///
/// Ends after the first error.
pub fn frames<S, E>(bytes: S) -> impl Stream<Item = Result<StreamChunk, UpstreamError>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let state = FrameState {
        bytes,
        decoder: FrameDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                return Some((Ok(chunk), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(bytes)) => match st.decoder.push(&bytes) {
                    Ok(chunks) => st.pending.extend(chunks),
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e.into()), st));
                    }
                },
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(UpstreamError::Transport(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    match st.decoder.finish() {
                        Ok(Some(chunk)) => st.pending.push_back(chunk),
                        Ok(None) => {}
                        Err(e) => return Some((Err(e.into()), st)),
                    }
                }
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
