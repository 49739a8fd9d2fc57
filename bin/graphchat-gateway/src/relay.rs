//! Relays the retrieval tier's chunk stream to a client and records the turn.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use graphchat_types::{ChatMessage, DatabaseChatRequest, StreamChunk};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::conversation::ConversationStore;
use crate::upstream::UpstreamError;

/// Frames buffered between the relay task and the HTTP response.
const RELAY_BUFFER: usize = 32;

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, UpstreamError>>;

/// Source of an answer stream for one question.
#[async_trait]
pub trait ChunkProducer: Send + Sync {
    /// Dispatch `request`; resolves once the producer has accepted it.
    async fn open(&self, request: DatabaseChatRequest) -> Result<ChunkStream, UpstreamError>;
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The producer sent its terminal chunk without an error.
    Completed,
    /// The producer could not be opened, failed mid-stream, or sent a
    /// terminal error chunk.
    Failed,
    /// The producer ended without a terminal chunk.
    EndedEarly,
    /// The client went away.
    Disconnected,
}

#[derive(Clone)]
pub struct StreamRelay {
    producer: Arc<dyn ChunkProducer>,
    conversations: Arc<ConversationStore>,
}

impl StreamRelay {
    pub fn new(producer: Arc<dyn ChunkProducer>, conversations: Arc<ConversationStore>) -> Self {
        Self {
            producer,
            conversations,
        }
    }

    /// Relay the answer to `question` on a background task.
    ///
    /// The returned stream ends with exactly one chunk with `done == true`.
    /// Dropping it stops the relay and releases the upstream connection.
    pub fn relay(&self, conversation_id: String, question: ChatMessage) -> ReceiverStream<StreamChunk> {
        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let relay = self.clone();
        tokio::spawn(async move {
            relay.forward(&conversation_id, question, &tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Relay into `tx` until the answer completes or either side goes away.
    ///
    /// History is read before dispatch; the question is recorded once the
    /// producer accepted it, the answer once the stream ended.
    pub async fn forward(
        &self,
        conversation_id: &str,
        mut question: ChatMessage,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> RelayOutcome {
        if question.timestamp.is_none() {
            question.timestamp = Some(Utc::now());
        }
        let request = DatabaseChatRequest {
            query: question.clone(),
            history: self.conversations.history(conversation_id),
        };

        let opened = tokio::select! {
            _ = tx.closed() => {
                info!(%conversation_id, "client disconnected before the answer started");
                return RelayOutcome::Disconnected;
            }
            opened = self.producer.open(request) => opened,
        };
        let mut upstream = match opened {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(%conversation_id, error = %e, "retrieval request failed");
                let _ = tx.send(StreamChunk::error(e.client_message())).await;
                return RelayOutcome::Failed;
            }
        };
        self.conversations.append(conversation_id, question);

        let mut answer = String::new();
        let outcome = loop {
            let next = tokio::select! {
                _ = tx.closed() => break RelayOutcome::Disconnected,
                next = upstream.next() => next,
            };
            match next {
                Some(Ok(chunk)) if chunk.done => {
                    let outcome = if chunk.is_error() {
                        RelayOutcome::Failed
                    } else {
                        RelayOutcome::Completed
                    };
                    let _ = tx.send(chunk).await;
                    break outcome;
                }
                Some(Ok(chunk)) => {
                    answer.push_str(&chunk.content);
                    if tx.send(chunk).await.is_err() {
                        break RelayOutcome::Disconnected;
                    }
                }
                Some(Err(e)) => {
                    warn!(%conversation_id, error = %e, "retrieval stream failed");
                    let _ = tx.send(StreamChunk::error(e.client_message())).await;
                    break RelayOutcome::Failed;
                }
                None => {
                    warn!(%conversation_id, "retrieval stream ended without a terminal frame");
                    let _ = tx.send(StreamChunk::done()).await;
                    break RelayOutcome::EndedEarly;
                }
            }
        };
        drop(upstream);

        self.commit(conversation_id, answer, outcome);
        outcome
    }

    fn commit(&self, conversation_id: &str, answer: String, outcome: RelayOutcome) {
        if outcome != RelayOutcome::Completed && answer.is_empty() {
            debug!(%conversation_id, ?outcome, "no answer to record");
            return;
        }
        if outcome != RelayOutcome::Completed {
            info!(
                %conversation_id,
                ?outcome,
                chars = answer.chars().count(),
                "recording partial answer"
            );
        }
        self.conversations.append(
            conversation_id,
            ChatMessage::assistant(answer).with_timestamp(Utc::now()),
        );
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
