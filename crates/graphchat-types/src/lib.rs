//! Types shared by the graphchat gateway and retrieval tier.
//!
//! Both hops of the system speak the same wire format: JSON request bodies
//! built from [`ChatMessage`], and `text/event-stream` responses whose frames
//! carry a serialized [`StreamChunk`].

pub mod chat;
pub mod endpoints;
pub mod sse;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, DatabaseChatRequest, MessageRole, StreamChunk};
pub use sse::{FrameDecoder, FrameError, LineBuffer};
