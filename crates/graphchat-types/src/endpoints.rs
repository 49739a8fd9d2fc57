//! Route paths and header names shared by both tiers.

/// Gateway: single-response chat.
pub const CHAT: &str = "/chat";
/// Gateway: streamed chat.
pub const CHAT_STREAM: &str = "/chat/stream";
/// Gateway: conversation history.
pub const CONVERSATION_MESSAGES: &str = "/conversations/{id}/messages";
/// Both tiers: liveness check.
pub const HEALTH: &str = "/health";

/// Retrieval tier route prefix.
pub const DATABASE_PREFIX: &str = "/database";
/// Retrieval tier: streamed answer, nested under [`DATABASE_PREFIX`].
pub const DATABASE_CHAT_STREAM: &str = "/chat/stream";

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header echoing the resolved conversation id on streamed responses.
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";
/// Header reporting admission capacity left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
