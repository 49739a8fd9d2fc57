use thiserror::Error;

/// Errors returned by a [`GraphStore`](crate::GraphStore).
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// The store could not be reached, refused our credentials, or timed out.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the query itself (syntax, unknown function, ...).
    #[error("query failed ({code}): {message}")]
    Query { code: String, message: String },

    /// The store answered with a body we could not interpret.
    #[error("unexpected graph store response: {0}")]
    Decode(String),
}

/// Errors returned by a [`LanguageModel`](crate::LanguageModel).
#[derive(Debug, Error)]
pub enum ModelError {
    /// Network failure, timeout, or throttling that outlasted the client's backoff.
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request (bad credentials, unknown model,
    /// invalid arguments).
    #[error("language model rejected the request: {0}")]
    Rejected(String),

    /// The model answered, but not in a shape we can use.
    #[error("malformed model output: {0}")]
    Malformed(String),
}

/// Terminal failures of an agent run.
///
/// Recoverable problems (bad queries, empty results, the iteration cap) never
/// surface here; they are fed back into the loop or end in a partial answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("query generation failed: {0}")]
    QueryGeneration(#[source] ModelError),

    #[error("language model failed: {0}")]
    Model(#[source] ModelError),

    /// The consumer of the answer stream went away.
    #[error("answer stream closed by consumer")]
    Cancelled,
}

impl AgentError {
    /// Message placed in the terminal error chunk sent to clients.
    pub fn client_message(&self) -> &'static str {
        match self {
            AgentError::StoreUnavailable(_) => "store unavailable",
            AgentError::QueryGeneration(_) => "query generation failed",
            AgentError::Model(_) => "language model unavailable",
            AgentError::Cancelled => "cancelled",
        }
    }
}
