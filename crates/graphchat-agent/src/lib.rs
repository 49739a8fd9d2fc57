//! Graph-query agent.
//!
//! [`GraphQueryAgent`] answers a natural-language question over a graph
//! database by letting a language model drive a bounded tool-use loop over
//! four operations: schema introspection, query generation, read-only query
//! execution and answer synthesis.  Only the synthesized answer is streamed.
//!
//! The graph database and the language model sit behind the [`GraphStore`]
//! and [`LanguageModel`] traits; [`Neo4jStore`] and [`OpenAiCompatModel`] are
//! the HTTP implementations used in production.

pub mod agent;
pub mod error;
pub mod guard;
pub mod model;
pub mod prompts;
pub mod schema;
pub mod store;
pub mod tool;

pub use agent::{AgentConfig, AgentRun, AgentState, GraphQueryAgent};
pub use error::{AgentError, GraphStoreError, ModelError};
pub use model::openai::{OpenAiCompatModel, OpenAiConfig};
pub use model::{LanguageModel, ModelTurn, TokenStream, TranscriptMessage};
pub use store::neo4j::{Neo4jConfig, Neo4jStore};
pub use store::{GraphStore, Record};
pub use tool::{AgentTool, AgentToolCall, ToolDescriptor};
