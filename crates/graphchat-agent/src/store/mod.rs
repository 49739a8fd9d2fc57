//! Graph database access.

pub mod neo4j;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GraphStoreError;

/// One result row: column name → value.
pub type Record = Map<String, Value>;

/// A read-only view of the graph database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Human/model-readable description of labels, relationship types and
    /// properties.
    async fn schema(&self) -> Result<String, GraphStoreError>;

    /// Execute `query` in read mode, returning at most `row_limit` records.
    async fn run_read(&self, query: &str, row_limit: usize) -> Result<Vec<Record>, GraphStoreError>;
}
