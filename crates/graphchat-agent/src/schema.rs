//! Process-lifetime cache of the graph schema description.

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::prompts::FALLBACK_SCHEMA;
use crate::store::GraphStore;

/// Caches the first successful [`GraphStore::schema`] answer.
///
/// Concurrent first callers wait on a single introspection.  A failed
/// introspection yields [`FALLBACK_SCHEMA`] and leaves the cache empty, so
/// the next request tries again.
#[derive(Debug, Default)]
pub struct SchemaCache {
    cell: OnceCell<String>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, store: &dyn GraphStore) -> String {
        if let Some(schema) = self.cell.get() {
            return schema.clone();
        }
        match self.cell.get_or_try_init(|| store.schema()).await {
            Ok(schema) => {
                debug!(bytes = schema.len(), "graph schema cached");
                schema.clone()
            }
            Err(e) => {
                warn!(error = %e, "schema introspection failed, using fallback schema");
                FALLBACK_SCHEMA.to_owned()
            }
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::GraphStoreError;
    use crate::store::Record;

    struct FlakyStore {
        answers: Mutex<VecDeque<Result<String, GraphStoreError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn schema(&self) -> Result<String, GraphStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GraphStoreError::Unavailable("exhausted".into())))
        }

        async fn run_read(&self, _: &str, _: usize) -> Result<Vec<Record>, GraphStoreError> {
            Ok(Vec::new())
        }
    }

    /// Answers after a delay, counting introspections.
    #[derive(Default)]
    struct SlowStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for SlowStore {
        async fn schema(&self) -> Result<String, GraphStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok("Node properties:\nActivity {name: STRING}\n".to_owned())
        }

        async fn run_read(&self, _: &str, _: usize) -> Result<Vec<Record>, GraphStoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_callers_share_one_introspection() {
        let store = SlowStore::default();
        let cache = SchemaCache::new();

        let schemas = futures::future::join_all((0..8).map(|_| cache.get(&store))).await;

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(schemas.iter().all(|s| s.starts_with("Node properties:")));
        assert!(cache.is_cached());
    }

    #[tokio::test]
    async fn fallback_is_not_cached() {
        let store = FlakyStore {
            answers: Mutex::new(VecDeque::from([
                Err(GraphStoreError::Unavailable("connection refused".into())),
                Ok("Node properties:\nActivity {name: STRING}\n".to_owned()),
            ])),
            calls: AtomicUsize::new(0),
        };
        let cache = SchemaCache::new();

        assert_eq!(cache.get(&store).await, FALLBACK_SCHEMA);
        assert!(!cache.is_cached());

        let schema = cache.get(&store).await;
        assert!(schema.starts_with("Node properties:"));
        assert!(cache.is_cached());

        assert_eq!(cache.get(&store).await, schema);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
