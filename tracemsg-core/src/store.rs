//! Trace store gateway: persistence seam for trace messages
//!
//! Provides a `TraceStore` trait with implementations for:
//! - **MongoDB**: the production backend (see [`crate::mongo`])
//! - **Memory**: in-process backend for tests and local runs

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;

use crate::codec;
use crate::config::StoreConfig;
use crate::error::TraceError;
use crate::models::{DateRange, TraceDocument, TraceMessage};
use crate::mongo::MongoTraceStore;

/// Finite sequence of range-query results, pulled on demand.
///
/// The MongoDB backend reads batches from a live driver cursor, and dropping
/// the stream releases it. The memory backend yields a snapshot taken when the
/// query was issued, so records inserted afterwards are not seen.
pub type TraceStream = BoxStream<'static, Result<TraceMessage, TraceError>>;

/// Abstraction over trace persistence backends.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Persist one record and return it with its store-assigned id.
    async fn insert(&self, record: TraceMessage) -> Result<TraceMessage, TraceError>;

    /// Stream every record with `range.from <= ts <= range.to`, oldest first.
    async fn find_by_timestamp_range(&self, range: &DateRange) -> Result<TraceStream, TraceError>;

    /// Backend version string, or an error if the backend is unreachable.
    async fn health_check(&self) -> Result<String, TraceError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Create the backend named by `config.backend`.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn TraceStore>, TraceError> {
    match config.backend.as_str() {
        "mongodb" => {
            let store = MongoTraceStore::connect(config).await?;
            store.ensure_indexes().await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryTraceStore::new())),
        other => Err(TraceError::UnknownBackend(other.to_string())),
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Keeps documents in the same shape MongoDB would, so reads go through the
/// codec and show the same precision and offset behaviour.
#[derive(Debug, Default)]
pub struct MemoryTraceStore {
    docs: RwLock<Vec<TraceDocument>>,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn insert(&self, record: TraceMessage) -> Result<TraceMessage, TraceError> {
        let mut doc = TraceDocument::from(&record);
        doc.id = Some(ObjectId::new());
        self.docs.write().await.push(doc.clone());
        Ok(TraceMessage::from(doc))
    }

    /// Matches are copied out under the read lock. The returned stream does not
    /// hold the lock, so inserts made while it is consumed are not yielded.
    async fn find_by_timestamp_range(&self, range: &DateRange) -> Result<TraceStream, TraceError> {
        let from = codec::to_store(&range.from);
        let to = codec::to_store(&range.to);

        let mut matched: Vec<TraceDocument> = self
            .docs
            .read()
            .await
            .iter()
            .filter(|doc| from <= doc.ts && doc.ts <= to)
            .cloned()
            .collect();
        // stable sort keeps insertion order for equal timestamps
        matched.sort_by_key(|doc| doc.ts);

        Ok(stream::iter(matched.into_iter().map(|doc| Ok(TraceMessage::from(doc)))).boxed())
    }

    async fn health_check(&self) -> Result<String, TraceError> {
        Ok("in-memory".to_string())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};
    use futures::TryStreamExt;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn record(session: &str, payload: &str, at: &str) -> TraceMessage {
        TraceMessage {
            id: None,
            session_id: session.to_string(),
            payload: payload.to_string(),
            ts: ts(at),
        }
    }

    async fn collect(store: &MemoryTraceStore, from: &str, to: &str) -> Vec<TraceMessage> {
        let range = DateRange::parse(from, to).unwrap();
        store
            .find_by_timestamp_range(&range)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = MemoryTraceStore::new();
        let a = store.insert(record("s1", "a", "2024-01-01T10:00:00Z")).await.unwrap();
        let b = store.insert(record("s1", "b", "2024-01-01T10:00:00Z")).await.unwrap();

        let a_id = a.id.expect("id assigned");
        let b_id = b.id.expect("id assigned");
        assert_eq!(a_id.len(), 24);
        assert_ne!(a_id, b_id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_sorted() {
        let store = MemoryTraceStore::new();
        store.insert(record("s1", "late", "2024-01-01T11:00:00Z")).await.unwrap();
        store.insert(record("s1", "early", "2024-01-01T09:00:00Z")).await.unwrap();
        store.insert(record("s2", "middle", "2024-01-01T10:00:00Z")).await.unwrap();
        store.insert(record("s2", "outside", "2024-01-01T11:00:00.001Z")).await.unwrap();

        let found = collect(&store, "2024-01-01T09:00:00Z", "2024-01-01T11:00:00Z").await;
        let payloads: Vec<&str> = found.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_range_with_no_matches_is_empty() {
        let store = MemoryTraceStore::new();
        store.insert(record("s1", "hello", "2024-01-01T10:00:00Z")).await.unwrap();

        let found = collect(&store, "2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z").await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_read_back_uses_local_offset() {
        let store = MemoryTraceStore::new();
        let stored = store
            .insert(record("s1", "hello", "2024-01-01T10:00:00+05:00"))
            .await
            .unwrap();
        assert_eq!(stored.ts, ts("2024-01-01T05:00:00Z"));
        assert_eq!(*stored.ts.offset(), codec::local_offset());
    }

    #[tokio::test]
    async fn test_range_stream_is_snapshot_at_query_time() {
        let store = MemoryTraceStore::new();
        store.insert(record("s1", "before", "2024-01-01T10:00:00Z")).await.unwrap();

        let range = DateRange::parse("2024-01-01T09:00:00Z", "2024-01-01T11:00:00Z").unwrap();
        let results = store.find_by_timestamp_range(&range).await.unwrap();

        // the open stream holds no lock, so this insert does not wait on it
        store.insert(record("s1", "after", "2024-01-01T10:30:00Z")).await.unwrap();

        let found: Vec<TraceMessage> = results.try_collect().await.unwrap();
        let payloads: Vec<&str> = found.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["before"]);
        assert_eq!(collect(&store, "2024-01-01T09:00:00Z", "2024-01-01T11:00:00Z").await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_store_rejects_unknown_backend() {
        let config = StoreConfig {
            backend: "cassandra".to_string(),
            ..StoreConfig::default()
        };
        let err = create_store(&config).await.err().expect("should fail");
        assert!(matches!(err, TraceError::UnknownBackend(name) if name == "cassandra"));
    }

    #[tokio::test]
    async fn test_create_store_memory_backend() {
        let config = StoreConfig {
            backend: "memory".to_string(),
            ..StoreConfig::default()
        };
        let store = create_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.health_check().await.unwrap(), "in-memory");
    }
}
