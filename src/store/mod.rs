//! Vector store abstraction.
//!
//! `VectorBackend` is the storage trait; `SqliteVectorStore` is the default
//! implementation. `VectorStore` is the facade the rest of the crate talks
//! to: it owns the degradation policy. A failing backend produces an
//! empty/false result and a logged error, never a propagated fault, except
//! for the destructive `reset`.

mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::errors::ApiError;
use crate::entity::{EntityMetadata, EntityType};

pub use sqlite::SqliteVectorStore;

/// One persisted record: entity (or entity chunk) id, document text, the
/// metadata projection, and the embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub metadata: EntityMetadata,
    pub embedding: Vec<f32>,
}

/// A similarity-query candidate, ranked by ascending distance.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: EntityMetadata,
    /// Cosine distance, `1 - cos_sim`, in `[0, 2]`.
    pub distance: f32,
}

/// Exact-match conjunction over the indexed metadata fields. At most one
/// equality constraint per field; anything else is unrepresentable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    country: Option<String>,
    entity_type: Option<EntityType>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.trim().to_uppercase());
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type
    }

    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.entity_type.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub name: String,
    pub count: usize,
    pub metadata: serde_json::Value,
}

/// Abstract storage backend for the vector index.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Insert or overwrite in place, keyed by record id. Atomic per id.
    async fn upsert(&self, record: VectorRecord) -> Result<(), ApiError>;

    /// Upsert many records in one transaction.
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<(), ApiError>;

    /// At most `limit` candidates ordered by ascending distance. The filter
    /// restricts candidates before ranking.
    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<QueryHit>, ApiError>;

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>, ApiError>;

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError>;

    /// Drop and recreate the store. Destructive.
    async fn reset(&self) -> Result<(), ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;
}

/// The one component allowed to touch the persisted index.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    collection: String,
    dimension: usize,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn VectorBackend>, collection: &str, dimension: usize) -> Self {
        Self {
            backend,
            collection: collection.to_string(),
            dimension,
        }
    }

    /// Insert-or-overwrite under the record id. Returns whether the write
    /// landed; a backend failure is logged and reported as `false`.
    pub async fn upsert_or_insert(&self, record: VectorRecord) -> bool {
        match self.backend.upsert(record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("vector store upsert failed: {}", e);
                false
            }
        }
    }

    pub async fn upsert_batch(&self, records: Vec<VectorRecord>) -> bool {
        let count = records.len();
        match self.backend.upsert_batch(records).await {
            Ok(()) => {
                tracing::info!(count, "indexed records upserted");
                true
            }
            Err(e) => {
                tracing::error!("vector store batch upsert failed: {}", e);
                false
            }
        }
    }

    /// Filtered similarity query; degrades to an empty result on backend
    /// failure.
    pub async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &RecordFilter,
    ) -> Vec<QueryHit> {
        match self.backend.query(embedding, limit, filter).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("vector store query failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        match self.backend.get(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("vector store lookup failed: {}", e);
                None
            }
        }
    }

    pub async fn delete(&self, ids: &[String]) -> bool {
        match self.backend.delete(ids).await {
            Ok(deleted) => {
                tracing::info!(deleted, "records deleted");
                true
            }
            Err(e) => {
                tracing::error!("vector store delete failed: {}", e);
                false
            }
        }
    }

    /// Destructive full reset. Unlike the read paths this surfaces hard
    /// failure; the API boundary gates it behind a scoped confirmation.
    pub async fn reset(&self) -> Result<(), ApiError> {
        self.backend.reset().await?;
        tracing::warn!(collection = %self.collection, "vector store has been reset");
        Ok(())
    }

    pub async fn stats(&self) -> StoreStats {
        let count = match self.backend.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("vector store count failed: {}", e);
                0
            }
        };

        StoreStats {
            name: self.collection.clone(),
            count,
            metadata: json!({
                "dimension": self.dimension,
                "metric": "cosine",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableBackend;

    #[async_trait]
    impl VectorBackend for UnreachableBackend {
        async fn upsert(&self, _record: VectorRecord) -> Result<(), ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn upsert_batch(&self, _records: Vec<VectorRecord>) -> Result<(), ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn query(
            &self,
            _embedding: &[f32],
            _limit: usize,
            _filter: &RecordFilter,
        ) -> Result<Vec<QueryHit>, ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn get(&self, _id: &str) -> Result<Option<VectorRecord>, ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn delete(&self, _ids: &[String]) -> Result<usize, ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn reset(&self) -> Result<(), ApiError> {
            Err(ApiError::ServiceUnavailable)
        }

        async fn count(&self) -> Result<usize, ApiError> {
            Err(ApiError::ServiceUnavailable)
        }
    }

    fn record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            document: "doc".to_string(),
            metadata: EntityMetadata {
                name: "X".to_string(),
                entity_type: EntityType::Bank,
                country: "VE".to_string(),
                api_available: false,
                url: String::new(),
            },
            embedding: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn backend_failures_degrade_instead_of_propagating() {
        let store = VectorStore::new(Arc::new(UnreachableBackend), "financial_entities", 2);

        assert!(!store.upsert_or_insert(record("a")).await);
        assert!(store.query(&[1.0, 0.0], 5, &RecordFilter::new()).await.is_empty());
        assert!(store.get("a").await.is_none());
        assert!(!store.delete(&["a".to_string()]).await);
        assert_eq!(store.stats().await.count, 0);
        // reset is the exception: destructive operations surface hard failure
        assert!(store.reset().await.is_err());
    }

    #[test]
    fn filter_normalizes_country_case() {
        let filter = RecordFilter::new().with_country("ve");
        assert_eq!(filter.country(), Some("VE"));
        assert!(!filter.is_empty());
        assert!(RecordFilter::new().is_empty());
    }
}
