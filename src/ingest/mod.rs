//! Ingestion pipeline: raw entities in, indexed records out.
//!
//! The pipeline deduplicates, normalizes (dropping invalid records),
//! renders documents, chunks oversized ones, embeds, and upserts. A failed
//! embedding call fails the whole batch; a single invalid entity never
//! does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::core::errors::ApiError;
use crate::entity::{build_document, Chunker, EntityMetadata, Normalizer, RawEntity};
use crate::llm::LlmService;
use crate::store::{VectorRecord, VectorStore};

/// Counts for one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub received: usize,
    pub deduplicated: usize,
    pub dropped: usize,
    pub indexed: usize,
}

pub struct Indexer {
    normalizer: Normalizer,
    chunker: Chunker,
    llm: LlmService,
    store: VectorStore,
}

impl Indexer {
    pub fn new(normalizer: Normalizer, chunker: Chunker, llm: LlmService, store: VectorStore) -> Self {
        Self {
            normalizer,
            chunker,
            llm,
            store,
        }
    }

    /// Index a batch of raw entities, overwriting any records that already
    /// exist under the same derived id.
    pub async fn index_batch(&self, raw: Vec<RawEntity>) -> Result<IndexReport, ApiError> {
        let received = raw.len();
        let unique = self.normalizer.deduplicate(raw);
        let deduplicated = received - unique.len();

        let mut dropped = 0usize;
        let mut entities = Vec::with_capacity(unique.len());
        for record in &unique {
            match self.normalizer.normalize(record) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!(name = %record.name, "dropping invalid entity: {}", e);
                    dropped += 1;
                }
            }
        }

        let mut ids = Vec::new();
        let mut documents = Vec::new();
        let mut metadatas: Vec<EntityMetadata> = Vec::new();

        for entity in &entities {
            let text = build_document(entity);
            let chunks = self.chunker.split(&text);

            if chunks.len() == 1 {
                ids.push(entity.id.clone());
                documents.push(text);
                metadatas.push(entity.metadata());
            } else {
                for (i, chunk) in chunks.into_iter().enumerate() {
                    ids.push(format!("{}#chunk_{}", entity.id, i));
                    documents.push(chunk);
                    metadatas.push(entity.metadata());
                }
            }
        }

        let mut report = IndexReport {
            received,
            deduplicated,
            dropped,
            indexed: 0,
        };

        if ids.is_empty() {
            return Ok(report);
        }

        let embeddings = self.llm.embed(&documents).await?;

        let records: Vec<VectorRecord> = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(embeddings)
            .map(|(((id, document), metadata), embedding)| VectorRecord {
                id,
                document,
                metadata,
                embedding,
            })
            .collect();

        let total = records.len();
        if self.store.upsert_batch(records).await {
            report.indexed = total;
        }

        Ok(report)
    }

    /// Discovery variant: index only entities whose id is not yet present
    /// in the store.
    pub async fn index_new_only(&self, raw: Vec<RawEntity>) -> Result<IndexReport, ApiError> {
        let unique = self.normalizer.deduplicate(raw);

        let mut fresh = Vec::new();
        for record in unique {
            let id = self
                .normalizer
                .entity_id(&record.name, &record.country, &record.entity_type);
            // chunked entities are stored under suffixed ids only
            let exists = self.store.get(&id).await.is_some()
                || self.store.get(&format!("{id}#chunk_0")).await.is_some();
            if !exists {
                fresh.push(record);
            }
        }

        if fresh.is_empty() {
            tracing::info!("discovery found no new entities");
            return Ok(IndexReport::default());
        }

        self.index_batch(fresh).await
    }
}

/// Lifecycle of one observable manual collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSnapshot {
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub indexed: usize,
    pub error: Option<String>,
}

/// Status record for ad-hoc collection runs so callers can poll completion
/// and failure instead of firing an unobservable detached task. A single
/// slot: a second run is rejected while one is in flight.
#[derive(Clone, Default)]
pub struct RunTracker {
    inner: Arc<RwLock<RunSnapshot>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot. Returns false if a run is already in flight.
    pub async fn try_begin(&self) -> bool {
        let mut snapshot = self.inner.write().await;
        if snapshot.state == RunState::Running {
            return false;
        }

        *snapshot = RunSnapshot {
            state: RunState::Running,
            started_at: Some(Utc::now()),
            ..RunSnapshot::default()
        };
        true
    }

    pub async fn finish_ok(&self, indexed: usize) {
        let mut snapshot = self.inner.write().await;
        snapshot.state = RunState::Completed;
        snapshot.finished_at = Some(Utc::now());
        snapshot.indexed = indexed;
    }

    pub async fn finish_err(&self, error: &str) {
        let mut snapshot = self.inner.write().await;
        snapshot.state = RunState::Failed;
        snapshot.finished_at = Some(Utc::now());
        snapshot.error = Some(error.to_string());
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::entity::EntityType;
    use crate::llm::LlmProvider;
    use crate::store::SqliteVectorStore;

    /// Deterministic stand-in embedder: a fixed direction per keyword.
    struct KeywordEmbedder;

    fn keyword_embedding(text: &str) -> Vec<f32> {
        let t = text.to_lowercase();
        let mut v = vec![0.0f32; 4];
        if t.contains("central bank") || t.contains("banco central") {
            v[0] = 1.0;
        }
        if t.contains("remittance") {
            v[1] = 1.0;
        }
        if t.contains("trading") {
            v[2] = 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[3] = 1.0;
        }
        v
    }

    #[async_trait]
    impl LlmProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ApiError> {
            Ok("stub answer".to_string())
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|t| keyword_embedding(t)).collect())
        }
    }

    async fn test_indexer() -> (Indexer, VectorStore) {
        let tmp = std::env::temp_dir().join(format!(
            "ragsearch-ingest-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let backend = Arc::new(SqliteVectorStore::with_path(tmp, 4).await.unwrap());
        let store = VectorStore::new(backend, "financial_entities", 4);

        let countries: Vec<String> = ["US", "VE"].iter().map(|c| c.to_string()).collect();
        let types = vec![EntityType::Bank, EntityType::Fintech, EntityType::Exchange];
        let normalizer = Normalizer::new(&countries, &types).unwrap();

        let llm = LlmService::new(Arc::new(KeywordEmbedder), 2048);
        let indexer = Indexer::new(normalizer, Chunker::new(500, 50), llm, store.clone());
        (indexer, store)
    }

    fn raw(name: &str, entity_type: &str, country: &str, description: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            country: country.to_string(),
            description: description.to_string(),
            ..RawEntity::default()
        }
    }

    #[tokio::test]
    async fn batch_dedupes_drops_and_indexes() {
        let (indexer, store) = test_indexer().await;

        let report = indexer
            .index_batch(vec![
                raw("Remitly", "fintech", "US", "Digital remittance service"),
                raw("Remitly", "fintech", "US", "duplicate record"),
                raw("Mystery Broker", "broker", "US", "invalid type"),
                raw("Banco Central de Venezuela", "bank", "VE", "Central bank of Venezuela"),
            ])
            .await
            .unwrap();

        assert_eq!(report.received, 4);
        assert_eq!(report.deduplicated, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.indexed, 2);
        assert_eq!(store.stats().await.count, 2);
    }

    #[tokio::test]
    async fn reindexing_overwrites_in_place() {
        let (indexer, store) = test_indexer().await;

        indexer
            .index_batch(vec![raw("Remitly", "fintech", "US", "first version")])
            .await
            .unwrap();
        indexer
            .index_batch(vec![raw("Remitly", "fintech", "US", "second version")])
            .await
            .unwrap();

        assert_eq!(store.stats().await.count, 1);
        let hits = store
            .query(&keyword_embedding("second version"), 10, &Default::default())
            .await;
        assert!(hits[0].document.contains("second version"));
    }

    #[tokio::test]
    async fn oversized_documents_are_chunked_with_suffixed_ids() {
        let (indexer, store) = test_indexer().await;

        let description = "Remittance corridors across Latin America. ".repeat(20);
        indexer
            .index_batch(vec![raw("Western Union", "fintech", "US", &description)])
            .await
            .unwrap();

        assert!(store.stats().await.count > 1);
        let hits = store
            .query(&keyword_embedding("remittance"), 10, &Default::default())
            .await;
        assert!(hits.iter().all(|h| h.id.contains("#chunk_")));
        assert!(hits.iter().all(|h| h.metadata.name == "Western Union"));
    }

    #[tokio::test]
    async fn discovery_skips_entities_already_indexed() {
        let (indexer, store) = test_indexer().await;

        indexer
            .index_batch(vec![raw("Remitly", "fintech", "US", "remittance")])
            .await
            .unwrap();

        let report = indexer
            .index_new_only(vec![
                raw("Remitly", "fintech", "US", "remittance, changed text"),
                raw("Wise", "fintech", "US", "remittance transfers"),
            ])
            .await
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(store.stats().await.count, 2);

        // the existing record was not overwritten by discovery
        let hits = store
            .query(&keyword_embedding("remittance"), 10, &Default::default())
            .await;
        let remitly = hits.iter().find(|h| h.metadata.name == "Remitly").unwrap();
        assert!(!remitly.document.contains("changed text"));
    }

    #[tokio::test]
    async fn run_tracker_holds_a_single_slot() {
        let tracker = RunTracker::new();
        assert_eq!(tracker.snapshot().await.state, RunState::Idle);

        assert!(tracker.try_begin().await);
        assert!(!tracker.try_begin().await);
        assert_eq!(tracker.snapshot().await.state, RunState::Running);

        tracker.finish_ok(7).await;
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.state, RunState::Completed);
        assert_eq!(snapshot.indexed, 7);

        assert!(tracker.try_begin().await);
        tracker.finish_err("gateway down").await;
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.state, RunState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("gateway down"));
    }
}
