//! Data collection from external sources.
//!
//! Every source is an independent `EntitySource`; `Collector` fans out to
//! all of them concurrently and tolerates partial failure: one source
//! going down never cancels its siblings.

mod sources;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Serialize, Serializer};
use tokio::sync::RwLock;

use crate::core::errors::ApiError;
use crate::entity::RawEntity;

pub use sources::{build_sources, HttpDirectorySource, RemittanceSource, VenezuelaSource};

/// Outcome of the most recent fetch from one source. There is no partial
/// success within a source: it either returned its full batch or failed.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Success,
    Error(String),
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Success => f.write_str("success"),
            SourceStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl Serialize for SourceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One external data source. Independently callable, independently failing.
#[async_trait]
pub trait EntitySource: Send + Sync {
    fn source_id(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawEntity>, ApiError>;
}

#[derive(Debug, Default)]
struct CollectionState {
    total_entities: usize,
    sources: BTreeMap<String, SourceStatus>,
    last_collection: Option<DateTime<Utc>>,
}

/// Snapshot of collection state for callers. In-memory only: reset at
/// process start, mutated after each run, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub total_entities: usize,
    pub sources: BTreeMap<String, SourceStatus>,
    pub last_collection: Option<DateTime<Utc>>,
}

pub struct Collector {
    sources: Vec<Arc<dyn EntitySource>>,
    state: RwLock<CollectionState>,
}

impl Collector {
    pub fn new(sources: Vec<Arc<dyn EntitySource>>) -> Self {
        Self {
            sources,
            state: RwLock::new(CollectionState::default()),
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| s.source_id().to_string())
            .collect()
    }

    /// Fetch from every source concurrently. Each failure is captured in
    /// the per-source status; the aggregate is the union of the sources
    /// that returned a batch.
    pub async fn collect_all(&self) -> Vec<RawEntity> {
        let fetches = self.sources.iter().map(|source| {
            let source = source.clone();
            async move {
                let id = source.source_id().to_string();
                let result = source.fetch().await;
                (id, result)
            }
        });

        let results = join_all(fetches).await;

        let mut all_entities = Vec::new();
        let mut state = self.state.write().await;

        for (id, result) in results {
            match result {
                Ok(batch) => {
                    tracing::info!(source = %id, count = batch.len(), "source collected");
                    state.sources.insert(id, SourceStatus::Success);
                    all_entities.extend(batch);
                }
                Err(e) => {
                    tracing::error!(source = %id, "collection failed: {}", e);
                    state.sources.insert(id, SourceStatus::Error(e.to_string()));
                }
            }
        }

        state.total_entities = all_entities.len();
        state.last_collection = Some(Utc::now());
        tracing::info!(total = all_entities.len(), "collection run finished");

        all_entities
    }

    /// Targeted refresh of a single source.
    pub async fn collect_source(&self, source_id: &str) -> Result<Vec<RawEntity>, ApiError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.source_id() == source_id)
            .ok_or_else(|| ApiError::NotFound(format!("unknown source: {source_id}")))?;

        let result = source.fetch().await;
        let mut state = self.state.write().await;

        match result {
            Ok(batch) => {
                state
                    .sources
                    .insert(source_id.to_string(), SourceStatus::Success);
                state.last_collection = Some(Utc::now());
                Ok(batch)
            }
            Err(e) => {
                state
                    .sources
                    .insert(source_id.to_string(), SourceStatus::Error(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> CollectionStatus {
        let state = self.state.read().await;
        CollectionStatus {
            total_entities: state.total_entities,
            sources: state.sources.clone(),
            last_collection: state.last_collection,
        }
    }
}
