use std::sync::Arc;

use crate::collector::{build_sources, Collector};
use crate::core::config::{AppPaths, Settings};
use crate::core::errors::ApiError;
use crate::entity::{Chunker, Normalizer};
use crate::ingest::{Indexer, RunTracker};
use crate::llm::{LlmService, OpenAiProvider};
use crate::rag::{Comparator, Retriever};
use crate::scheduler::{register_default_jobs, Scheduler};
use crate::store::{SqliteVectorStore, VectorStore};

/// Application state shared across routes and background jobs.
///
/// Every component is constructed exactly once here and passed by
/// reference; nothing in the crate reaches for hidden module-level
/// instances.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub store: VectorStore,
    pub collector: Arc<Collector>,
    pub indexer: Arc<Indexer>,
    pub retriever: Arc<Retriever>,
    pub comparator: Comparator,
    pub scheduler: Arc<Scheduler>,
    pub collection_runs: RunTracker,
}

impl AppState {
    pub async fn initialize() -> Result<Arc<Self>, ApiError> {
        let paths = Arc::new(AppPaths::new());
        let settings = Arc::new(Settings::load(&paths)?);

        let provider = Arc::new(OpenAiProvider::new(&settings.openai));
        let llm = LlmService::new(provider, settings.index.embed_batch_size);

        let backend = Arc::new(
            SqliteVectorStore::with_path(paths.db_path.clone(), settings.index.vector_dimension)
                .await?,
        );
        let store = VectorStore::new(
            backend,
            &settings.index.collection,
            settings.index.vector_dimension,
        );

        let normalizer = Normalizer::new(
            &settings.collection.countries_enabled,
            &settings.collection.entity_types_enabled,
        )?;
        let chunker = Chunker::new(settings.index.chunk_size, settings.index.chunk_overlap);

        let indexer = Arc::new(Indexer::new(
            normalizer,
            chunker,
            llm.clone(),
            store.clone(),
        ));

        let collector = Arc::new(Collector::new(build_sources(&settings.collection)?));

        let retriever = Arc::new(Retriever::new(
            store.clone(),
            llm.clone(),
            settings.search.min_similarity_score,
        ));
        let comparator = Comparator::new(retriever.clone());

        let scheduler = Arc::new(Scheduler::new(&settings.scheduler));
        register_default_jobs(
            &scheduler,
            collector.clone(),
            indexer.clone(),
            store.clone(),
            &settings.scheduler,
        )
        .await;

        Ok(Arc::new(AppState {
            paths,
            settings,
            store,
            collector,
            indexer,
            retriever,
            comparator,
            scheduler,
            collection_runs: RunTracker::new(),
        }))
    }
}
