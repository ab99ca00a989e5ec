use serde::Serialize;

use crate::core::errors::ApiError;
use crate::entity::{EntityMetadata, EntityType};
use crate::llm::LlmService;
use crate::store::{RecordFilter, VectorStore};

/// A search result that survived the similarity gate.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: EntityMetadata,
    pub similarity_score: f32,
}

/// Source attribution for one answer, drawn from record metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub country: String,
    pub similarity: f32,
}

/// A grounded answer with its sources and an aggregate confidence.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
}

/// A point lookup result (no embedding, no score).
#[derive(Debug, Clone, Serialize)]
pub struct StoredEntity {
    pub id: String,
    pub document: String,
    pub metadata: EntityMetadata,
}

const NO_INFORMATION_ANSWER: &str =
    "I couldn't find relevant information to answer your question.";

pub struct Retriever {
    store: VectorStore,
    llm: LlmService,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(store: VectorStore, llm: LlmService, min_similarity: f32) -> Self {
        Self {
            store,
            llm,
            min_similarity,
        }
    }

    /// Vector-similarity search with a hard minimum-score gate: callers
    /// never see below-threshold noise, even when it would fill out the
    /// requested limit.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let embedding = self.llm.embed_one(query).await?;
        let candidates = self.store.query(&embedding, limit, filter).await;

        let results: Vec<SearchHit> = candidates
            .into_iter()
            .filter_map(|hit| {
                let similarity = 1.0 - hit.distance;
                if similarity < self.min_similarity {
                    return None;
                }
                Some(SearchHit {
                    id: hit.id,
                    document: hit.document,
                    metadata: hit.metadata,
                    similarity_score: round3(similarity),
                })
            })
            .collect();

        tracing::info!(query, results = results.len(), "search finished");
        Ok(results)
    }

    /// Answer a question from retrieved context only. An empty retrieval is
    /// a defined terminal state, not an error: the caller gets a canned
    /// no-information answer with zero confidence.
    pub async fn ask(&self, question: &str, context_limit: usize) -> Result<Answer, ApiError> {
        let docs = self
            .search(question, context_limit, &RecordFilter::new())
            .await?;

        if docs.is_empty() {
            return Ok(Answer {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let context = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Source {}:\n{}", i + 1, doc.document))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = grounded_prompt(&context, question);
        let answer = self.llm.complete(&prompt).await?;

        let confidence = round3(
            docs.iter().map(|d| d.similarity_score).sum::<f32>() / docs.len() as f32,
        );

        let sources = docs
            .iter()
            .map(|doc| SourceRef {
                name: doc.metadata.name.clone(),
                entity_type: doc.metadata.entity_type,
                country: doc.metadata.country.clone(),
                similarity: doc.similarity_score,
            })
            .collect();

        Ok(Answer {
            answer,
            sources,
            confidence,
        })
    }

    pub async fn get_entity_by_id(&self, entity_id: &str) -> Option<StoredEntity> {
        self.store.get(entity_id).await.map(|record| StoredEntity {
            id: record.id,
            document: record.document,
            metadata: record.metadata,
        })
    }

    pub async fn get_entities_by_country(
        &self,
        country_code: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let query = format!("financial institutions in {country_code}");
        self.search(
            &query,
            limit,
            &RecordFilter::new().with_country(country_code),
        )
        .await
    }

    pub async fn get_entities_by_type(
        &self,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let query = format!("{entity_type} institutions");
        self.search(
            &query,
            limit,
            &RecordFilter::new().with_entity_type(entity_type),
        )
        .await
    }

    /// Nearest neighbors of an already-indexed entity, excluding itself
    /// (and its own chunks).
    pub async fn suggest_similar(
        &self,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let Some(entity) = self.get_entity_by_id(entity_id).await else {
            return Ok(Vec::new());
        };

        let base_id = entity_id.split("#chunk_").next().unwrap_or(entity_id);
        let mut similar = self
            .search(&entity.document, limit + 1, &RecordFilter::new())
            .await?;

        similar.retain(|hit| {
            hit.id != base_id && !hit.id.starts_with(&format!("{base_id}#"))
        });
        similar.truncate(limit);

        Ok(similar)
    }
}

fn grounded_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert assistant for financial institutions in the Americas.\n\
         Use the following pieces of context to answer the question at the end.\n\
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
         Always provide specific institution names, countries, and relevant details.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer in a clear, professional manner with specific details:"
    )
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}
