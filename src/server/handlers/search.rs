use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::entity::EntityType;
use crate::rag::{Answer, Comparison, SearchHit, StoredEntity};
use crate::state::AppState;
use crate::store::RecordFilter;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: Option<FilterParams>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
}

impl FilterParams {
    /// Build the closed filter type, rejecting unknown entity types at the
    /// boundary instead of passing free-form strings inward.
    pub fn to_filter(&self) -> Result<RecordFilter, ApiError> {
        let mut filter = RecordFilter::new();

        if let Some(country) = &self.country {
            if !country.trim().is_empty() {
                filter = filter.with_country(country);
            }
        }
        if let Some(type_str) = &self.entity_type {
            if !type_str.trim().is_empty() {
                let entity_type: EntityType = type_str
                    .parse()
                    .map_err(|e: String| ApiError::BadRequest(e))?;
                filter = filter.with_entity_type(entity_type);
            }
        }

        Ok(filter)
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub query: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let limit = request
        .limit
        .unwrap_or(state.settings.search.default_limit)
        .clamp(1, state.settings.search.max_limit);
    let filter = request.filters.unwrap_or_default().to_filter()?;

    let results = state.retriever.search(&query, limit, &filter).await?;

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        query,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub context_limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    #[serde(flatten)]
    pub answer: Answer,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let context_limit = request
        .context_limit
        .unwrap_or(state.settings.search.context_limit)
        .clamp(1, 20);

    let answer = state.retriever.ask(&question, context_limit).await?;

    Ok(Json(AskResponse { question, answer }))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub from_country: String,
    pub to_country: String,
    pub amount: f64,
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<Comparison>, ApiError> {
    let from = request.from_country.trim().to_uppercase();
    let to = request.to_country.trim().to_uppercase();
    if from.is_empty() || to.is_empty() {
        return Err(ApiError::BadRequest(
            "from_country and to_country are required".to_string(),
        ));
    }

    let comparison = state.comparator.compare(&from, &to, request.amount).await?;
    Ok(Json(comparison))
}

pub async fn get_entity_by_id(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<StoredEntity>, ApiError> {
    state
        .retriever
        .get_entity_by_id(&entity_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("entity {entity_id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub entities: Vec<SearchHit>,
    pub total: usize,
}

pub async fn get_entities_by_country(
    State(state): State<Arc<AppState>>,
    Path(country_code): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<EntityListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(20).clamp(1, state.settings.search.max_limit);
    let entities = state
        .retriever
        .get_entities_by_country(&country_code.to_uppercase(), limit)
        .await?;

    Ok(Json(EntityListResponse {
        total: entities.len(),
        entities,
    }))
}

pub async fn get_entities_by_type(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<EntityListResponse>, ApiError> {
    let entity_type: EntityType = entity_type
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;
    let limit = params.limit.unwrap_or(20).clamp(1, state.settings.search.max_limit);

    let entities = state
        .retriever
        .get_entities_by_type(entity_type, limit)
        .await?;

    Ok(Json(EntityListResponse {
        total: entities.len(),
        entities,
    }))
}

pub async fn get_similar_entities(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<EntityListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(5).clamp(1, 20);
    let entities = state.retriever.suggest_similar(&entity_id, limit).await?;

    Ok(Json(EntityListResponse {
        total: entities.len(),
        entities,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_params_reject_unknown_types() {
        let params = FilterParams {
            country: Some("ve".to_string()),
            entity_type: Some("fintech".to_string()),
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(filter.country(), Some("VE"));
        assert_eq!(filter.entity_type(), Some(EntityType::Fintech));

        let bad = FilterParams {
            country: None,
            entity_type: Some("hedge_fund".to_string()),
        };
        assert!(matches!(bad.to_filter(), Err(ApiError::BadRequest(_))));

        let empty = FilterParams::default();
        assert!(empty.to_filter().unwrap().is_empty());
    }
}
