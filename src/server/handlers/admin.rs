use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.stats().await)
}

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.get_status().await)
}

pub async fn start_scheduler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.scheduler.start().await;
    let status = state.scheduler.get_status().await;
    Json(json!({
        "message": "scheduler start requested",
        "is_running": status.is_running,
    }))
}

pub async fn stop_scheduler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.scheduler.stop().await;
    Json(json!({
        "message": "scheduler stopped",
        "is_running": false,
    }))
}

pub async fn collection_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.collector.status().await;
    let run = state.collection_runs.snapshot().await;
    Json(json!({
        "total_entities": status.total_entities,
        "sources": status.sources,
        "last_collection": status.last_collection,
        "manual_run": run,
    }))
}

/// Kick off a full collect-and-index pass in the background. The run is
/// observable through the collection status endpoint; a second run while
/// one is in flight is rejected rather than silently duplicated.
pub async fn run_collection(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.collection_runs.try_begin().await {
        return Err(ApiError::Conflict(
            "a collection run is already in progress".to_string(),
        ));
    }

    let collector = state.collector.clone();
    let indexer = state.indexer.clone();
    let runs = state.collection_runs.clone();

    tokio::spawn(async move {
        let entities = collector.collect_all().await;
        if entities.is_empty() {
            tracing::warn!("manual collection produced no entities");
            runs.finish_ok(0).await;
            return;
        }

        match indexer.index_batch(entities).await {
            Ok(report) => {
                tracing::info!(indexed = report.indexed, "manual collection finished");
                runs.finish_ok(report.indexed).await;
            }
            Err(e) => {
                tracing::error!("manual collection failed: {}", e);
                runs.finish_err(&e.to_string()).await;
            }
        }
    });

    Ok(Json(json!({
        "message": "data collection started in background",
        "status": "running",
    })))
}

/// Targeted background refresh of a single source.
pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .collector
        .source_ids()
        .iter()
        .any(|id| id == &source_id)
    {
        return Err(ApiError::NotFound(format!("unknown source: {source_id}")));
    }

    if !state.collection_runs.try_begin().await {
        return Err(ApiError::Conflict(
            "a collection run is already in progress".to_string(),
        ));
    }

    let collector = state.collector.clone();
    let indexer = state.indexer.clone();
    let runs = state.collection_runs.clone();
    let source = source_id.clone();

    tokio::spawn(async move {
        let entities = match collector.collect_source(&source).await {
            Ok(entities) => entities,
            Err(e) => {
                tracing::error!(source = %source, "refresh failed: {}", e);
                runs.finish_err(&e.to_string()).await;
                return;
            }
        };

        match indexer.index_batch(entities).await {
            Ok(report) => runs.finish_ok(report.indexed).await,
            Err(e) => {
                tracing::error!(source = %source, "refresh indexing failed: {}", e);
                runs.finish_err(&e.to_string()).await;
            }
        }
    });

    Ok(Json(json!({
        "message": format!("update of {source_id} started in background"),
        "source": source_id,
        "status": "running",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResetParams {
    pub confirm: Option<String>,
}

/// Confirmation phrase required before the index can be dropped.
const RESET_CONFIRMATION: &str = "financial-entities";

pub async fn reset_collection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResetParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.confirm.as_deref() != Some(RESET_CONFIRMATION) {
        return Err(ApiError::BadRequest(format!(
            "reset requires confirm={RESET_CONFIRMATION}"
        )));
    }

    state.store.reset().await?;

    Ok(Json(json!({
        "message": "collection has been reset",
        "status": "empty",
    })))
}
