//! SQLite-backed vector index.
//!
//! In-process store using SQLite for records and brute-force cosine
//! ranking for search. The metadata projection lives in dedicated columns
//! so filters run as SQL pre-filters, before any ranking happens.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;
use crate::entity::{EntityMetadata, EntityType};

use super::{QueryHit, RecordFilter, VectorBackend, VectorRecord};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
    dimension: usize,
}

impl SqliteVectorStore {
    pub async fn with_path(db_path: PathBuf, dimension: usize) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            db_path,
            dimension,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entity_records (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                entity_type TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                api_available INTEGER NOT NULL DEFAULT 0,
                url TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entity_records_country
             ON entity_records(country)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_entity_records_type
             ON entity_records(entity_type)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn check_dimension(&self, record: &VectorRecord) -> Result<(), ApiError> {
        if record.embedding.len() != self.dimension {
            return Err(ApiError::BadRequest(format!(
                "embedding for {} has dimension {}, expected {}",
                record.id,
                record.embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_metadata(row: &sqlx::sqlite::SqliteRow) -> Option<EntityMetadata> {
        let type_str: String = row.get("entity_type");
        let entity_type = match EntityType::from_str(&type_str) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!("skipping record with unreadable entity type: {}", type_str);
                return None;
            }
        };

        Some(EntityMetadata {
            name: row.get("name"),
            entity_type,
            country: row.get("country"),
            api_available: row.get::<i64, _>("api_available") != 0,
            url: row.get("url"),
        })
    }
}

#[async_trait]
impl VectorBackend for SqliteVectorStore {
    async fn upsert(&self, record: VectorRecord) -> Result<(), ApiError> {
        self.check_dimension(&record)?;
        let blob = Self::serialize_embedding(&record.embedding);

        sqlx::query(
            "INSERT OR REPLACE INTO entity_records
                (id, document, name, entity_type, country, api_available, url, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&record.id)
        .bind(&record.document)
        .bind(&record.metadata.name)
        .bind(record.metadata.entity_type.as_str())
        .bind(&record.metadata.country)
        .bind(record.metadata.api_available as i64)
        .bind(&record.metadata.url)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<(), ApiError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            self.check_dimension(record)?;
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for record in &records {
            let blob = Self::serialize_embedding(&record.embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO entity_records
                    (id, document, name, entity_type, country, api_available, url, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&record.id)
            .bind(&record.document)
            .bind(&record.metadata.name)
            .bind(record.metadata.entity_type.as_str())
            .bind(&record.metadata.country)
            .bind(record.metadata.api_available as i64)
            .bind(&record.metadata.url)
            .bind(blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<QueryHit>, ApiError> {
        let rows = match (filter.country(), filter.entity_type()) {
            (Some(country), Some(entity_type)) => {
                sqlx::query(
                    "SELECT id, document, name, entity_type, country, api_available, url, embedding
                     FROM entity_records
                     WHERE country = ?1 AND entity_type = ?2",
                )
                .bind(country)
                .bind(entity_type.as_str())
                .fetch_all(&self.pool)
                .await
            }
            (Some(country), None) => {
                sqlx::query(
                    "SELECT id, document, name, entity_type, country, api_available, url, embedding
                     FROM entity_records
                     WHERE country = ?1",
                )
                .bind(country)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(entity_type)) => {
                sqlx::query(
                    "SELECT id, document, name, entity_type, country, api_available, url, embedding
                     FROM entity_records
                     WHERE entity_type = ?1",
                )
                .bind(entity_type.as_str())
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query(
                    "SELECT id, document, name, entity_type, country, api_available, url, embedding
                     FROM entity_records",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(ApiError::internal)?;

        let mut scored: Vec<QueryHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let distance = 1.0 - Self::cosine_similarity(embedding, &stored);

                Some(QueryHit {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata: Self::row_metadata(row)?,
                    distance,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorRecord>, ApiError> {
        let row = sqlx::query(
            "SELECT id, document, name, entity_type, country, api_available, url, embedding
             FROM entity_records
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.as_ref().and_then(|row| {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            Some(VectorRecord {
                id: row.get("id"),
                document: row.get("document"),
                metadata: Self::row_metadata(row)?,
                embedding: Self::deserialize_embedding(&embedding_bytes),
            })
        }))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        let mut deleted = 0usize;

        for id in ids {
            let result = sqlx::query("DELETE FROM entity_records WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
            deleted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(deleted)
    }

    async fn reset(&self) -> Result<(), ApiError> {
        sqlx::query("DROP TABLE IF EXISTS entity_records")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        self.init_schema().await
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_records")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}
