//! PostgreSQL-backed durable tier.
//!
//! All collections share one table; each document is a JSONB body keyed by
//! `(collection, id)`:
//!
//! ```text
//! documents(collection TEXT, id TEXT, body JSONB, updated_at TIMESTAMPTZ)
//! ```
//!
//! Equality filters become a single `body @> {...}` containment test, and
//! `start_after` cursors compare `(body -> field, id)` row values so that
//! pagination stays stable under ties.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use crate::cache::durable::{DocumentQuery, DocumentStore, SortDirection, StoredDocument};
use crate::cache::error::StoreResult;
use crate::resilience::RetryPolicy;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (\
    collection TEXT NOT NULL, \
    id TEXT NOT NULL, \
    body JSONB NOT NULL, \
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
    PRIMARY KEY (collection, id))";

const UPSERT: &str = "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) \
    ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = now()";

const INCREMENT: &str = "INSERT INTO documents (collection, id, body) \
    VALUES ($1, $2, jsonb_build_object($3::text, $4::float8)) \
    ON CONFLICT (collection, id) DO UPDATE SET \
    body = jsonb_set(documents.body, ARRAY[$3::text], \
        to_jsonb(COALESCE((documents.body ->> $3::text)::float8, 0) + $4::float8)), \
    updated_at = now() \
    RETURNING (body ->> $3::text)::float8";

/// Pooled PostgreSQL document store.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgDocumentStore {
    pub async fn connect(url: &str, max_connections: u32, retry: RetryPolicy) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        tracing::info!(max_connections, "PostgreSQL pool connected");
        Ok(Self { pool, retry })
    }

    /// Create the documents table if it does not exist.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

/// Build the `SELECT` for a collection query.
fn select_query<'a>(collection: &'a str, query: &'a DocumentQuery) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
    qb.push_bind(collection);

    if !query.filters().is_empty() {
        qb.push(" AND body @> ");
        qb.push_bind(Json(query.filter_object()));
    }

    let ordering = query.ordering();
    let (cmp, dir) = match ordering {
        Some((_, SortDirection::Descending)) => ("<", "DESC"),
        _ => (">", "ASC"),
    };

    if let Some(cursor) = query.cursor() {
        match ordering {
            Some((field, _)) => {
                qb.push(" AND (body -> ");
                qb.push_bind(field);
                qb.push(", id) ");
                qb.push(cmp);
                qb.push(" (SELECT body -> ");
                qb.push_bind(field);
                qb.push(", id FROM documents WHERE collection = ");
                qb.push_bind(collection);
                qb.push(" AND id = ");
                qb.push_bind(cursor);
                qb.push(")");
            }
            None => {
                qb.push(" AND id > (SELECT id FROM documents WHERE collection = ");
                qb.push_bind(collection);
                qb.push(" AND id = ");
                qb.push_bind(cursor);
                qb.push(")");
            }
        }
    }

    match ordering {
        Some((field, _)) => {
            qb.push(" ORDER BY body -> ");
            qb.push_bind(field);
            qb.push(format!(" {dir}, id {dir}"));
        }
        None => {
            qb.push(" ORDER BY id ASC");
        }
    }

    if let Some(limit) = query.limit_value() {
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if query.offset_value() > 0 {
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(query.offset_value()).unwrap_or(i64::MAX));
    }

    qb
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.retry
            .run("postgres.get", |_| async move {
                let body = sqlx::query_scalar::<_, Json<Value>>(
                    "SELECT body FROM documents WHERE collection = $1 AND id = $2",
                )
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                Ok(body.map(|Json(body)| body))
            })
            .await
    }

    async fn set(&self, collection: &str, id: &str, document: &Value) -> StoreResult<()> {
        self.retry
            .run("postgres.set", |_| async move {
                sqlx::query(UPSERT)
                    .bind(collection)
                    .bind(id)
                    .bind(Json(document))
                    .execute(&self.pool)
                    .await?;
                Ok(())
            })
            .await
    }

    async fn update(&self, collection: &str, id: &str, fields: &Value) -> StoreResult<bool> {
        self.retry
            .run("postgres.update", |_| async move {
                let result = sqlx::query(
                    "UPDATE documents SET body = body || $3, updated_at = now() \
                     WHERE collection = $1 AND id = $2",
                )
                .bind(collection)
                .bind(id)
                .bind(Json(fields))
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected() > 0)
            })
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.retry
            .run("postgres.delete", |_| async move {
                let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                    .bind(collection)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            })
            .await
    }

    async fn query(&self, collection: &str, query: &DocumentQuery) -> StoreResult<Vec<StoredDocument>> {
        query.validate()?;
        self.retry
            .run("postgres.query", |_| async move {
                let rows = select_query(collection, query)
                    .build_query_as::<(String, Json<Value>)>()
                    .fetch_all(&self.pool)
                    .await?;
                Ok(rows
                    .into_iter()
                    .map(|(id, Json(body))| StoredDocument { id, body })
                    .collect())
            })
            .await
    }

    async fn batch_get(&self, collection: &str, ids: &[String]) -> StoreResult<Vec<Option<Value>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("postgres.batch_get", |_| async move {
                let rows = sqlx::query_as::<_, (String, Json<Value>)>(
                    "SELECT id, body FROM documents WHERE collection = $1 AND id = ANY($2)",
                )
                .bind(collection)
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;

                let mut found: HashMap<String, Value> =
                    rows.into_iter().map(|(id, Json(body))| (id, body)).collect();
                Ok(ids.iter().map(|id| found.remove(id)).collect())
            })
            .await
    }

    async fn batch_set(&self, collection: &str, documents: &[StoredDocument]) -> StoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.retry
            .run("postgres.batch_set", |_| async move {
                let mut tx = self.pool.begin().await?;
                for doc in documents {
                    sqlx::query(UPSERT)
                        .bind(collection)
                        .bind(&doc.id)
                        .bind(Json(&doc.body))
                        .execute(tx.as_mut())
                        .await?;
                }
                tx.commit().await?;
                Ok(())
            })
            .await
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, by: f64) -> StoreResult<f64> {
        self.retry
            .run("postgres.increment", |_| async move {
                let value = sqlx::query_scalar::<_, f64>(INCREMENT)
                    .bind(collection)
                    .bind(id)
                    .bind(field)
                    .bind(by)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(value)
            })
            .await
    }
}
