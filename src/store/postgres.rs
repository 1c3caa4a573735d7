//! PostgreSQL-backed document store.
//!
//! All collections share one `documents` table holding JSONB bodies keyed by
//! `(collection, id)`. The table is created on connect if missing.
//!
//! ## Atomicity
//!
//! | Operation | Mechanism |
//! |-----------|-----------|
//! | `increment` | single `UPDATE ... jsonb_set(...)` statement, guarded by `jsonb_typeof` |
//! | `update_one` | transaction with `SELECT ... FOR UPDATE` |
//! | `insert_one` / `delete_one` | single statement |
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `22P02` | `NonNumericField` | increment on a fractional number |
//! | `22003` | `NonNumericField` | increment overflows `bigint` |
//! | any other | `Database` | connectivity, constraint or query errors |

use super::{apply_set, Collection, DocumentStore, StoreError};
use crate::config::Config;
use crate::models::{DeleteResult, Document, DocumentId, InsertResult, UpdateResult, ID_FIELD};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id UUID NOT NULL,
        seq BIGSERIAL,
        body JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )
"#;

/// Postgres-backed document store.
///
/// Cloning is cheap; all clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Wrap an existing pool. Call [`PgDocumentStore::migrate`] before use.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url` and make sure the table exists.
    pub async fn connect(url: &str, config: &Config) -> Result<Self, StoreError> {
        info!(
            max_connections = config.database_max_connections,
            "Connecting to database..."
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.database_acquire_timeout)
            .connect(url)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;

        info!("Database connected successfully");
        Ok(store)
    }

    /// Create the documents table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_increment_error(field: &str, err: sqlx::Error) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());

    match code.as_deref() {
        Some("22P02" | "22003") => StoreError::NonNumericField {
            field: field.to_string(),
        },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    /// Check out a single connection, run `SELECT 1`, and hand it back.
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        drop(conn);

        debug!("Database ping succeeded");
        Ok(())
    }

    #[instrument(skip_all, fields(%collection), err)]
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(Json<Document>,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = $1 ORDER BY seq ASC")
                .bind(collection.name())
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(Json(body),)| body).collect())
    }

    #[instrument(skip_all, fields(%collection), err)]
    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<InsertResult, StoreError> {
        let id = DocumentId::new();
        document.insert(ID_FIELD.to_string(), serde_json::to_value(id)?);

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(id.as_uuid())
            .bind(Json(&document))
            .execute(&self.pool)
            .await?;

        Ok(InsertResult::new(id))
    }

    #[instrument(skip_all, fields(%collection, %id, upsert = upsert), err)]
    async fn update_one(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Json<Document>,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection.name())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let result = match current {
            Some((Json(mut body),)) => {
                let modified = apply_set(&mut body, fields);
                if modified {
                    sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
                        .bind(collection.name())
                        .bind(id.as_uuid())
                        .bind(Json(&body))
                        .execute(&mut *tx)
                        .await?;
                }
                UpdateResult::matched(modified)
            }
            None if upsert => {
                let mut body = Document::new();
                body.insert(ID_FIELD.to_string(), serde_json::to_value(id)?);
                apply_set(&mut body, fields);

                // A concurrent upsert of the same id merges instead of failing.
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id)
                    DO UPDATE SET body = documents.body || EXCLUDED.body
                    "#,
                )
                .bind(collection.name())
                .bind(id.as_uuid())
                .bind(Json(&body))
                .execute(&mut *tx)
                .await?;
                UpdateResult::upserted(*id)
            }
            None => UpdateResult::unmatched(),
        };

        tx.commit().await?;
        Ok(result)
    }

    #[instrument(skip_all, fields(%collection, %id), err)]
    async fn increment(
        &self,
        collection: Collection,
        id: &DocumentId,
        field: &str,
        delta: i64,
    ) -> Result<UpdateResult, StoreError> {
        let outcome = sqlx::query(
            r#"
            UPDATE documents
            SET body = jsonb_set(
                body,
                ARRAY[$3::text],
                to_jsonb(COALESCE((body ->> $3::text)::bigint, 0) + $4::bigint),
                true
            )
            WHERE collection = $1 AND id = $2
              AND COALESCE(jsonb_typeof(body -> $3::text), 'null') IN ('number', 'null')
            "#,
        )
        .bind(collection.name())
        .bind(id.as_uuid())
        .bind(field)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(|e| map_increment_error(field, e))?;

        if outcome.rows_affected() > 0 {
            return Ok(UpdateResult::matched(true));
        }

        // Nothing updated: either no such document or the field is not a number
        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.name())
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some(_) => Err(StoreError::NonNumericField {
                field: field.to_string(),
            }),
            None => Ok(UpdateResult::unmatched()),
        }
    }

    #[instrument(skip_all, fields(%collection, %id), err)]
    async fn delete_one(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<DeleteResult, StoreError> {
        let outcome = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.name())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(DeleteResult::new(outcome.rows_affected()))
    }
}
