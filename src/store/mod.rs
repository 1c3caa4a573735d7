//! Document store abstraction.
//!
//! Handlers talk to collections through [`DocumentStore`]. Two backends exist:
//!
//! - [`MemoryStore`]: DashMap-backed, used when no database is configured
//! - [`PgDocumentStore`]: PostgreSQL JSONB table, used when `DATABASE_URL` is set
//!
//! Both guarantee per-document atomicity for every operation. Nothing spans
//! more than one document.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use crate::config::Config;
use crate::models::{DeleteResult, Document, DocumentId, InsertResult, UpdateResult, ID_FIELD};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The three collections the server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Assets,
    Requests,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Assets, Collection::Requests];

    /// Collection name as stored
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Assets => "Assets",
            Collection::Requests => "requests",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot increment non-numeric field `{field}`")]
    NonNumericField { field: String },
}

/// Collection-scoped document operations.
///
/// Every method touches at most one document, atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;

    /// Every document in the collection, in insertion order
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Insert a document under a freshly generated `_id`.
    ///
    /// Any `_id` already present in `document` is replaced.
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<InsertResult, StoreError>;

    /// Overwrite the given fields of one document.
    ///
    /// With `upsert`, a missing document is created from `_id` plus `fields`.
    async fn update_one(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError>;

    /// Atomically add `delta` to a numeric field. A missing field counts as 0.
    async fn increment(
        &self,
        collection: Collection,
        id: &DocumentId,
        field: &str,
        delta: i64,
    ) -> Result<UpdateResult, StoreError>;

    /// Remove one document
    async fn delete_one(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<DeleteResult, StoreError>;
}

/// Open the store selected by `config` and verify it answers.
pub async fn connect(config: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => Arc::new(PgDocumentStore::connect(url, config).await?),
        None => {
            warn!("DATABASE_URL not set - using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    store.ping().await?;
    info!(store = store.backend(), "Store connectivity check passed");

    Ok(store)
}

/// Copy `fields` onto `body`, reporting whether anything changed.
/// `_id` is never overwritten.
pub(crate) fn apply_set(body: &mut Document, fields: Document) -> bool {
    let mut modified = false;
    for (key, value) in fields {
        if key == ID_FIELD {
            continue;
        }
        if body.get(&key) != Some(&value) {
            body.insert(key, value);
            modified = true;
        }
    }
    modified
}
