//! In-memory document store.
//!
//! No persistence - data is lost on restart. Each document lives in its own
//! DashMap entry, so every update runs under that entry's shard write guard.

use super::{apply_set, Collection, DocumentStore, StoreError};
use crate::models::{DeleteResult, Document, DocumentId, InsertResult, UpdateResult, ID_FIELD};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Number, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A stored document plus its insertion position
#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    body: Document,
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Documents keyed by collection and id
    documents: Arc<DashMap<(Collection, DocumentId), StoredDocument>>,

    /// Insertion counter, used to list in insertion order
    next_seq: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

fn incremented(current: Option<&Value>, field: &str, delta: i64) -> Result<Value, StoreError> {
    let non_numeric = || StoreError::NonNumericField {
        field: field.to_string(),
    };

    match current {
        None | Some(Value::Null) => Ok(Value::from(delta)),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.checked_add(delta).map(Value::from).ok_or_else(non_numeric)
            } else {
                #[allow(clippy::cast_precision_loss)]
                let sum = n.as_f64().ok_or_else(non_numeric)? + delta as f64;
                Number::from_f64(sum).map(Value::Number).ok_or_else(non_numeric)
            }
        }
        Some(_) => Err(non_numeric()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let mut found: Vec<StoredDocument> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|doc| doc.seq);

        Ok(found.into_iter().map(|doc| doc.body).collect())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<InsertResult, StoreError> {
        let id = DocumentId::new();
        document.insert(ID_FIELD.to_string(), serde_json::to_value(id)?);

        self.documents.insert(
            (collection, id),
            StoredDocument {
                seq: self.next_seq(),
                body: document,
            },
        );

        debug!(%collection, %id, "Inserted document");
        Ok(InsertResult::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: &DocumentId,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        match self.documents.entry((collection, *id)) {
            Entry::Occupied(mut entry) => {
                let modified = apply_set(&mut entry.get_mut().body, fields);
                Ok(UpdateResult::matched(modified))
            }
            Entry::Vacant(entry) if upsert => {
                let mut body = Document::new();
                body.insert(ID_FIELD.to_string(), serde_json::to_value(id)?);
                apply_set(&mut body, fields);
                entry.insert(StoredDocument {
                    seq: self.next_seq(),
                    body,
                });
                Ok(UpdateResult::upserted(*id))
            }
            Entry::Vacant(_) => Ok(UpdateResult::unmatched()),
        }
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &DocumentId,
        field: &str,
        delta: i64,
    ) -> Result<UpdateResult, StoreError> {
        let Some(mut entry) = self.documents.get_mut(&(collection, *id)) else {
            return Ok(UpdateResult::unmatched());
        };

        let body = &mut entry.value_mut().body;
        let next = incremented(body.get(field), field, delta)?;
        body.insert(field.to_string(), next);

        Ok(UpdateResult::matched(true))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> Result<DeleteResult, StoreError> {
        let removed = self.documents.remove(&(collection, *id)).is_some();
        Ok(DeleteResult::new(u64::from(removed)))
    }
}
