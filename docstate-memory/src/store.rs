//! In-memory storage implementation for the storage engine.
//!
//! Documents are kept per collection in insertion order, as raw BSON documents, behind
//! async-safe read-write locks. Blobs live in a separate map keyed by id.

use async_trait::async_trait;
use bson::{Document, Uuid};
use chrono::Utc;
use mea::rwlock::RwLock;
use std::{collections::HashMap, path::Path, sync::Arc};
use tracing::trace;

use docstate_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredFile, WriteOptions},
    error::{StorageError, StorageResult},
    query::Query,
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

type StoreMap = HashMap<String, Vec<Document>>;
type FileMap = HashMap<Uuid, StoredFile>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For larger datasets,
/// use a persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docstate_memory::InMemoryStore;
/// use docstate::backend::{StoreBackend, WriteOptions};
/// use bson::{Uuid, doc};
///
/// let store = InMemoryStore::new();
/// store.save("users", doc! { "_id": Uuid::new(), "name": "Alice" }, WriteOptions::default()).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
    files: Arc<RwLock<FileMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            files: Arc::new(RwLock::new(FileMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns a copy of every document currently stored in `collection`.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>> {
        let query = Query { limit: Some(1), ..query };

        Ok(StoreBackend::find(self, collection, query).await?.into_iter().next())
    }

    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::matches(document, query.filter.as_ref())? {
                matched.push(document.clone());
            }
        }

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        trace!(collection, matched = matched.len(), "evaluated query");

        Ok(
            matched
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        )
    }

    async fn save(&self, collection: &str, document: Document, _options: WriteOptions) -> StorageResult<bool> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StorageError::InvalidArgument("cannot save a document without an `_id`".to_string()))?;

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        match documents.iter_mut().find(|existing| existing.get("_id") == Some(&id)) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }

        Ok(true)
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        _options: WriteOptions,
    ) -> StorageResult<bool> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(false);
        };

        for document in documents.iter_mut() {
            if DocumentEvaluator::matches(document, query.filter.as_ref())? {
                for (key, value) in fields {
                    document.insert(key, value);
                }
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        _options: WriteOptions,
    ) -> StorageResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut removed = 0;
        let mut index = 0;

        while index < documents.len() {
            let matches = (!just_one || removed == 0)
                && DocumentEvaluator::matches(&documents[index], query.filter.as_ref())?;

            if matches {
                documents.remove(index);
                removed += 1;
            } else {
                index += 1;
            }
        }

        Ok(removed)
    }

    async fn store_file(&self, path: &Path) -> StorageResult<Uuid> {
        let data = tokio::fs::read(path).await?;
        let id = Uuid::new();
        let file = StoredFile {
            id,
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            length: data.len() as u64,
            upload_date: Utc::now(),
            data,
        };

        self.files.write().await.insert(id, file);
        Ok(id)
    }

    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>> {
        Ok(self.files.read().await.get(&id).cloned())
    }

    async fn remove_file(&self, id: Uuid) -> StorageResult<()> {
        self.files.write().await.remove(&id);
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docstate_memory::InMemoryStore;
/// use docstate::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance. This always succeeds.
    async fn build(self) -> StorageResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
