//! Storage backend abstraction for the storage engine.
//!
//! This module defines the driver-level contract the [`StorageEngine`](crate::engine::StorageEngine)
//! talks to. A backend knows nothing about domain objects, lifecycle state or property
//! aliases: it stores raw BSON documents keyed by `_id`, evaluates already-translated
//! [`Query`] values and keeps a small blob sub-store.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::{Document, Uuid};
use chrono::{DateTime, Utc};
use std::{any::Any, fmt::Debug, path::Path};

use crate::{
    error::StorageResult,
    query::{Filter, Query},
    reference::DocumentRef,
};

/// Per-write options handed to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Request acknowledged ("safe") writes from the store.
    pub safe: bool,
}

/// A blob held in the backend's file sub-store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub id: Uuid,
    pub filename: String,
    pub length: u64,
    pub upload_date: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The storage engine performs no locking of its own.
///
/// # Error Handling
///
/// Operations return [`StorageResult<T>`](crate::error::StorageResult). Driver failures
/// should be mapped to [`StorageError::Backend`](crate::error::StorageError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document in `collection` matching `query`, if any.
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>>;

    /// Returns every document in `collection` matching `query`.
    ///
    /// Sort, limit and offset carried by the query are applied by the backend.
    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>>;

    /// Writes a full document, inserting it or replacing the document with the same `_id`.
    ///
    /// Returns `true` if the store accepted the write.
    async fn save(
        &self,
        collection: &str,
        document: Document,
        options: WriteOptions,
    ) -> StorageResult<bool>;

    /// Merges `fields` into the first document matching `query`.
    ///
    /// Fields not present in `fields` are left untouched. Returns `true` if a document
    /// matched.
    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        options: WriteOptions,
    ) -> StorageResult<bool>;

    /// Removes documents matching `query`; only the first one if `just_one` is set.
    ///
    /// Returns the number of removed documents.
    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        options: WriteOptions,
    ) -> StorageResult<u64>;

    /// Stores the file at `path` as a new blob and returns its id.
    async fn store_file(&self, path: &Path) -> StorageResult<Uuid>;

    /// Looks up a blob by id.
    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>>;

    /// Removes a blob by id. Removing a missing blob is not an error.
    async fn remove_file(&self, id: Uuid) -> StorageResult<()>;

    /// Dereferences a [`DocumentRef`].
    ///
    /// The default implementation looks the id up in the referenced collection.
    async fn resolve_ref(&self, reference: &DocumentRef) -> StorageResult<Option<Document>> {
        self.find_one(
            &reference.collection,
            Query::builder()
                .filter(Filter::eq("_id", reference.id))
                .build(),
        )
        .await
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> StorageResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`], implemented for every backend.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>>;
    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>>;
    async fn save(
        &self,
        collection: &str,
        document: Document,
        options: WriteOptions,
    ) -> StorageResult<bool>;
    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        options: WriteOptions,
    ) -> StorageResult<bool>;
    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        options: WriteOptions,
    ) -> StorageResult<u64>;
    async fn store_file(&self, path: &Path) -> StorageResult<Uuid>;
    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>>;
    async fn remove_file(&self, id: Uuid) -> StorageResult<()>;
    async fn resolve_ref(&self, reference: &DocumentRef) -> StorageResult<Option<Document>>;
    async fn shutdown_boxed(self: Box<Self>) -> StorageResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>> {
        StoreBackend::find_one(self, collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>> {
        StoreBackend::find(self, collection, query).await
    }

    async fn save(
        &self,
        collection: &str,
        document: Document,
        options: WriteOptions,
    ) -> StorageResult<bool> {
        StoreBackend::save(self, collection, document, options).await
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        options: WriteOptions,
    ) -> StorageResult<bool> {
        StoreBackend::update(self, collection, query, fields, options).await
    }

    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        options: WriteOptions,
    ) -> StorageResult<u64> {
        StoreBackend::remove(self, collection, query, just_one, options).await
    }

    async fn store_file(&self, path: &Path) -> StorageResult<Uuid> {
        StoreBackend::store_file(self, path).await
    }

    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>> {
        StoreBackend::find_file(self, id).await
    }

    async fn remove_file(&self, id: Uuid) -> StorageResult<()> {
        StoreBackend::remove_file(self, id).await
    }

    async fn resolve_ref(&self, reference: &DocumentRef) -> StorageResult<Option<Document>> {
        StoreBackend::resolve_ref(self, reference).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> StorageResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StorageResult<Self::Backend>;
}
