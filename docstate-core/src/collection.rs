//! Named collection handles over a backend.
//!
//! A [`Collection`] is what the storage engine "selects" for an object before talking to
//! the store: it pins the collection name and the write options so individual operations
//! only carry the query and payload.

use bson::Document;

use crate::{
    backend::{DynStoreBackend, WriteOptions},
    error::StorageResult,
    query::Query,
};

/// A borrowed handle on one collection of a backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend trait object reference
#[derive(Debug)]
pub struct Collection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
    options: WriteOptions,
}

impl<'a> Collection<'a> {
    /// Creates a new collection reference (internal use).
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend, options: WriteOptions) -> Self {
        Self {
            name,
            backend,
            options,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the write options for writes through this handle.
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the write options applied to every write through this handle.
    pub fn options(&self) -> WriteOptions {
        self.options
    }

    /// Returns the first document matching `query`.
    pub async fn find_one(&self, query: Query) -> StorageResult<Option<Document>> {
        self.backend.find_one(self.name(), query).await
    }

    /// Returns all documents matching `query`.
    pub async fn find(&self, query: Query) -> StorageResult<Vec<Document>> {
        self.backend.find(self.name(), query).await
    }

    /// Writes a full document (insert or replace by `_id`).
    pub async fn save(&self, document: Document) -> StorageResult<bool> {
        self.backend
            .save(self.name(), document, self.options)
            .await
    }

    /// Merges `fields` into the first document matching `query`.
    pub async fn update(&self, query: Query, fields: Document) -> StorageResult<bool> {
        self.backend
            .update(self.name(), query, fields, self.options)
            .await
    }

    /// Removes matching documents, or only the first one if `just_one` is set.
    pub async fn remove(&self, query: Query, just_one: bool) -> StorageResult<u64> {
        self.backend
            .remove(self.name(), query, just_one, self.options)
            .await
    }
}
