//! The storage engine: the single entry point for persisting domain objects.
//!
//! A [`StorageEngine`] binds one backend and routes every object through it:
//!
//! - [`StorageEngine::save`] dispatches on the object's lifecycle state
//! - [`StorageEngine::insert`] / [`StorageEngine::update`] write full or partial documents
//! - `fetch_*` and `find_*` operations load documents back into objects
//! - [`StorageEngine::save_file`] / [`StorageEngine::fetch_file`] use the blob sub-store
//!
//! # Example
//!
//! ```ignore
//! use docstate::prelude::*;
//! use docstate_memory::InMemoryStore;
//!
//! let engine = StorageEngine::builder()
//!     .backend(InMemoryStore::new())
//!     .safe_writes(true)
//!     .build();
//!
//! let mut post = Post::default();
//! post.title.set("Hello".to_string());
//! engine.save(&mut post).await?;
//! ```

use bson::{Document, Uuid, doc};
use std::path::Path;
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend, StoredFile, WriteOptions},
    collection::Collection,
    config::StorageConfig,
    cursor::ObjectCursor,
    error::{StorageError, StorageResult},
    object::{DomainObject, import_document, mark_clean},
    query::{Filter, Query},
    reference::DocumentRef,
    state::LifecycleState,
};

/// What [`StorageEngine::save`] did with an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The object was new and has been inserted.
    Inserted,
    /// The object was dirty and its changed fields have been written.
    Updated,
    /// The object was clean; nothing was written.
    Unchanged,
    /// A write was issued but the store did not accept it.
    NotAcknowledged,
}

/// Persistence handle bound to one backend.
#[derive(Debug, Default)]
pub struct StorageEngine {
    backend: Option<Box<dyn DynStoreBackend>>,
    config: StorageConfig,
}

impl StorageEngine {
    /// Creates an engine bound to `backend` with default configuration.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::builder().backend(backend).build()
    }

    pub fn builder() -> StorageEngineBuilder {
        StorageEngineBuilder::default()
    }

    /// Binds a new backend and configuration, replacing any previous backend without
    /// shutting it down.
    pub fn init(&mut self, backend: impl StoreBackend + 'static, config: StorageConfig) {
        self.backend = Some(Box::new(backend));
        self.config = config;
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Shuts the bound backend down. The engine is uninitialized afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] if no backend is bound.
    pub async fn shutdown(&mut self) -> StorageResult<()> {
        let backend = self
            .backend
            .take()
            .ok_or(StorageError::NotInitialized)?;

        backend.shutdown_boxed().await
    }

    /// Returns the bound backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend
            .as_deref()
            .and_then(|backend| backend.as_any().downcast_ref::<B>())
    }

    /// Selects a collection of the bound backend.
    pub fn collection(&self, name: &str) -> StorageResult<Collection<'_>> {
        Ok(Collection::new(
            name.to_string(),
            self.backend()?,
            self.write_options(),
        ))
    }

    /// Loads the object with the given id into `object`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ObjectNotFound`] if no document has that id.
    pub async fn fetch_by_id<T: DomainObject>(&self, object: &mut T, id: Uuid) -> StorageResult<()> {
        let collection = self.collection(&object.collection())?;
        let document = collection
            .find_one(by_id(id))
            .await?
            .ok_or_else(|| {
                StorageError::ObjectNotFound(collection.name().to_string(), format!("no object with id {id}"))
            })?;

        debug!(collection = collection.name(), %id, "fetched object");
        import_document(object, document)
    }

    /// Opens a cursor over the objects whose id is in `ids`.
    ///
    /// `shell` only supplies the collection; it is not modified.
    pub fn fetch_by_ids<T: DomainObject + Default>(
        &self,
        shell: &T,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> StorageResult<ObjectCursor<'_, T>> {
        self.find_by_query(
            shell,
            Some(Query::builder().filter(Filter::is_in("_id", ids)).build()),
        )
    }

    /// Loads the object `reference` points to into `object`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ObjectNotFound`] if the reference does not resolve.
    pub async fn fetch_by_ref<T: DomainObject>(
        &self,
        object: &mut T,
        reference: &DocumentRef,
    ) -> StorageResult<()> {
        let document = self
            .backend()?
            .resolve_ref(reference)
            .await?
            .ok_or_else(|| {
                StorageError::ObjectNotFound(
                    reference.collection.clone(),
                    format!("unresolved reference to {}", reference.id),
                )
            })?;

        debug!(collection = %reference.collection, id = %reference.id, "resolved reference");
        import_document(object, document)
    }

    /// Persists `object` according to its lifecycle state.
    ///
    /// `New` objects are inserted, `Dirty` ones updated and `Clean` ones left alone.
    pub async fn save<T: DomainObject>(&self, object: &mut T) -> StorageResult<SaveOutcome> {
        self.backend()?;

        let written = match object.state() {
            LifecycleState::Clean => return Ok(SaveOutcome::Unchanged),
            LifecycleState::New => self.insert(object).await?.then_some(SaveOutcome::Inserted),
            LifecycleState::Dirty => self.update(object).await?.then_some(SaveOutcome::Updated),
        };

        Ok(written.unwrap_or(SaveOutcome::NotAcknowledged))
    }

    /// Writes `object` as a new document under a fresh id.
    ///
    /// Returns whether the store accepted the write. Only then is the id assigned and the
    /// object marked `Clean`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidState`] if the object already has an id.
    pub async fn insert<T: DomainObject>(&self, object: &mut T) -> StorageResult<bool> {
        let collection = self.collection(&object.collection())?;

        if let Some(id) = object.id() {
            return Err(StorageError::InvalidState(format!(
                "cannot insert object {id}: it already has an id"
            )));
        }

        let id = Uuid::new();
        let mut document = doc! { "_id": id };
        document.extend(self.export_data(object, false).await?);

        let accepted = collection.save(document).await?;
        debug!(collection = collection.name(), %id, accepted, "inserted object");

        if accepted {
            object.core_mut().set_id(Some(id));
            mark_clean(object);
        }

        Ok(accepted)
    }

    /// Writes the changed fields of `object` onto its stored document.
    ///
    /// Returns whether a document matched. Objects without changed fields are marked
    /// `Clean` without a write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidState`] if the object has no id.
    pub async fn update<T: DomainObject>(&self, object: &mut T) -> StorageResult<bool> {
        let collection = self.collection(&object.collection())?;
        let id = object.id().ok_or_else(|| {
            StorageError::InvalidState("cannot update an object without an id".to_string())
        })?;

        let fields = self.export_data(object, true).await?;
        if fields.is_empty() {
            mark_clean(object);
            return Ok(true);
        }

        let matched = collection.update(by_id(id), fields).await?;
        debug!(collection = collection.name(), %id, matched, "updated object");

        if matched {
            mark_clean(object);
        }

        Ok(matched)
    }

    /// Removes the stored document of `object`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidState`] if the object has no id.
    pub async fn delete<T: DomainObject>(&self, object: &T) -> StorageResult<bool> {
        let collection = self.collection(&object.collection())?;
        let id = object.id().ok_or_else(|| {
            StorageError::InvalidState("cannot delete an object without an id".to_string())
        })?;

        let removed = collection.remove(by_id(id), true).await?;
        debug!(collection = collection.name(), %id, removed, "deleted object");

        Ok(removed > 0)
    }

    /// Removes every document of `shell`'s collection matching `query` (all if `None`).
    ///
    /// Property names in the query are translated to storage names. `safe` overrides the
    /// configured `safe_writes` for this call only. Returns the number of removed documents.
    pub async fn delete_by_query<T: DomainObject>(
        &self,
        shell: &T,
        query: Option<Query>,
        safe: Option<bool>,
    ) -> StorageResult<u64> {
        let mut collection = self.collection(&shell.collection())?;
        if let Some(safe) = safe {
            collection = collection.with_options(WriteOptions { safe });
        }

        let removed = collection
            .remove(translate(shell, query), false)
            .await?;

        debug!(collection = collection.name(), removed, "deleted by query");
        Ok(removed)
    }

    /// Opens a lazy cursor over the objects matching `query` (all if `None`).
    ///
    /// Property names in filters and sort are translated to storage names; unknown names
    /// pass through unchanged.
    pub fn find_by_query<T: DomainObject + Default>(
        &self,
        shell: &T,
        query: Option<Query>,
    ) -> StorageResult<ObjectCursor<'_, T>> {
        let collection = self.collection(&shell.collection())?;
        Ok(ObjectCursor::new(collection, translate(shell, query)))
    }

    /// Loads the first object matching `query` (any if `None`) into `object`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ObjectNotFound`] if nothing matches.
    pub async fn find_one_by_query<T: DomainObject>(
        &self,
        object: &mut T,
        query: Option<Query>,
    ) -> StorageResult<()> {
        let collection = self.collection(&object.collection())?;
        let document = collection
            .find_one(translate(object, query))
            .await?
            .ok_or_else(|| {
                StorageError::ObjectNotFound(
                    collection.name().to_string(),
                    "no object matches the query".to_string(),
                )
            })?;

        debug!(collection = collection.name(), "found object by query");
        import_document(object, document)
    }

    /// Stores the file at `path` in the blob sub-store and returns its id.
    ///
    /// The blob `old_id`, if given, is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if `path` is not an existing file.
    pub async fn save_file(&self, path: impl AsRef<Path>, old_id: Option<Uuid>) -> StorageResult<Uuid> {
        let backend = self.backend()?;
        let path = path.as_ref();

        if !path.is_file() {
            return Err(StorageError::InvalidArgument(format!(
                "no file at {}",
                path.display()
            )));
        }

        if let Some(old_id) = old_id {
            backend.remove_file(old_id).await?;
            debug!(id = %old_id, "removed previous file");
        }

        let id = backend.store_file(path).await?;
        debug!(%id, path = %path.display(), "stored file");

        Ok(id)
    }

    /// Looks a blob up by id.
    pub async fn fetch_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>> {
        self.backend()?.find_file(id).await
    }

    fn backend(&self) -> StorageResult<&dyn DynStoreBackend> {
        self.backend
            .as_deref()
            .ok_or(StorageError::NotInitialized)
    }

    fn write_options(&self) -> WriteOptions {
        self.config.write_options()
    }

    /// Exports the object's properties keyed by storage name, never including `_id`.
    ///
    /// With `only_changed`, `Clean` properties are skipped.
    async fn export_data<T: DomainObject>(&self, object: &mut T, only_changed: bool) -> StorageResult<Document> {
        let mut data = Document::new();

        for property in object.properties_mut() {
            if only_changed && property.state() == LifecycleState::Clean {
                continue;
            }

            let value = property.export_raw(self).await?;
            data.insert(property.storage_name().to_string(), value);
        }

        data.remove("_id");
        Ok(data)
    }
}

/// Builder for [`StorageEngine`].
#[derive(Debug, Default)]
pub struct StorageEngineBuilder {
    backend: Option<Box<dyn DynStoreBackend>>,
    config: StorageConfig,
}

impl StorageEngineBuilder {
    pub fn backend(mut self, backend: impl StoreBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn safe_writes(mut self, safe_writes: bool) -> Self {
        self.config.safe_writes = safe_writes;
        self
    }

    /// Builds the engine. Without a backend it starts uninitialized.
    pub fn build(self) -> StorageEngine {
        StorageEngine {
            backend: self.backend,
            config: self.config,
        }
    }
}

fn by_id(id: Uuid) -> Query {
    Query::builder().filter(Filter::eq("_id", id)).build()
}

fn translate<T: DomainObject>(object: &T, query: Option<Query>) -> Query {
    query
        .unwrap_or_default()
        .to_storage(|field| object.storage_name(field))
}
