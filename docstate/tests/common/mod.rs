#![allow(dead_code)]

use async_trait::async_trait;
use docstate::{
    bson::{Document, Uuid},
    memory::InMemoryStore,
    prelude::*,
};
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Debug, DomainObject)]
#[domain(collection = "comments")]
pub struct Comment {
    #[domain(core)]
    pub core: ObjectCore,
    pub body: Property<String>,
}

impl Default for Comment {
    fn default() -> Self {
        let core = ObjectCore::new();
        Self {
            body: core.simple("body", String::new()),
            core,
        }
    }
}

impl Comment {
    pub fn with_body(body: &str) -> Self {
        let mut comment = Self::default();
        comment.body.set(body.to_string());
        comment
    }
}

#[derive(DomainObject)]
#[domain(collection = "posts")]
pub struct Post {
    #[domain(core)]
    pub core: ObjectCore,
    pub title: Property<String>,
    pub tags: ComplexProperty<Vec<String>>,
    pub views: Property<i64>,
    pub comments: HasMany<Comment>,
    #[domain(skip)]
    pub draft_notes: String,
}

impl Default for Post {
    fn default() -> Self {
        let core = ObjectCore::new();
        Self {
            title: core.simple("title", String::new()).aliased("t"),
            tags: core.complex("tags", Vec::new()),
            views: core.simple("views", 0),
            comments: core.has_many("comments"),
            draft_notes: String::new(),
            core,
        }
    }
}

impl Post {
    pub fn titled(title: &str) -> Self {
        let mut post = Self::default();
        post.title.set(title.to_string());
        post
    }
}

/// In-memory backend that counts the queries and acknowledged removes it serves.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    finds: Arc<AtomicUsize>,
    safe_removes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn safe_removes(&self) -> usize {
        self.safe_removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        StoreBackend::find_one(&self.inner, collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        StoreBackend::find(&self.inner, collection, query).await
    }

    async fn save(&self, collection: &str, document: Document, options: WriteOptions) -> StorageResult<bool> {
        StoreBackend::save(&self.inner, collection, document, options).await
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        options: WriteOptions,
    ) -> StorageResult<bool> {
        StoreBackend::update(&self.inner, collection, query, fields, options).await
    }

    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        options: WriteOptions,
    ) -> StorageResult<u64> {
        if options.safe {
            self.safe_removes.fetch_add(1, Ordering::SeqCst);
        }
        StoreBackend::remove(&self.inner, collection, query, just_one, options).await
    }

    async fn store_file(&self, path: &Path) -> StorageResult<Uuid> {
        StoreBackend::store_file(&self.inner, path).await
    }

    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>> {
        StoreBackend::find_file(&self.inner, id).await
    }

    async fn remove_file(&self, id: Uuid) -> StorageResult<()> {
        StoreBackend::remove_file(&self.inner, id).await
    }
}

/// An engine over a fresh in-memory store, plus a handle on the same store.
pub fn memory_engine() -> (StorageEngine, InMemoryStore) {
    let store = InMemoryStore::new();
    (StorageEngine::new(store.clone()), store)
}

#[derive(DomainObject)]
#[domain(collection = "rules")]
pub struct Rule {
    #[domain(core)]
    pub core: ObjectCore,
    pub name: Property<String>,
    pub matcher: PatternProperty,
}

impl Default for Rule {
    fn default() -> Self {
        let core = ObjectCore::new();
        Self {
            name: core.simple("name", String::new()),
            matcher: core.pattern("matcher"),
            core,
        }
    }
}
