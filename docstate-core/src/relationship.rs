//! One-to-many relationship properties.
//!
//! A [`HasMany`] holds full domain objects in memory but persists only references to
//! them. Each member lives in its own collection, independent of the owner.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt;
use tracing::{trace, warn};

use crate::{
    engine::StorageEngine,
    error::{StorageError, StorageResult},
    object::DomainObject,
    observable::ObservableCollection,
    property::{ChangeHook, RawProperty},
    reference::DocumentRef,
    state::{LifecycleState, StateHandle},
};

/// A relationship property holding many objects of type `T`.
///
/// Reading the relationship of a fetched object materializes it from the stored references
/// with a single query; the result is memoized until the references are replaced by another
/// import. Writing the owner saves every member that is not `Clean` before its reference is
/// recorded.
///
/// # Example
///
/// ```ignore
/// let comments = post.comments.get_mut(&engine).await?;
/// comments.append(Comment::with_body("first!"));
/// engine.save(&mut post).await?;
/// ```
pub struct HasMany<T> {
    name: String,
    alias: Option<String>,
    references: Vec<DocumentRef>,
    loaded: bool,
    value: ObservableCollection<T>,
    state: StateHandle,
    owner: StateHandle,
}

impl<T: DomainObject + Default> HasMany<T> {
    /// Creates an empty relationship owned by the object whose state lives in `owner`.
    pub fn new(name: impl Into<String>, owner: &StateHandle) -> Self {
        let state = StateHandle::new(LifecycleState::New);
        let mut value = ObservableCollection::new();
        value.set_owner(ChangeHook::new(state.clone(), owner.clone()));

        Self {
            name: name.into(),
            alias: None,
            references: Vec::new(),
            loaded: true,
            value,
            state,
            owner: owner.clone(),
        }
    }

    /// Stores this property under `alias` instead of its name.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the members, materializing them from the stored references first if needed.
    ///
    /// # Errors
    ///
    /// Propagates any error from the query issued through `engine`.
    pub async fn get(&mut self, engine: &StorageEngine) -> StorageResult<&ObservableCollection<T>> {
        self.materialize(engine).await?;
        Ok(&self.value)
    }

    /// Like [`HasMany::get`], but returns the collection for mutation.
    pub async fn get_mut(&mut self, engine: &StorageEngine) -> StorageResult<&mut ObservableCollection<T>> {
        self.materialize(engine).await?;
        Ok(&mut self.value)
    }

    /// Replaces the members with `collection`, taking ownership of it.
    ///
    /// Stored references are discarded since the new collection is now authoritative.
    pub fn set(&mut self, mut collection: ObservableCollection<T>) {
        collection.set_owner(self.hook());
        self.value = collection;
        self.references.clear();
        self.loaded = true;
        self.on_change();
    }

    /// Moves the owner (and this field) from `Clean` to `Dirty`. No-op in any other state.
    pub fn on_change(&self) {
        self.hook().fire();
    }

    /// Whether the members are currently materialized.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// References as last imported or exported.
    pub fn references(&self) -> &[DocumentRef] {
        &self.references
    }

    /// Lifecycle state of the owning object.
    pub fn owner_state(&self) -> LifecycleState {
        self.owner.get()
    }

    fn hook(&self) -> ChangeHook {
        ChangeHook::new(self.state.clone(), self.owner.clone())
    }

    fn parse_references(&self, value: Option<&Bson>) -> StorageResult<Vec<DocumentRef>> {
        match value {
            None | Some(Bson::Null) => Ok(Vec::new()),
            Some(Bson::Array(items)) => items.iter().map(DocumentRef::from_bson).collect(),
            Some(other) => Err(StorageError::InvalidArgument(format!(
                "`{}` expects a list of references, got {other}",
                self.name
            ))),
        }
    }

    async fn materialize(&mut self, engine: &StorageEngine) -> StorageResult<()> {
        if self.loaded {
            return Ok(());
        }

        let ids = self
            .references
            .iter()
            .map(|reference| reference.id)
            .collect::<Vec<Uuid>>();
        let mut members = Vec::with_capacity(ids.len());

        if !ids.is_empty() {
            trace!(property = %self.name, count = ids.len(), "materializing relationship");

            let mut found = engine
                .fetch_by_ids(&T::default(), ids.iter().copied())?
                .try_collect()
                .await?;

            for id in &ids {
                match found.iter().position(|member| member.id() == Some(*id)) {
                    Some(index) => members.push(found.swap_remove(index)),
                    None => warn!(property = %self.name, %id, "dangling relationship reference"),
                }
            }
        }

        let mut collection = ObservableCollection::from_vec(members);
        collection.set_owner(self.hook());
        self.value = collection;
        self.loaded = true;

        Ok(())
    }
}

#[async_trait]
impl<T: DomainObject + Default> RawProperty for HasMany<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn state(&self) -> LifecycleState {
        self.state.get()
    }

    fn mark_clean(&self) {
        self.state.set(LifecycleState::Clean);
    }

    async fn export_raw(&mut self, engine: &StorageEngine) -> StorageResult<Bson> {
        // An empty collection keeps whatever references were stored before.
        if !self.value.is_empty() {
            let mut references = Vec::with_capacity(self.value.len());

            for member in self.value.members_mut() {
                if member.state() != LifecycleState::Clean {
                    engine.save(member).await?;
                }

                let id = member.id().ok_or_else(|| {
                    StorageError::InvalidState(format!(
                        "member of `{}` has no id after being saved",
                        self.name
                    ))
                })?;
                references.push(DocumentRef::new(member.collection(), id));
            }

            self.references = references;
        }

        Ok(Bson::Array(
            self.references
                .iter()
                .cloned()
                .map(Bson::from)
                .collect(),
        ))
    }

    fn snapshot(&self) -> StorageResult<Bson> {
        let references = if self.loaded && !self.value.is_empty() {
            self.value
                .iter()
                .filter_map(|member| member.id().map(|id| DocumentRef::new(member.collection(), id)))
                .collect::<Vec<_>>()
        } else {
            self.references.clone()
        };

        Ok(Bson::Array(references.into_iter().map(Bson::from).collect()))
    }

    fn check_raw(&self, value: Option<&Bson>) -> StorageResult<()> {
        self.parse_references(value).map(|_| ())
    }

    fn import_raw(&mut self, value: Option<Bson>) -> StorageResult<()> {
        let references = self.parse_references(value.as_ref())?;

        let mut placeholder = ObservableCollection::new();
        placeholder.set_owner(self.hook());

        self.references = references;
        self.value = placeholder;
        self.loaded = false;

        Ok(())
    }
}

impl<T: DomainObject> fmt::Display for HasMany<T> {
    /// Renders the materialized members, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, member) in self.value.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            match member.to_json() {
                Ok(json) => write!(f, "{json}")?,
                Err(_) => write!(f, "<{}>", member.collection())?,
            }
        }

        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for HasMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasMany")
            .field("name", &self.name)
            .field("references", &self.references)
            .field("loaded", &self.loaded)
            .field("value", &self.value)
            .finish()
    }
}
