//! Domain objects: identity, lifecycle state and named properties.
//!
//! A domain object is any struct that embeds an [`ObjectCore`] and exposes its properties
//! through [`DomainObject`]. The storage engine only ever sees objects through this trait.
//!
//! # Example
//!
//! ```ignore
//! use docstate::prelude::*;
//!
//! pub struct Post {
//!     core: ObjectCore,
//!     title: Property<String>,
//!     tags: ComplexProperty<Vec<String>>,
//!     comments: HasMany<Comment>,
//! }
//!
//! impl Default for Post {
//!     fn default() -> Self {
//!         let core = ObjectCore::new();
//!         Self {
//!             title: core.simple("title", String::new()).aliased("t"),
//!             tags: core.complex("tags", Vec::new()),
//!             comments: core.has_many("comments"),
//!             core,
//!         }
//!     }
//! }
//!
//! impl DomainObject for Post {
//!     fn core(&self) -> &ObjectCore { &self.core }
//!     fn core_mut(&mut self) -> &mut ObjectCore { &mut self.core }
//!     fn properties(&self) -> Vec<&dyn RawProperty> {
//!         vec![&self.title, &self.tags, &self.comments]
//!     }
//!     fn properties_mut(&mut self) -> Vec<&mut dyn RawProperty> {
//!         vec![&mut self.title, &mut self.tags, &mut self.comments]
//!     }
//! }
//! ```

use bson::{Bson, Document, Uuid};
use serde_json::Value;
use std::any::type_name;

use crate::{
    error::{StorageError, StorageResult},
    property::{ComplexProperty, PatternProperty, Property, PropertyValue, RawProperty},
    relationship::HasMany,
    state::{LifecycleState, StateHandle},
};

/// Identity and lifecycle state shared by every domain object.
#[derive(Debug, Default)]
pub struct ObjectCore {
    id: Option<Uuid>,
    state: StateHandle,
    collection: Option<String>,
}

impl ObjectCore {
    /// Creates the core of a new, never persisted object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a core whose object is stored in `collection` rather than the type-derived one.
    pub fn with_collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// The shared state slot properties report to.
    pub fn handle(&self) -> &StateHandle {
        &self.state
    }

    pub fn collection_override(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: Option<Uuid>) {
        self.id = id;
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.set(state);
    }

    pub fn simple<T: PropertyValue>(&self, name: impl Into<String>, value: T) -> Property<T> {
        Property::new(name, &self.state, value)
    }

    pub fn complex<T: PropertyValue>(&self, name: impl Into<String>, value: T) -> ComplexProperty<T> {
        ComplexProperty::new(name, &self.state, value)
    }

    pub fn pattern(&self, name: impl Into<String>) -> PatternProperty {
        PatternProperty::new(name, &self.state)
    }

    pub fn has_many<T: DomainObject + Default>(&self, name: impl Into<String>) -> HasMany<T> {
        HasMany::new(name, &self.state)
    }
}

/// Core trait implemented by every persisted entity.
///
/// Implementations only wire up [`DomainObject::core`] and the property lists; everything
/// else is provided. `#[derive(DomainObject)]` from the `docstate` crate generates them.
pub trait DomainObject: Send + Sync + Sized + 'static {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    fn properties(&self) -> Vec<&dyn RawProperty>;

    fn properties_mut(&mut self) -> Vec<&mut dyn RawProperty>;

    /// Collection name for this type, derived from the type path
    /// (`blog::model::Post` becomes `blog.model.Post`).
    fn collection_name() -> String {
        default_collection_name::<Self>()
    }

    /// Collection this instance is stored in.
    fn collection(&self) -> String {
        self.core()
            .collection_override()
            .map(str::to_string)
            .unwrap_or_else(Self::collection_name)
    }

    fn id(&self) -> Option<Uuid> {
        self.core().id()
    }

    fn state(&self) -> LifecycleState {
        self.core().state()
    }

    fn property(&self, name: &str) -> Option<&dyn RawProperty> {
        self.properties()
            .into_iter()
            .find(|property| property.name() == name)
    }

    /// Storage alias for a property name. Unknown names (such as `_id`) map to themselves.
    fn storage_name(&self, property: &str) -> String {
        self.property(property)
            .map(|property| property.storage_name().to_string())
            .unwrap_or_else(|| property.to_string())
    }

    /// The document this object currently represents, `_id` first when present.
    ///
    /// Relationship properties contribute the references they currently hold; no member
    /// is saved.
    fn to_raw(&self) -> StorageResult<Document> {
        let mut document = Document::new();

        if let Some(id) = self.id() {
            document.insert("_id", id);
        }
        for property in self.properties() {
            document.insert(property.storage_name().to_string(), property.snapshot()?);
        }

        Ok(document)
    }

    /// JSON rendering of [`DomainObject::to_raw`].
    fn to_json(&self) -> StorageResult<Value> {
        Ok(serde_json::to_value(Bson::Document(self.to_raw()?))?)
    }
}

/// Derives a collection name from a type path.
pub fn default_collection_name<T: ?Sized>() -> String {
    type_name::<T>().replace("::", ".")
}

/// Loads a stored document into `object` and marks it `Clean`.
///
/// Every field is checked before any is written, so a malformed document leaves `object`
/// untouched.
pub(crate) fn import_document<O: DomainObject>(object: &mut O, mut document: Document) -> StorageResult<()> {
    let id = match document.remove("_id") {
        Some(Bson::Binary(binary)) => Some(
            binary
                .to_uuid()
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        ),
        Some(other) => {
            return Err(StorageError::Serialization(format!(
                "expected a UUID `_id`, got {other}"
            )));
        }
        None => None,
    };

    for property in object.properties() {
        property.check_raw(document.get(property.storage_name()))?;
    }

    for property in object.properties_mut() {
        let key = property.storage_name().to_string();
        property.import_raw(document.remove(&key))?;
        property.mark_clean();
    }

    object.core_mut().set_id(id);
    mark_clean(object);

    Ok(())
}

/// Marks every property and the object itself `Clean`.
pub(crate) fn mark_clean<O: DomainObject>(object: &O) {
    for property in object.properties() {
        property.mark_clean();
    }

    object.core().set_state(LifecycleState::Clean);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Note {
        core: ObjectCore,
        body: Property<String>,
        stars: ComplexProperty<i32>,
    }

    impl Default for Note {
        fn default() -> Self {
            let core = ObjectCore::new();
            Self {
                body: core.simple("body", String::new()).aliased("b"),
                stars: core.complex("stars", 0),
                core,
            }
        }
    }

    impl DomainObject for Note {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ObjectCore {
            &mut self.core
        }

        fn properties(&self) -> Vec<&dyn RawProperty> {
            vec![&self.body, &self.stars]
        }

        fn properties_mut(&mut self) -> Vec<&mut dyn RawProperty> {
            vec![&mut self.body, &mut self.stars]
        }
    }

    #[test]
    fn collection_name_is_derived_from_the_type_path() {
        assert!(Note::collection_name().ends_with("object.tests.Note"));
        assert!(!Note::collection_name().contains("::"));

        let mut note = Note::default();
        note.core = ObjectCore::with_collection("notes");
        assert_eq!(note.collection(), "notes");
    }

    #[test]
    fn storage_names_follow_aliases() {
        let note = Note::default();

        assert_eq!(note.storage_name("body"), "b");
        assert_eq!(note.storage_name("stars"), "stars");
        assert_eq!(note.storage_name("_id"), "_id");
    }

    #[test]
    fn import_sets_identity_values_and_clean_state() {
        let mut note = Note::default();
        let id = Uuid::new();

        import_document(
            &mut note,
            bson::doc! { "_id": id, "b": "hello", "stars": 4 },
        )
        .unwrap();

        assert_eq!(note.id(), Some(id));
        assert_eq!(note.state(), LifecycleState::Clean);
        assert_eq!(note.body.get(), "hello");
        assert_eq!(*note.stars.get(), 4);
        assert!(note.properties().iter().all(|p| p.state() == LifecycleState::Clean));

        assert_eq!(
            note.to_raw().unwrap(),
            bson::doc! { "_id": id, "b": "hello", "stars": 4 }
        );
    }

    #[test]
    fn only_complex_mutations_dirty_a_clean_object() {
        let mut note = Note::default();
        import_document(&mut note, bson::doc! { "_id": Uuid::new() }).unwrap();

        note.body.set("edited".to_string());
        assert_eq!(note.state(), LifecycleState::Clean);

        note.stars.set(5);
        assert_eq!(note.state(), LifecycleState::Dirty);
    }

    #[test]
    fn import_rejects_non_uuid_ids() {
        let mut note = Note::default();

        let result = import_document(&mut note, bson::doc! { "_id": 7 });

        assert!(matches!(result, Err(StorageError::Serialization(_))));
        assert_eq!(note.state(), LifecycleState::New);
    }

    #[test]
    fn malformed_field_leaves_the_object_untouched() {
        let mut note = Note::default();
        note.body.set("draft".to_string());

        let result = import_document(
            &mut note,
            bson::doc! { "_id": Uuid::new(), "b": "stored", "stars": "many" },
        );

        assert!(matches!(result, Err(StorageError::Serialization(_))));
        assert_eq!(note.body.get(), "draft");
        assert_eq!(note.body.state(), LifecycleState::New);
        assert_eq!(note.id(), None);
        assert_eq!(note.state(), LifecycleState::New);
    }
}
