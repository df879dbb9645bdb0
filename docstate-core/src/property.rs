//! Typed property slots that make up a domain object.
//!
//! Every property tracks its own field-level [`LifecycleState`] (used to export only
//! changed fields on update) and holds a clone of its owner's [`StateHandle`]:
//!
//! - [`Property`] is *simple*: setting it marks the field dirty but never the owner.
//! - [`ComplexProperty`] propagates every mutation to the owner through
//!   [`ComplexProperty::on_change`].
//! - [`PatternProperty`] is a simple property holding a match pattern, rendered as
//!   `/pattern/` on read.
//!
//! Relationship properties live in [`crate::relationship`].

use async_trait::async_trait;
use bson::{Bson, Regex, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    engine::StorageEngine,
    error::{StorageError, StorageResult},
    state::{LifecycleState, StateHandle},
};

/// Values that can be marshalled into a property.
pub trait PropertyValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> PropertyValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Type-erased view of a property, used by the persistence boundary.
///
/// Ordinary callers use the typed accessors of the concrete property types instead.
#[async_trait]
pub trait RawProperty: Send + Sync {
    /// In-memory property name.
    fn name(&self) -> &str;

    /// Field name used inside the store. Defaults to [`RawProperty::name`].
    fn storage_name(&self) -> &str;

    /// Field-level state.
    fn state(&self) -> LifecycleState;

    /// Marks the field as in sync with the store.
    fn mark_clean(&self);

    /// Produces the value written to the store.
    ///
    /// Relationship properties persist their non-clean members through `engine` first.
    async fn export_raw(&mut self, engine: &StorageEngine) -> StorageResult<Bson>;

    /// Current raw value without touching the store.
    fn snapshot(&self) -> StorageResult<Bson>;

    /// Fails exactly when [`RawProperty::import_raw`] would fail for `value`, without
    /// touching the property.
    fn check_raw(&self, value: Option<&Bson>) -> StorageResult<()>;

    /// Replaces the value with one read from the store. `None` means the field was absent.
    fn import_raw(&mut self, value: Option<Bson>) -> StorageResult<()>;
}

/// Notifies a property and its owning object that the property's value changed.
#[derive(Debug, Clone)]
pub struct ChangeHook {
    field: StateHandle,
    owner: StateHandle,
}

impl ChangeHook {
    pub fn new(field: StateHandle, owner: StateHandle) -> Self {
        Self { field, owner }
    }

    /// Moves both the field and the owner from `Clean` to `Dirty`.
    pub fn fire(&self) {
        self.field.mark_dirty();
        self.owner.mark_dirty();
    }

    /// Returns `true` if this hook reports to the given owner slot.
    pub fn reports_to(&self, owner: &StateHandle) -> bool {
        self.owner.same_slot(owner)
    }
}

/// A simple named property.
///
/// # Example
///
/// ```ignore
/// let core = ObjectCore::new();
/// let mut title = core.simple("title", String::new()).aliased("t");
/// title.set("Hello".to_string());
/// assert_eq!(title.get(), "Hello");
/// ```
#[derive(Debug)]
pub struct Property<T> {
    name: String,
    alias: Option<String>,
    value: T,
    state: StateHandle,
    owner: StateHandle,
}

impl<T: PropertyValue> Property<T> {
    /// Creates a property owned by the object whose state lives in `owner`.
    pub fn new(name: impl Into<String>, owner: &StateHandle, value: T) -> Self {
        Self {
            name: name.into(),
            alias: None,
            value,
            state: StateHandle::new(LifecycleState::New),
            owner: owner.clone(),
        }
    }

    /// Stores this property under `alias` instead of its name.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.state.mark_dirty();
    }

    /// Lifecycle state of the owning object.
    pub fn owner_state(&self) -> LifecycleState {
        self.owner.get()
    }

    fn hook(&self) -> ChangeHook {
        ChangeHook::new(self.state.clone(), self.owner.clone())
    }
}

#[async_trait]
impl<T: PropertyValue> RawProperty for Property<T> {
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

    async fn export_raw(&mut self, _engine: &StorageEngine) -> StorageResult<Bson> {
        self.snapshot()
    }

    fn snapshot(&self) -> StorageResult<Bson> {
        Ok(serialize_to_bson(&self.value)?)
    }

    fn check_raw(&self, value: Option<&Bson>) -> StorageResult<()> {
        if let Some(value) = value {
            deserialize_from_bson::<T>(value.clone())?;
        }

        Ok(())
    }

    fn import_raw(&mut self, value: Option<Bson>) -> StorageResult<()> {
        if let Some(value) = value {
            self.value = deserialize_from_bson(value)?;
        }

        Ok(())
    }
}

/// A property whose mutations mark the owning object dirty.
#[derive(Debug)]
pub struct ComplexProperty<T> {
    inner: Property<T>,
}

impl<T: PropertyValue> ComplexProperty<T> {
    pub fn new(name: impl Into<String>, owner: &StateHandle, value: T) -> Self {
        Self {
            inner: Property::new(name, owner, value),
        }
    }

    /// Stores this property under `alias` instead of its name.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.inner = self.inner.aliased(alias);
        self
    }

    pub fn get(&self) -> &T {
        self.inner.get()
    }

    pub fn set(&mut self, value: T) {
        self.inner.value = value;
        self.on_change();
    }

    /// Mutates the value in place and reports the change.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.inner.value);
        self.on_change();
        result
    }

    /// Moves the owner (and this field) from `Clean` to `Dirty`. No-op in any other state.
    pub fn on_change(&self) {
        self.inner.hook().fire();
    }

    /// Lifecycle state of the owning object.
    pub fn owner_state(&self) -> LifecycleState {
        self.inner.owner_state()
    }
}

#[async_trait]
impl<T: PropertyValue> RawProperty for ComplexProperty<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn storage_name(&self) -> &str {
        self.inner.storage_name()
    }

    fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    fn mark_clean(&self) {
        self.inner.mark_clean();
    }

    async fn export_raw(&mut self, _engine: &StorageEngine) -> StorageResult<Bson> {
        self.inner.snapshot()
    }

    fn snapshot(&self) -> StorageResult<Bson> {
        self.inner.snapshot()
    }

    fn check_raw(&self, value: Option<&Bson>) -> StorageResult<()> {
        self.inner.check_raw(value)
    }

    fn import_raw(&mut self, value: Option<Bson>) -> StorageResult<()> {
        self.inner.import_raw(value)
    }
}

/// A simple property holding a match pattern.
///
/// The pattern is stored as a BSON regular expression and read back wrapped in `/`
/// delimiters. Setting `/pattern/flags` keeps the flags as regex options.
#[derive(Debug)]
pub struct PatternProperty {
    inner: Property<Option<String>>,
    options: String,
}

impl PatternProperty {
    pub fn new(name: impl Into<String>, owner: &StateHandle) -> Self {
        Self {
            inner: Property::new(name, owner, None),
            options: String::new(),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.inner = self.inner.aliased(alias);
        self
    }

    /// Returns the pattern as `/pattern/`, or `None` if unset.
    pub fn get(&self) -> Option<String> {
        self.inner
            .get()
            .as_ref()
            .map(|pattern| format!("/{pattern}/"))
    }

    /// Returns the bare pattern.
    pub fn pattern(&self) -> Option<&str> {
        self.inner.get().as_deref()
    }

    /// Regex options, e.g. `i`. Empty when none were given.
    pub fn options(&self) -> &str {
        &self.options
    }

    fn not_a_regex(&self, value: &Bson) -> StorageError {
        StorageError::Serialization(format!(
            "expected a regular expression for `{}`, got {value}",
            self.inner.name
        ))
    }

    pub fn set(&mut self, pattern: impl ToString) {
        let pattern = pattern.to_string();
        let (pattern, options) = match pattern.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
            Some((body, flags)) => (body.to_string(), sorted_flags(flags)),
            None => (pattern, String::new()),
        };

        self.options = options;
        self.inner.set(Some(pattern));
    }
}

// The BSON format requires regex options in alphabetical order.
fn sorted_flags(flags: &str) -> String {
    let mut flags = flags.chars().collect::<Vec<_>>();
    flags.sort_unstable();
    flags.into_iter().collect()
}

#[async_trait]
impl RawProperty for PatternProperty {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn storage_name(&self) -> &str {
        self.inner.storage_name()
    }

    fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    fn mark_clean(&self) {
        self.inner.mark_clean();
    }

    async fn export_raw(&mut self, _engine: &StorageEngine) -> StorageResult<Bson> {
        self.snapshot()
    }

    fn snapshot(&self) -> StorageResult<Bson> {
        let Some(pattern) = self.inner.get() else {
            return Ok(Bson::Null);
        };

        Ok(Bson::RegularExpression(Regex {
            pattern: pattern.clone().try_into()?,
            options: self.options.clone().try_into()?,
        }))
    }

    fn check_raw(&self, value: Option<&Bson>) -> StorageResult<()> {
        match value {
            None | Some(Bson::Null | Bson::RegularExpression(_)) => Ok(()),
            Some(other) => Err(self.not_a_regex(other)),
        }
    }

    fn import_raw(&mut self, value: Option<Bson>) -> StorageResult<()> {
        let (pattern, options) = match value {
            None | Some(Bson::Null) => (None, String::new()),
            Some(Bson::RegularExpression(regex)) => (Some(regex.pattern.to_string()), regex.options.to_string()),
            Some(other) => return Err(self.not_a_regex(&other)),
        };

        self.inner.value = pattern;
        self.options = options;
        Ok(())
    }
}
