//! Ordered collections that report mutations to an owning property.

use std::{fmt, ops::Index, slice};

use crate::{
    error::{StorageError, StorageResult},
    property::ChangeHook,
};

/// An ordered sequence that notifies a single owner before every append or replacement.
///
/// Every path that hands out a `&mut T` counts as a replacement, since the caller may
/// overwrite the member in place.
///
/// An ownerless collection is a plain sequence. Collections built with
/// [`ObservableCollection::from_vec`] (or `collect()`) start ownerless and do not notify
/// anyone while being filled; attaching an owner afterwards does not notify either.
pub struct ObservableCollection<T> {
    items: Vec<T>,
    owner: Option<ChangeHook>,
}

impl<T> ObservableCollection<T> {
    /// Creates an empty, ownerless collection.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            owner: None,
        }
    }

    /// Wraps existing items without notifying anyone.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items, owner: None }
    }

    /// Builds an owned collection by replaying [`ObservableCollection::append`] for each item,
    /// so the owner is notified once per element.
    pub fn from_appends(owner: ChangeHook, items: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::new();
        collection.set_owner(owner);

        for item in items {
            collection.append(item);
        }

        collection
    }

    pub fn set_owner(&mut self, owner: ChangeHook) {
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<&ChangeHook> {
        self.owner.as_ref()
    }

    pub fn append(&mut self, item: T) {
        self.notify();
        self.items.push(item);
    }

    /// Replaces the item at `index` and returns the previous one.
    ///
    /// `index == len` appends and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if `index > len`; the owner is not notified.
    pub fn set_at(&mut self, index: usize, item: T) -> StorageResult<Option<T>> {
        if index > self.items.len() {
            return Err(StorageError::InvalidArgument(format!(
                "index {index} is out of bounds for a collection of {}",
                self.items.len()
            )));
        }

        self.notify();

        if index == self.items.len() {
            self.items.push(item);
            return Ok(None);
        }

        Ok(Some(std::mem::replace(&mut self.items[index], item)))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Mutable access to a member. Notifies the owner when `index` is in bounds.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.items.len() {
            self.notify();
        }

        self.items.get_mut(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutable iteration. Notifies the owner unless the collection is empty.
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        if !self.items.is_empty() {
            self.notify();
        }

        self.items.iter_mut()
    }

    /// Mutable iteration for the persistence layer, which saves members in place.
    pub(crate) fn members_mut(&mut self) -> slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    fn notify(&self) {
        if let Some(owner) = &self.owner {
            owner.fire();
        }
    }
}

impl<T> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("items", &self.items)
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

impl<T> FromIterator<T> for ObservableCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> Index<usize> for ObservableCollection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a ObservableCollection<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut ObservableCollection<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> IntoIterator for ObservableCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
