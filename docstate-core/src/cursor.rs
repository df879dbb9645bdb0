//! Lazy result sets of domain objects.

use bson::Document;
use std::{collections::VecDeque, marker::PhantomData};
use tracing::debug;

use crate::{
    collection::Collection,
    error::StorageResult,
    object::{DomainObject, import_document},
    observable::ObservableCollection,
    query::Query,
};

/// Objects matching a query, fetched on first use.
///
/// No I/O happens until the first call to [`ObjectCursor::next`] (or one of the
/// collecting helpers). Every yielded object is built with `T::default()` and loaded
/// `Clean`.
///
/// # Type Parameters
///
/// * `'e` - Lifetime of the storage engine the cursor was opened on
/// * `T` - The domain object type
#[derive(Debug)]
pub struct ObjectCursor<'e, T> {
    collection: Collection<'e>,
    query: Option<Query>,
    buffer: VecDeque<Document>,
    _marker: PhantomData<fn() -> T>,
}

impl<'e, T: DomainObject + Default> ObjectCursor<'e, T> {
    pub(crate) fn new(collection: Collection<'e>, query: Query) -> Self {
        Self {
            collection,
            query: Some(query),
            buffer: VecDeque::new(),
            _marker: PhantomData,
        }
    }

    /// Whether the backend query has already run.
    pub fn is_executed(&self) -> bool {
        self.query.is_none()
    }

    /// Returns the next object, or `None` once the results are exhausted.
    #[allow(clippy::should_implement_trait)]
    pub async fn next(&mut self) -> StorageResult<Option<T>> {
        self.execute().await?;

        match self.buffer.pop_front() {
            Some(document) => {
                let mut object = T::default();
                import_document(&mut object, document)?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    /// Collects the remaining objects.
    pub async fn try_collect(mut self) -> StorageResult<Vec<T>> {
        let mut objects = Vec::new();

        while let Some(object) = self.next().await? {
            objects.push(object);
        }

        Ok(objects)
    }

    /// Collects the remaining objects into an ownerless [`ObservableCollection`].
    pub async fn into_collection(self) -> StorageResult<ObservableCollection<T>> {
        Ok(ObservableCollection::from_vec(self.try_collect().await?))
    }

    async fn execute(&mut self) -> StorageResult<()> {
        if let Some(query) = self.query.take() {
            let documents = self.collection.find(query).await?;
            debug!(
                collection = self.collection.name(),
                count = documents.len(),
                "query executed"
            );
            self.buffer = documents.into();
        }

        Ok(())
    }
}
