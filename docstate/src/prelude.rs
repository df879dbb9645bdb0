//! Convenient re-exports of commonly used types from docstate.
//!
//! ```ignore
//! use docstate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The domain object trait, its derive macro and property types
//! - The storage engine and its configuration
//! - Store backends and builders
//! - Query construction and filtering
//! - Error types

pub use docstate_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder, StoredFile, WriteOptions},
    config::StorageConfig,
    cursor::ObjectCursor,
    engine::{SaveOutcome, StorageEngine, StorageEngineBuilder},
    error::{StorageError, StorageResult},
    object::{DomainObject, ObjectCore},
    observable::ObservableCollection,
    property::{ComplexProperty, PatternProperty, Property, RawProperty},
    query::{Comparison, Expr, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    reference::DocumentRef,
    relationship::HasMany,
    state::LifecycleState,
};
pub use docstate_macros::DomainObject;
