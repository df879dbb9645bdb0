//! Error types and result types for persistence operations.
//!
//! This module provides error handling for every storage engine, property and backend
//! operation. Use [`StorageResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use thiserror::Error;

/// Represents all possible errors that can occur while persisting domain objects.
///
/// The first four variants describe precondition failures detected by the storage
/// engine itself; the rest wrap failures from marshalling, local I/O or the backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage engine has no backend bound (never initialized, or shut down).
    #[error("Storage engine has not been initialised")]
    NotInitialized,
    /// A fetch or find-one found no matching document.
    /// The first argument is the collection name, the second describes the lookup.
    #[error("Object not found in collection {0}: {1}")]
    ObjectNotFound(String, String),
    /// The object's lifecycle state does not allow the requested operation,
    /// e.g. inserting an object that already has an id.
    #[error("Invalid object state: {0}")]
    InvalidState(String),
    /// An argument was rejected, e.g. a missing local file or non-reference raw data.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Serialization/deserialization error when marshalling property values.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// A specialized `Result` type for persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<BsonError> for StorageError {
    fn from(err: BsonError) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StorageError {
    fn from(err: SerdeJsonError) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<std::convert::Infallible> for StorageError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}
