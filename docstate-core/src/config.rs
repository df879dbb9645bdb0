//! Storage engine configuration.

use serde::Deserialize;

use crate::backend::WriteOptions;

/// Settings applied by a [`StorageEngine`](crate::engine::StorageEngine) to every write.
///
/// Deserializable so it can live in an application's own configuration file:
///
/// ```ignore
/// [storage]
/// safe_writes = true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Request acknowledged writes from the store.
    pub safe_writes: bool,
}

impl StorageConfig {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            safe: self.safe_writes,
        }
    }
}
