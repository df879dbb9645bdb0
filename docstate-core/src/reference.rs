//! Lightweight references between documents.

use bson::{Bson, Document, Uuid, doc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A pointer to a document in another collection.
///
/// Serialized in the DBRef shape: `{ "$ref": <collection>, "$id": <id> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(rename = "$ref")]
    pub collection: String,
    #[serde(rename = "$id")]
    pub id: Uuid,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: Uuid) -> Self {
        Self {
            collection: collection.into(),
            id,
        }
    }

    pub fn to_document(&self) -> Document {
        doc! {
            "$ref": self.collection.clone(),
            "$id": self.id,
        }
    }

    /// Parses a reference out of its raw form.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if `value` is not a reference document.
    pub fn from_bson(value: &Bson) -> StorageResult<Self> {
        let document = value.as_document().ok_or_else(|| {
            StorageError::InvalidArgument(format!("expected a reference document, got {value}"))
        })?;

        let collection = document
            .get_str("$ref")
            .map_err(|_| StorageError::InvalidArgument("reference is missing `$ref`".into()))?;
        let id = match document.get("$id") {
            Some(Bson::Binary(binary)) => binary
                .to_uuid()
                .map_err(|e| StorageError::InvalidArgument(e.to_string()))?,
            _ => {
                return Err(StorageError::InvalidArgument(
                    "reference `$id` is not a UUID".into(),
                ));
            }
        };

        Ok(Self::new(collection, id))
    }
}

impl From<DocumentRef> for Bson {
    fn from(reference: DocumentRef) -> Self {
        Bson::Document(reference.to_document())
    }
}
