use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{
    TryStreamExt,
    io::{AsyncReadExt, AsyncWriteExt},
};
use mongodb::{
    Client, Collection as MongoCollection, Database,
    gridfs::GridFsBucket,
    options::{Acknowledgment, ClientOptions, FindOptions, WriteConcern},
};
use std::path::Path;
use tokio::{fs::File, io::AsyncReadExt as _};
use tracing::debug;

use docstate_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoredFile, WriteOptions},
    error::{StorageError, StorageResult},
    query::Query,
};

use crate::query::MongoQueryTranslator;

const UPLOAD_CHUNK_SIZE: usize = 255 * 1024;

fn backend_error(e: mongodb::error::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }

    fn bucket(&self) -> GridFsBucket {
        self.database().gridfs_bucket(None)
    }

    /// Journaled majority acknowledgement for safe writes; the client default otherwise.
    fn write_concern(options: WriteOptions) -> Option<WriteConcern> {
        options.safe.then(|| {
            WriteConcern::builder()
                .w(Acknowledgment::Majority)
                .journal(true)
                .build()
        })
    }

    async fn shutdown(self) -> StorageResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(&self, collection: &str, query: Query) -> StorageResult<Option<Document>> {
        let query = Query { limit: Some(1), ..query };

        Ok(StoreBackend::find(self, collection, query).await?.into_iter().next())
    }

    async fn find(&self, collection: &str, query: Query) -> StorageResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = MongoQueryTranslator::sort(&query);

        self.get_collection(collection)
            .find(MongoQueryTranslator::filter(&query)?)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn save(&self, collection: &str, document: Document, options: WriteOptions) -> StorageResult<bool> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StorageError::InvalidArgument("cannot save a document without an `_id`".to_string()))?;

        let coll = self.get_collection(collection);
        let mut action = coll
            .replace_one(doc! { "_id": id }, document)
            .upsert(true);
        if let Some(concern) = Self::write_concern(options) {
            action = action.write_concern(concern);
        }

        let result = action.await.map_err(backend_error)?;
        debug!(collection, matched = result.matched_count, upserted = result.upserted_id.is_some(), "replaced document");

        Ok(true)
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        fields: Document,
        options: WriteOptions,
    ) -> StorageResult<bool> {
        let coll = self.get_collection(collection);
        let mut action = coll
            .update_one(MongoQueryTranslator::filter(&query)?, doc! { "$set": fields });
        if let Some(concern) = Self::write_concern(options) {
            action = action.write_concern(concern);
        }

        let result = action.await.map_err(backend_error)?;

        Ok(result.matched_count > 0)
    }

    async fn remove(
        &self,
        collection: &str,
        query: Query,
        just_one: bool,
        options: WriteOptions,
    ) -> StorageResult<u64> {
        let filter = MongoQueryTranslator::filter(&query)?;
        let concern = Self::write_concern(options);
        let collection = self.get_collection(collection);

        let result = if just_one {
            let mut action = collection.delete_one(filter);
            if let Some(concern) = concern {
                action = action.write_concern(concern);
            }
            action.await
        } else {
            let mut action = collection.delete_many(filter);
            if let Some(concern) = concern {
                action = action.write_concern(concern);
            }
            action.await
        };

        Ok(result.map_err(backend_error)?.deleted_count)
    }

    async fn store_file(&self, path: &Path) -> StorageResult<Uuid> {
        let mut file = File::open(path).await?;
        let id = Uuid::new();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut upload = self
            .bucket()
            .open_upload_stream(filename)
            .id(Bson::from(id))
            .await
            .map_err(backend_error)?;

        let mut chunk = vec![0_u8; UPLOAD_CHUNK_SIZE];
        let mut length = 0;
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            upload.write_all(&chunk[..read]).await?;
            length += read;
        }
        upload.close().await?;

        debug!(%id, length, "uploaded file");
        Ok(id)
    }

    async fn find_file(&self, id: Uuid) -> StorageResult<Option<StoredFile>> {
        let bucket = self.bucket();
        let Some(file) = bucket
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_error)?
        else {
            return Ok(None);
        };

        let mut data = Vec::new();
        bucket
            .open_download_stream(Bson::from(id))
            .await
            .map_err(backend_error)?
            .read_to_end(&mut data)
            .await?;

        Ok(Some(StoredFile {
            id,
            filename: file.filename.unwrap_or_default(),
            length: file.length,
            upload_date: file.upload_date.to_chrono(),
            data,
        }))
    }

    async fn remove_file(&self, id: Uuid) -> StorageResult<()> {
        let bucket = self.bucket();
        let exists = bucket
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_error)?
            .is_some();

        if exists {
            bucket
                .delete(Bson::from(id))
                .await
                .map_err(backend_error)?;
        }

        Ok(())
    }

    async fn shutdown(self) -> StorageResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StorageResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| StorageError::Initialization(e.to_string()))?,
            )
            .map_err(|e| StorageError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
