//! MongoDB backend implementation for docstate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! enabling persistent storage of domain objects using MongoDB's querying capabilities.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docstate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Full query support** - Leverages MongoDB's query engine for filtering and sorting
//! - **Safe writes** - Acknowledged writes use a journaled majority write concern
//! - **Blob storage** - Files are stored in GridFS
//!
//! # Example
//!
//! ```ignore
//! use docstate::{StorageEngine, backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let engine = StorageEngine::builder().backend(store).safe_writes(true).build();
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
