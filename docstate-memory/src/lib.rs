//! In-memory document storage backend for docstate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Raw BSON storage** - Documents are kept exactly as the storage engine wrote them
//! - **Full query support** - Supports filtering, sorting, and pagination
//! - **Blob sub-store** - Files are read once and held in memory
//!
//! # Quick Start
//!
//! ```ignore
//! use docstate::{StorageEngine, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::new(InMemoryStore::new());
//!
//!     let mut user = User::default();
//!     user.name.set("Alice".to_string());
//!     engine.save(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
