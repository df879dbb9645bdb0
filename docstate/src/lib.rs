//! Main docstate crate: a stateful object-document mapper for JSON/BSON document stores.
//!
//! This crate is the primary entry point for users of the docstate framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Lifecycle tracking** - Objects know whether they are new, in sync or modified
//! - **Typed properties** - Simple, complex, pattern and one-to-many relationship properties
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//! - **Flexible querying** - Composable queries written against property names
//!
//! # Quick Start
//!
//! ```ignore
//! use docstate::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(DomainObject)]
//! #[domain(collection = "users")]
//! pub struct User {
//!     #[domain(core)]
//!     core: ObjectCore,
//!     name: Property<String>,
//!     roles: ComplexProperty<Vec<String>>,
//! }
//!
//! impl Default for User {
//!     fn default() -> Self {
//!         let core = ObjectCore::new();
//!         Self {
//!             name: core.simple("name", String::new()).aliased("n"),
//!             roles: core.complex("roles", Vec::new()),
//!             core,
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> StorageResult<()> {
//!     let engine = StorageEngine::new(InMemoryStore::new());
//!
//!     let mut user = User::default();
//!     user.name.set("Alice".to_string());
//!     engine.save(&mut user).await?;
//!
//!     user.roles.update(|roles| roles.push("admin".to_string()));
//!     engine.save(&mut user).await?;
//!
//!     let alices = engine
//!         .find_by_query(
//!             &User::default(),
//!             Some(Query::builder().filter(Filter::eq("name", "Alice")).build()),
//!         )?
//!         .try_collect()
//!         .await?;
//!
//!     println!("{} user(s) named Alice", alices.len());
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docstate_core::{
    backend, collection, config, cursor, engine, error, object, observable, property, query,
    reference, relationship, state,
};
pub use docstate_core::engine::StorageEngine;
pub use docstate_macros::DomainObject;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docstate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docstate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
