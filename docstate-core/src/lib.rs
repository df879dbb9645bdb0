//! A stateful object-document mapper for JSON/BSON document stores.
//!
//! This crate is the core of the docstate project and provides:
//!
//! - **Lifecycle state** ([`state`]) - `New` / `Clean` / `Dirty` tracking shared by objects and properties
//! - **Properties** ([`property`]) - Simple, complex and pattern property slots
//! - **Relationships** ([`relationship`]) - One-to-many properties persisted as references
//! - **Observable collections** ([`observable`]) - Sequences that report mutations to their owner
//! - **Domain objects** ([`object`]) - The trait every persisted entity implements
//! - **Storage engine** ([`engine`]) - Save, fetch, find and delete domain objects
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Type-safe query construction and filtering
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docstate_core::{engine::StorageEngine, object::DomainObject};
//!
//! let engine = StorageEngine::new(backend);
//! let mut user = User::default();
//! user.name.set("Ada".to_string());
//!
//! engine.save(&mut user).await?;
//! assert!(user.id().is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod object;
pub mod observable;
pub mod property;
pub mod query;
pub mod reference;
pub mod relationship;
pub mod state;
