//! # treevault-database
//!
//! The metadata side of TreeVault: the closure-table node store, the path
//! resource rows layered on top of it, mirrored binaries, and the store
//! catalog.
//!
//! Two backends implement the [`MetadataStore`] traits: PostgreSQL via
//! sqlx, and an in-memory store used for tests and ephemeral runs.
//! [`MetadataBackend`] selects one from configuration.

pub mod backend;
pub mod connection;
pub mod memory;
pub mod metadata;
pub mod migration;
pub mod postgres;

pub use backend::MetadataBackend;
pub use connection::DatabasePool;
pub use memory::MemoryMetadataStore;
pub use metadata::{BinaryStore, MetadataStore, NodeStore, ResourceStore, StoreCatalog};
pub use postgres::PgMetadataStore;
