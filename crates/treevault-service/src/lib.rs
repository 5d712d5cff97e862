//! # treevault-service
//!
//! Services over the metadata store and the on-disk bytes. Each service
//! takes its dependencies at construction time.
//!
//! - [`ResourceRepository`] keeps metadata rows and disk entries in step
//! - [`TreeService`] loads resources with the caller's resolved permissions
//! - [`StoreService`] creates and attaches stores

pub mod context;
pub mod resource;
pub mod store;

pub use context::RequestContext;
pub use resource::{ResourceRef, ResourceRepository, TreeService};
pub use store::{CreateStoreRequest, StoreService};
