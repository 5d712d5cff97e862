//! Store lifecycle.

pub mod service;

pub use service::{CreateStoreRequest, StoreService};
