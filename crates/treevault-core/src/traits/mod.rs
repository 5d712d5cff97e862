//! Core traits defined in `treevault-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
