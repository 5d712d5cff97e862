//! # treevault-storage
//!
//! The byte side of a store: every store keeps its files on local disk
//! under `<store.path>/<relative_path>`, mirroring the logical tree.

pub mod manager;
pub mod mime;
pub mod providers;
pub mod transfer;

pub use manager::StorageManager;
pub use mime::mime_from_path;
pub use providers::LocalStorageProvider;
pub use transfer::CrossStoreTransfer;
