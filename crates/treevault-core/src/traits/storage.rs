//! Storage provider trait for the byte side of a store.
//!
//! Paths handed to a provider are store-relative and forward-slash
//! separated, exactly as recorded in a resource's `relative_path`.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for reading file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Trait for the on-disk side of a store.
///
/// Defined here in `treevault-core` and implemented in `treevault-storage`.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Absolute root directory of the store.
    fn root(&self) -> &Path;

    /// Read a file and return its byte stream.
    async fn read(&self, path: &str) -> AppResult<ByteStream>;

    /// Read a file into memory as a complete byte buffer.
    async fn read_bytes(&self, path: &str) -> AppResult<Bytes>;

    /// Write a byte stream to a file at the given path.
    async fn write_stream(&self, path: &str, stream: ByteStream) -> AppResult<u64>;

    /// Copy a file from an absolute local path into the store.
    async fn import(&self, source: &Path, to: &str) -> AppResult<u64>;

    /// Delete a file at the given path. Missing files are not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Remove an empty directory. Missing directories are not an error.
    async fn remove_dir(&self, path: &str) -> AppResult<()>;

    /// Move a file or directory within this store.
    async fn rename(&self, from: &str, to: &str) -> AppResult<()>;

    /// Create a directory (and any missing parents).
    async fn create_dir(&self, path: &str) -> AppResult<()>;
}
