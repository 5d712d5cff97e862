//! Local filesystem storage provider.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use treevault_core::error::{AppError, ErrorKind};
use treevault_core::result::AppResult;
use treevault_core::traits::storage::{ByteStream, StorageProvider};

/// Files of one store, rooted at the store's `path`.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    root: PathBuf,
}

fn io_error(action: &str, path: &str, e: io::Error) -> AppError {
    if e.kind() == io::ErrorKind::NotFound {
        AppError::not_found(format!("Path not found: {path}"))
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {path}"), e)
    }
}

impl LocalStorageProvider {
    /// Create a provider rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create store root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Absolute path of a store-relative path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let clean = path.trim_start_matches('/');
        if clean.is_empty() {
            self.root.clone()
        } else {
            self.root.join(clean)
        }
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, path: &str) -> AppResult<ByteStream> {
        let file = fs::File::open(self.resolve(path))
            .await
            .map_err(|e| io_error("open file", path, e))?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Bytes> {
        let data = fs::read(self.resolve(path))
            .await
            .map_err(|e| io_error("read file", path, e))?;
        Ok(Bytes::from(data))
    }

    async fn write_stream(&self, path: &str, mut stream: ByteStream) -> AppResult<u64> {
        let full_path = self.resolve(path);
        self.ensure_parent(&full_path).await?;

        let mut file = fs::File::create(&full_path)
            .await
            .map_err(|e| io_error("create file", path, e))?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))?;

        debug!(path, bytes = total_bytes, "Wrote file from stream");
        Ok(total_bytes)
    }

    async fn import(&self, source: &Path, to: &str) -> AppResult<u64> {
        let to_path = self.resolve(to);
        self.ensure_parent(&to_path).await?;
        let bytes = fs::copy(source, &to_path).await.map_err(|e| {
            io_error("import", &source.display().to_string(), e)
        })?;

        debug!(source = %source.display(), to, bytes, "Imported file");
        Ok(bytes)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        match fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete file", path, e)),
        }
    }

    async fn remove_dir(&self, path: &str) -> AppResult<()> {
        match fs::remove_dir(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove directory", path, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let to_path = self.resolve(to);
        self.ensure_parent(&to_path).await?;
        fs::rename(self.resolve(from), &to_path)
            .await
            .map_err(|e| io_error("rename", &format!("{from} -> {to}"), e))?;

        debug!(from, to, "Renamed on disk");
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> AppResult<()> {
        fs::create_dir_all(self.resolve(path))
            .await
            .map_err(|e| io_error("create directory", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(data: &'static str) -> ByteStream {
        Box::pin(futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from(data))]))
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();

        let written = provider
            .write_stream("/docs/file.txt", stream_of("hello world"))
            .await
            .unwrap();
        assert_eq!(written, 11);
        assert!(provider.resolve("/docs/file.txt").exists());
        assert_eq!(
            provider.read_bytes("/docs/file.txt").await.unwrap(),
            Bytes::from("hello world")
        );

        provider.delete("/docs/file.txt").await.unwrap();
        assert!(!provider.resolve("/docs/file.txt").exists());
        // Deleting twice is fine.
        provider.delete("/docs/file.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_import_and_stream_copy() {
        let src_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("in.txt");
        std::fs::write(&source, b"payload").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path().join("store")).await.unwrap();
        assert_eq!(provider.import(&source, "/a/in.txt").await.unwrap(), 7);

        let stream = provider.read("/a/in.txt").await.unwrap();
        let written = provider.write_stream("/b/out.txt", stream).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(
            std::fs::read(provider.resolve("/b/out.txt")).unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_rename_directory_and_remove_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();

        provider.write_stream("/old/x.txt", stream_of("x")).await.unwrap();
        provider.rename("/old", "/new").await.unwrap();
        assert!(!provider.resolve("/old").exists());
        assert!(provider.resolve("/new/x.txt").exists());

        let err = provider.remove_dir("/new").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);

        provider.delete("/new/x.txt").await.unwrap();
        provider.remove_dir("/new").await.unwrap();
        provider.remove_dir("/new").await.unwrap();
        assert!(!provider.resolve("/new").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let err = provider.read_bytes("/nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_resolve_root() {
        let provider = LocalStorageProvider {
            root: PathBuf::from("/data/store"),
        };
        assert_eq!(provider.resolve(""), PathBuf::from("/data/store"));
        assert_eq!(provider.resolve("/a/b"), PathBuf::from("/data/store/a/b"));
    }
}
