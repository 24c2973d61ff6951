//! Offline store: SHA-256 content identifiers computed locally
//!
//! Used for dry runs without an IPFS node and in tests. Identifiers look like
//! `sha256-<hex>` and are not IPFS CIDs.

use super::{json_bytes, ContentStore, StoreConnector};
use crate::error::{ImportError, ImportResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Connector for [`LocalHashStore`] sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHashConnector;

#[async_trait]
impl StoreConnector for LocalHashConnector {
    async fn connect(&self) -> ImportResult<Box<dyn ContentStore>> {
        Ok(Box::new(LocalHashStore))
    }

    fn describe(&self) -> String {
        "local sha256 (offline)".to_string()
    }
}

/// Session that hashes content instead of uploading it
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHashStore;

impl LocalHashStore {
    /// Identifier for a byte string
    pub fn identify(bytes: &[u8]) -> String {
        format!("sha256-{:x}", Sha256::digest(bytes))
    }
}

#[async_trait]
impl ContentStore for LocalHashStore {
    async fn add_json(&self, document: &serde_json::Value) -> ImportResult<String> {
        Ok(Self::identify(&json_bytes(document)?))
    }

    async fn add_file(&self, path: &Path) -> ImportResult<String> {
        let path_buf = path.to_path_buf();

        // Hashing is blocking file I/O, keep it off the async workers
        tokio::task::spawn_blocking(move || -> ImportResult<String> {
            let mut file = File::open(&path_buf)?;
            let mut hasher = Sha256::new();
            let mut buffer = vec![0u8; 1024 * 1024];

            loop {
                let bytes_read = file.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }

            Ok(format!("sha256-{:x}", hasher.finalize()))
        })
        .await
        .map_err(|e| ImportError::Worker(format!("Hash task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_and_bytes_agree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"not really audio").unwrap();

        let store = LocalHashConnector.connect().await.unwrap();
        let from_file = store.add_file(&path).await.unwrap();
        assert_eq!(from_file, LocalHashStore::identify(b"not really audio"));
        assert!(from_file.starts_with("sha256-"));
        assert_eq!(from_file.len(), "sha256-".len() + 64);
    }

    #[tokio::test]
    async fn test_json_is_deterministic() {
        let store = LocalHashStore;
        let a = store.add_json(&json!({ "content": "x", "language": "en" })).await.unwrap();
        let b = store.add_json(&json!({ "language": "en", "content": "x" })).await.unwrap();
        let c = store.add_json(&json!({ "language": "en", "content": "y" })).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = LocalHashStore.add_file(Path::new("/nonexistent/clip.mp3")).await;
        assert!(matches!(result, Err(ImportError::Io(_))));
    }
}
