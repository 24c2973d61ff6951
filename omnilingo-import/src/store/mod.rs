//! Content-addressable store clients
//!
//! The import only needs two operations: store a JSON document and store a
//! file, each returning the content identifier. A [`StoreConnector`] is shared
//! by all workers; every chunk invocation calls `connect()` and gets a
//! [`ContentStore`] session it uses exclusively.

pub mod ipfs;
pub mod local;

pub use ipfs::IpfsConnector;
pub use local::LocalHashConnector;

use crate::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

/// One worker's session with the store
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `document` (compact JSON, keys sorted) and return its identifier
    async fn add_json(&self, document: &serde_json::Value) -> ImportResult<String>;

    /// Store the file's bytes and return its identifier
    async fn add_file(&self, path: &Path) -> ImportResult<String>;
}

/// Factory for per-worker store sessions
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    /// Open a fresh session; never shared between concurrent chunks
    async fn connect(&self) -> ImportResult<Box<dyn ContentStore>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Canonical bytes of a JSON document
///
/// `serde_json::Value` objects are key-sorted, so identical documents always
/// hash to the same identifier.
pub fn json_bytes(document: &serde_json::Value) -> ImportResult<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_bytes_sorted_and_compact() {
        let doc = json!({ "language": "fy-NL", "content": "Hallo", "copyright": "CC0-1.0" });
        let bytes = json_bytes(&doc).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"content":"Hallo","copyright":"CC0-1.0","language":"fy-NL"}"#
        );
    }
}
