//! IPFS HTTP RPC client
//!
//! Talks to a local Kubo node (`/api/v0/add`, `/api/v0/version`). Each
//! `connect()` builds its own `reqwest::Client`, so workers never share a
//! connection pool.

use super::{json_bytes, ContentStore, StoreConnector};
use crate::error::{ImportError, ImportResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default RPC endpoint of a local node
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reply of `/api/v0/add`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

/// Reply of `/api/v0/version`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionResponse {
    version: String,
}

/// Shared settings for IPFS sessions
#[derive(Debug, Clone)]
pub struct IpfsConnector {
    api_url: String,
    only_hash: bool,
    pin: bool,
}

impl IpfsConnector {
    /// `only_hash` computes CIDs without writing blocks (dry run)
    pub fn new(api_url: impl Into<String>, only_hash: bool) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            only_hash,
            pin: true,
        }
    }

    pub fn with_pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Verify the node answers before any work is scheduled
    ///
    /// Returns the node's version string.
    pub async fn check(&self) -> ImportResult<String> {
        let unavailable = |message: String| ImportError::StoreUnavailable {
            url: self.api_url.clone(),
            message,
        };

        let client = build_client().map_err(|e| unavailable(e.to_string()))?;
        let response = client
            .post(format!("{}/api/v0/version", self.api_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable(e.to_string()))?;
        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        tracing::info!(url = %self.api_url, version = %version.version, "Connected to IPFS node");
        Ok(version.version)
    }
}

#[async_trait]
impl StoreConnector for IpfsConnector {
    async fn connect(&self) -> ImportResult<Box<dyn ContentStore>> {
        Ok(Box::new(IpfsSession {
            client: build_client()?,
            add_url: format!("{}/api/v0/add", self.api_url),
            only_hash: self.only_hash,
            pin: self.pin,
        }))
    }

    fn describe(&self) -> String {
        if self.only_hash {
            format!("IPFS {} (only-hash)", self.api_url)
        } else {
            format!("IPFS {}", self.api_url)
        }
    }
}

fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

/// One worker's IPFS session
pub struct IpfsSession {
    client: reqwest::Client,
    add_url: String,
    only_hash: bool,
    pin: bool,
}

impl IpfsSession {
    async fn add_bytes(&self, bytes: Vec<u8>, file_name: String) -> ImportResult<String> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(&self.add_url)
            .query(&[
                ("only-hash", self.only_hash.to_string()),
                ("pin", self.pin.to_string()),
            ])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::Store(format!("add returned {}: {}", status, body.trim())));
        }

        let reply: AddResponse = response.json().await?;
        Ok(reply.hash)
    }
}

#[async_trait]
impl ContentStore for IpfsSession {
    async fn add_json(&self, document: &serde_json::Value) -> ImportResult<String> {
        self.add_bytes(json_bytes(document)?, "document.json".to_string())
            .await
    }

    async fn add_file(&self, path: &Path) -> ImportResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        self.add_bytes(bytes, file_name).await
    }
}
