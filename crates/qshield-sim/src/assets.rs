//! Demo asset loading.
//!
//! Two JSON documents can override the built-in display constants:
//! `rsa.json` and `key_exchange.json`. They are fetched from an HTTP base
//! URL or a local directory. A document that cannot be fetched or parsed
//! leaves the defaults in place; loading never fails the caller.

use async_trait::async_trait;
use qshield_core::{DemoAssets, EngineConfig, MergeReport};
use reqwest::StatusCode;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum AssetError {
    Http(String),
    Status(u16),
    Io(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Http(msg) => write!(f, "HTTP request failed: {}", msg),
            AssetError::Status(code) => write!(f, "Unexpected HTTP status: {}", code),
            AssetError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AssetError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetDocument {
    Rsa,
    Profiles,
}

impl AssetDocument {
    pub fn file_name(&self) -> &'static str {
        match self {
            AssetDocument::Rsa => "rsa.json",
            AssetDocument::Profiles => "key_exchange.json",
        }
    }
}

/// Somewhere the asset documents can be read from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    fn describe(&self) -> String;

    /// Raw document body.
    async fn fetch(&self, document: AssetDocument) -> Result<String, AssetError>;
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            max_retries: 2,
            retry_base_delay_ms: 100,
        }
    }
}

pub struct HttpAssetSource {
    base_url: String,
    client: reqwest::Client,
    config: LoaderConfig,
}

impl HttpAssetSource {
    pub fn new(base_url: impl Into<String>, config: LoaderConfig) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AssetError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    fn url_for(&self, document: AssetDocument) -> String {
        format!("{}/{}", self.base_url, document.file_name())
    }

    async fn fetch_once(&self, url: &str) -> Result<String, AssetError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AssetError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| AssetError::Http(e.to_string()))
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self, document: AssetDocument) -> Result<String, AssetError> {
        let url = self.url_for(document);
        let mut last_error = AssetError::Http("no attempt made".to_string());

        for attempt in 0..=self.config.max_retries {
            match self.fetch_once(&url).await {
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "Fetched asset document");
                    return Ok(body);
                }
                // 4xx won't change on retry
                Err(AssetError::Status(code))
                    if StatusCode::from_u16(code).is_ok_and(|s| s.is_client_error()) =>
                {
                    return Err(AssetError::Status(code));
                }
                Err(e) => {
                    warn!(attempt, url = %url, error = %e, "Asset fetch failed");
                    last_error = e;
                }
            }

            if attempt < self.config.max_retries {
                let delay = self.config.retry_base_delay_ms.saturating_mul(1 << attempt.min(16));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(last_error)
    }
}

pub struct DirAssetSource {
    dir: PathBuf,
}

impl DirAssetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    async fn fetch(&self, document: AssetDocument) -> Result<String, AssetError> {
        let path = self.dir.join(document.file_name());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AssetError::Io(format!("{}: {}", path.display(), e)))
    }
}

/// Fetch both documents concurrently and merge them over the defaults.
pub async fn load_assets(
    source: &dyn AssetSource,
    config: &EngineConfig,
) -> (DemoAssets, MergeReport) {
    let (rsa, profiles) = tokio::join!(
        source.fetch(AssetDocument::Rsa),
        source.fetch(AssetDocument::Profiles)
    );

    let rsa = keep_body(AssetDocument::Rsa, rsa);
    let profiles = keep_body(AssetDocument::Profiles, profiles);

    let mut assets = DemoAssets::default();
    let report = assets.apply_overrides(rsa.as_deref(), profiles.as_deref(), config);

    info!(
        source = %source.describe(),
        rsa = report.rsa_applied,
        profiles = report.profiles_applied,
        "Demo assets loaded"
    );
    (assets, report)
}

fn keep_body(document: AssetDocument, result: Result<String, AssetError>) -> Option<String> {
    match result {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(document = document.file_name(), error = %e, "Using built-in asset");
            None
        }
    }
}
