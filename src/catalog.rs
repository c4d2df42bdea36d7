use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::audit::AuditLog;
use crate::error::CatalogError;
use crate::metrics::{CATALOG_REFRESHES, CATALOG_REFRESH_FAILURES};

// Raw catalog content plus when it was last refreshed
#[derive(Debug, Clone)]
pub struct Catalog {
    pub content: Vec<u8>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn load(&self) -> Result<Catalog, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub sources: Vec<String>,
    pub cache_file: PathBuf,
    pub max_age: Duration,
    pub fetch_timeout: Duration,
}

// Split comma-separated urls "a.example/yysc.conf, https://b.example/yysc.conf"
pub fn parse_sources(sources: &str) -> Vec<String> {
    sources
        .split(',')
        .map(|s| s.trim()) // remove spaces
        .filter(|s| !s.is_empty())
        .map(|url| {
            // default to https when no scheme given
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{}", url)
            }
        })
        .collect()
}

/// Catalog cached in a local file and refreshed from remote sources.
///
/// The cache is refreshed inline, on the request that finds it absent or
/// older than `max_age`. Sources are tried in order and the first success
/// wins; if none answer, the stale local copy is served. The last download
/// is also kept in memory, so a cache file that cannot be written does not
/// cause a second download within the freshness window.
pub struct RemoteCatalog {
    client: reqwest::Client,
    config: CatalogConfig,
    refresh_lock: Mutex<()>,
    downloaded: RwLock<Option<Downloaded>>,
    audit: AuditLog,
}

struct Downloaded {
    at: Instant,
    catalog: Catalog,
}

impl RemoteCatalog {
    pub fn new(client: reqwest::Client, config: CatalogConfig, audit: AuditLog) -> Self {
        if config.sources.is_empty() {
            tracing::warn!("no catalog sources configured, serving the local file only");
        }
        for (i, source) in config.sources.iter().enumerate() {
            tracing::info!(index = i + 1, url = %source, "catalog source");
        }

        Self {
            client,
            config,
            refresh_lock: Mutex::new(()),
            downloaded: RwLock::new(None),
            audit,
        }
    }

    // Last download, if still within max_age
    fn fresh_download(&self) -> Option<Catalog> {
        let guard = self.downloaded.read().ok()?;
        guard
            .as_ref()
            .filter(|d| d.at.elapsed() <= self.config.max_age)
            .map(|d| d.catalog.clone())
    }

    fn remember(&self, catalog: &Catalog) {
        if let Ok(mut guard) = self.downloaded.write() {
            *guard = Some(Downloaded {
                at: Instant::now(),
                catalog: catalog.clone(),
            });
        }
    }

    async fn modified_at(&self) -> Option<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(&self.config.cache_file).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }

    async fn is_stale(&self) -> bool {
        match self.modified_at().await {
            None => true,
            Some(modified) => {
                let age = Utc::now().signed_duration_since(modified);
                age.to_std().is_ok_and(|age| age > self.config.max_age)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let body = self
            .client
            .get(url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(body.to_vec())
    }

    // Returns the fetched content, or None when every source failed
    async fn refresh(&self) -> Option<Vec<u8>> {
        let cache_file = self.config.cache_file.display();

        for url in &self.config.sources {
            match self.fetch(url).await {
                Ok(content) => {
                    CATALOG_REFRESHES.inc();
                    if let Err(e) = tokio::fs::write(&self.config.cache_file, &content).await {
                        tracing::warn!(path = %cache_file, error = %e, "failed to write catalog cache");
                    }
                    tracing::info!(%url, path = %cache_file, "catalog refreshed");
                    self.audit.record(format!("updated local catalog: {} -> {}", url, cache_file));
                    return Some(content);
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "catalog source unreachable");
                    self.audit.record(format!("warning: could not download catalog from {}", url));
                }
            }
        }

        CATALOG_REFRESH_FAILURES.inc();
        tracing::error!(path = %cache_file, "all catalog sources failed, using local file");
        self.audit.record("error: all catalog sources are unreachable, using local file");
        None
    }
}

#[async_trait]
impl CatalogProvider for RemoteCatalog {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        if let Some(catalog) = self.fresh_download() {
            return Ok(catalog);
        }

        if self.is_stale().await {
            let _guard = self.refresh_lock.lock().await;
            // another request may have refreshed while we waited
            if let Some(catalog) = self.fresh_download() {
                return Ok(catalog);
            }
            if self.is_stale().await {
                if let Some(content) = self.refresh().await {
                    let catalog = Catalog {
                        content,
                        refreshed_at: Some(Utc::now()),
                    };
                    self.remember(&catalog);
                    return Ok(catalog);
                }
            }
        }

        let path = &self.config.cache_file;
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Catalog {
                content,
                refreshed_at: self.modified_at().await,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CatalogError::Missing(path.clone())),
            Err(source) => Err(CatalogError::Unreadable {
                path: path.clone(),
                source,
            }),
        }
    }
}

// Fixed in-memory catalog, swappable at runtime; used by tests
pub struct StaticCatalog {
    content: RwLock<Option<Vec<u8>>>,
}

impl StaticCatalog {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: RwLock::new(Some(content.into())),
        }
    }

    pub fn missing() -> Self {
        Self {
            content: RwLock::new(None),
        }
    }

    pub fn set(&self, content: Option<Vec<u8>>) {
        if let Ok(mut guard) = self.content.write() {
            *guard = content;
        }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn load(&self) -> Result<Catalog, CatalogError> {
        let content = self
            .content
            .read()
            .ok()
            .and_then(|guard| guard.clone());

        content
            .map(|content| Catalog {
                content,
                refreshed_at: None,
            })
            .ok_or_else(|| CatalogError::Missing(PathBuf::from("<static>")))
    }
}
